//! Buffers pluggable units created before the engine starts initializing.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use autoconf_core::{AutoconfError, AutoconfResult};
use autoconf_domain::{AutowirePolicy, PluggableUnit};

/// Binds configuration onto one unit
pub trait UnitBinding: Send + Sync {
    fn bind_unit(&self, unit: &PluggableUnit) -> AutoconfResult<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationOutcome {
    /// Held until the initializing transition
    Buffered,
    /// Bound immediately, with the number of options applied
    Bound(usize),
    /// Not eligible for binding
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub bound: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct DeferredState {
    initializing: bool,
    buffer: Vec<PluggableUnit>,
}

/// The flag and the buffer share one lock, so a unit created at the moment of
/// the transition is either drained or bound immediately, never both.
pub struct DeferredAutowireRegistry {
    state: Mutex<DeferredState>,
    policy: Arc<dyn AutowirePolicy>,
}

impl DeferredAutowireRegistry {
    pub fn new(policy: Arc<dyn AutowirePolicy>) -> Self {
        Self {
            state: Mutex::new(DeferredState::default()),
            policy,
        }
    }

    pub fn is_initializing(&self) -> bool {
        self.state.lock().initializing
    }

    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn on_unit_created(
        &self,
        unit: PluggableUnit,
        binding: &dyn UnitBinding,
    ) -> AutoconfResult<CreationOutcome> {
        {
            let mut state = self.state.lock();
            if !state.initializing {
                debug!("Deferring binding of {} {}", unit.kind, unit.name);
                let existing = state
                    .buffer
                    .iter_mut()
                    .find(|u| u.kind == unit.kind && u.name == unit.name);
                match existing {
                    Some(slot) => *slot = unit,
                    None => state.buffer.push(unit),
                }
                return Ok(CreationOutcome::Buffered);
            }
        }

        if !self.policy.is_eligible(&unit) {
            debug!("Skipping binding of {} {}", unit.kind, unit.name);
            return Ok(CreationOutcome::Skipped);
        }
        binding.bind_unit(&unit).map(CreationOutcome::Bound)
    }

    /// Drain the buffer once. Every buffered unit is attempted; the first
    /// failure is returned afterwards.
    pub fn on_initializing(&self, binding: &dyn UnitBinding) -> AutoconfResult<DrainReport> {
        let drained = {
            let mut state = self.state.lock();
            if state.initializing {
                return Ok(DrainReport::default());
            }
            state.initializing = true;
            std::mem::take(&mut state.buffer)
        };

        let mut report = DrainReport::default();
        let mut first_error: Option<AutoconfError> = None;
        for unit in drained {
            if !self.policy.is_eligible(&unit) {
                report.skipped += 1;
                continue;
            }
            match binding.bind_unit(&unit) {
                Ok(_) => report.bound += 1,
                Err(e) => {
                    error!("Failed to bind {} {}: {}", unit.kind, unit.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        info!(
            "Deferred binding drained: {} bound, {} skipped",
            report.bound, report.skipped
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Reset so that a restarted engine buffers again
    pub fn on_stop(&self) {
        let mut state = self.state.lock();
        state.initializing = false;
        state.buffer.clear();
    }
}
