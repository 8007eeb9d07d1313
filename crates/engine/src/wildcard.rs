//! Wildcard entries kept for units that do not exist yet.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use autoconf_core::keys;
use autoconf_core::{
    AutoconfResult, ConfigurationBag, DiagnosticsReport, PropertyEntry, ProvenanceLedger, SourceLabel,
};
use autoconf_domain::{BindingTarget, PluggableUnit, PropertyBinder};

/// One stored wildcard entry. Entries stay in the store after use; the set of
/// target names they were applied to is their history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WildcardEntry {
    /// Key up to and including the segment holding the `*`
    pub pattern: String,
    /// Option applied to matching targets
    pub key: String,
    pub value: String,
    pub source: SourceLabel,
    pub applied_to: BTreeSet<String>,
}

#[derive(Default)]
pub struct WildcardDeferralStore {
    entries: Mutex<Vec<WildcardEntry>>,
    /// Normalized `target.option` paths set by explicit keys; wildcards skip them
    explicit: Mutex<BTreeSet<String>>,
}

impl WildcardDeferralStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry. Storing the same pattern and key again replaces the
    /// value, and a changed value applies again to every target.
    pub fn store_wildcard(
        &self,
        pattern: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        source: SourceLabel,
    ) {
        let (pattern, key, value) = (pattern.into(), key.into(), value.into());
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.pattern == pattern && e.key == key) {
            Some(existing) => {
                if existing.value != value {
                    existing.applied_to.clear();
                }
                existing.value = value;
                existing.source = source;
            }
            None => entries.push(WildcardEntry {
                pattern,
                key,
                value,
                source,
                applied_to: BTreeSet::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<WildcardEntry> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
        self.explicit.lock().clear();
    }

    /// Record an option set by an explicit key such as
    /// `camel.component.http.timeout`; no wildcard entry overwrites it.
    pub fn mark_explicit(&self, target_key: &str, option: &str) {
        self.explicit
            .lock()
            .insert(keys::normalize(&format!("{target_key}.{option}")));
    }

    fn is_explicit(explicit: &BTreeSet<String>, target_key: &str, option: &str) -> bool {
        explicit.contains(&keys::normalize(&format!("{target_key}.{option}")))
    }

    /// Apply every matching entry not yet applied to this unit.
    ///
    /// Matching entries are claimed under the lock and bound outside it, so a
    /// unit name receives a given entry at most once.
    pub fn apply_to(
        &self,
        unit: &PluggableUnit,
        binder: &dyn PropertyBinder,
        applied: &mut ProvenanceLedger,
    ) -> AutoconfResult<usize> {
        let target_key = format!("{}{}", unit.kind.namespace(), unit.name);
        let explicit = self.explicit.lock().clone();
        let mut bag = ConfigurationBag::new();
        let mut claimed = Vec::new();
        {
            let mut entries = self.entries.lock();
            for entry in entries.iter_mut() {
                if !keys::wildcard_match(&entry.pattern, &target_key)
                    || Self::is_explicit(&explicit, &target_key, &entry.key)
                    || !entry.applied_to.insert(unit.name.clone())
                {
                    continue;
                }
                claimed.push((entry.pattern.clone(), entry.key.clone()));
                bag.merge_entry(PropertyEntry::new(&entry.key, &entry.value, entry.source.clone()));
            }
        }
        if bag.is_empty() {
            return Ok(0);
        }

        debug!("Applying {} wildcard options to {} {}", bag.len(), unit.kind, unit.name);
        let prefix = format!("{target_key}.");
        let target = BindingTarget::new(&unit.name, unit.instance.clone(), &prefix);
        let mut summary = ProvenanceLedger::new();
        let count = match binder.bind(&target, &mut bag, &mut summary) {
            Ok(count) => count,
            Err(err) => {
                self.release(&claimed, &unit.name);
                return Err(err);
            }
        };

        DiagnosticsReport::from_ledger(
            format!("Auto-configuration {} {} summary", unit.kind, unit.name),
            &summary,
            |_| true,
        )
        .log();
        applied.merge_from(&summary);
        Ok(count)
    }

    /// Undo claims made for a binding that failed, so a later attempt retries
    fn release(&self, claimed: &[(String, String)], name: &str) {
        let mut entries = self.entries.lock();
        for entry in entries.iter_mut() {
            if claimed.iter().any(|(p, k)| *p == entry.pattern && *k == entry.key) {
                entry.applied_to.remove(name);
            }
        }
    }
}
