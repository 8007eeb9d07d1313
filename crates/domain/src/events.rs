//! Lifecycle events consumed and signals produced by the duration controller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Events published by the processing engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// A unit of work was created and is now in flight
    UnitCreated,
    /// A unit of work finished, successfully or not
    UnitCompleted { failed: bool },
    /// Configuration was reloaded
    UnitReloaded,
    ShutdownRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    MaxDuration,
    MaxMessages,
    MaxIdle,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxDuration => write!(f, "max duration"),
            Self::MaxMessages => write!(f, "max messages"),
            Self::MaxIdle => write!(f, "max idle"),
        }
    }
}

/// Signals produced when a duration limit is hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleSignal {
    ShutdownTriggered { reason: TriggerReason },
    StopTriggered { reason: TriggerReason },
}

impl LifecycleSignal {
    pub fn reason(&self) -> TriggerReason {
        match self {
            Self::ShutdownTriggered { reason } | Self::StopTriggered { reason } => *reason,
        }
    }
}
