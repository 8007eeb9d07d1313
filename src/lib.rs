//! Layered configuration resolution, deferred property binding and
//! duration-based lifecycle control.

pub mod app;
pub mod common;

pub use app::{Application, ReloadGuard, EXIT_OK};
pub use autoconf_core::{AutoconfError, AutoconfResult, ProvenanceLedger, SourceLabel};
pub use autoconf_domain::{LifecycleEvent, MainSettings};
pub use autoconf_engine::{ConfigurationEngine, ConfigurationReport};
pub use autoconf_lifecycle::{DurationLifecycleController, ShutdownManager};
