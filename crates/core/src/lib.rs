//! Core building blocks shared by every autoconf crate: the error taxonomy,
//! source labels, the provenance ledger and diagnostics rendering.

pub mod diagnostics;
pub mod errors;
pub mod keys;
pub mod ledger;
pub mod sensitive;
pub mod source;

pub use diagnostics::{DiagnosticLine, DiagnosticsReport};
pub use errors::{AutoconfError, AutoconfResult};
pub use ledger::{ConfigurationBag, PropertyEntry, ProvenanceLedger};
pub use source::{SourceKind, SourceLabel, DEFAULT_PRECEDENCE};
