use autoconf_core::{AutoconfResult, ConfigurationBag, ProvenanceLedger};

use crate::target::BindingTarget;

/// Applies a bag of options onto one target.
///
/// Applied keys are removed from `bag` and recorded in `applied` under their
/// full key (`target.option_prefix` + key). Keys the target does not know are
/// either an error (fail-fast) or left in the bag.
pub trait PropertyBinder: Send + Sync {
    fn bind(
        &self,
        target: &BindingTarget,
        bag: &mut ConfigurationBag,
        applied: &mut ProvenanceLedger,
    ) -> AutoconfResult<usize>;
}
