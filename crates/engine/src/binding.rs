//! Applies configuration bags onto option targets.

use std::sync::Arc;

use tracing::{debug, warn};

use autoconf_core::keys;
use autoconf_core::sensitive;
use autoconf_core::{AutoconfError, AutoconfResult, ConfigurationBag, PropertyEntry, ProvenanceLedger};
use autoconf_domain::{BeanRegistry, BindingTarget, PropertyBinder, SetOutcome, SharedTarget};

const BEAN_REFERENCE: &str = "#bean:";

/// Binds bags onto targets, failing on unknown options when `fail_fast` is set
#[derive(Clone)]
pub struct OptionBinder {
    fail_fast: bool,
    registry: Option<Arc<dyn BeanRegistry>>,
}

impl OptionBinder {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            registry: None,
        }
    }

    /// Registry used to resolve `#bean:name` values
    pub fn with_registry(mut self, registry: Arc<dyn BeanRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    fn apply_one(
        &self,
        target: &BindingTarget,
        instance: &SharedTarget,
        option: &str,
        entry: &PropertyEntry,
    ) -> AutoconfResult<SetOutcome> {
        if let Some(reference) = entry.value.strip_prefix(BEAN_REFERENCE) {
            let registry = self.registry.as_ref().ok_or_else(|| {
                AutoconfError::unresolvable_target("bean", reference, full_key(target, &entry.key))
            })?;
            let bean = registry.lookup_by_name(reference.trim()).ok_or_else(|| {
                AutoconfError::unresolvable_target("bean", reference, full_key(target, &entry.key))
            })?;
            return instance.lock().set_reference(option, bean);
        }

        // nested option: try the sub-target first, fall back to the dotted name
        if let Some((head, tail)) = keys::split_first(option) {
            let sub = instance.lock().sub_target(head);
            if let Some(sub) = sub {
                return self.apply_one(target, &sub, tail, entry);
            }
        }

        instance.lock().set_option(option, &entry.value)
    }
}

fn full_key(target: &BindingTarget, key: &str) -> String {
    format!("{}{}", target.option_prefix, key)
}

impl PropertyBinder for OptionBinder {
    fn bind(
        &self,
        target: &BindingTarget,
        bag: &mut ConfigurationBag,
        applied: &mut ProvenanceLedger,
    ) -> AutoconfResult<usize> {
        let entries: Vec<PropertyEntry> = bag.iter().cloned().collect();
        let mut count = 0;

        for entry in entries {
            let option = keys::option_key(&entry.key);
            match self.apply_one(target, &target.instance, &option, &entry)? {
                SetOutcome::Applied => {
                    bag.remove(&entry.key);
                    applied.put_with_default(
                        full_key(target, &entry.key),
                        entry.value.clone(),
                        entry.source.clone(),
                        entry.default_value.clone(),
                    );
                    count += 1;
                }
                SetOutcome::Unknown if self.fail_fast => {
                    return Err(AutoconfError::unresolvable_option(
                        full_key(target, &entry.key),
                        &target.name,
                    ));
                }
                SetOutcome::Unknown => {
                    warn!(
                        "Property not auto-configured: {}={} on {}",
                        full_key(target, &entry.key),
                        sensitive::masked(&entry.key, &entry.value),
                        target.name
                    );
                }
            }
        }

        debug!("Bound {} options onto {}", count, target.name);
        Ok(count)
    }
}

/// Fill unset autowire slots with the single registry bean of the wanted type
pub fn autowire(instance: &SharedTarget, name: &str, registry: &dyn BeanRegistry) -> AutoconfResult<usize> {
    let slots = instance.lock().autowire_slots();
    let mut wired = 0;
    for slot in slots {
        let mut candidates = registry.find_by_type(&slot.type_name);
        if candidates.len() != 1 {
            continue;
        }
        let (bean_name, bean) = candidates.remove(0);
        if Arc::ptr_eq(&bean, instance) {
            continue;
        }
        if instance.lock().set_reference(&slot.option, bean)? == SetOutcome::Applied {
            debug!("Autowired {}.{} with bean {}", name, slot.option, bean_name);
            wired += 1;
        }
    }
    Ok(wired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoconf_core::SourceLabel;
    use autoconf_domain::target::parse_number;
    use autoconf_domain::{shared, AutowireSlot, InMemoryRegistry, MapBean, OptionTarget};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Client {
        timeout: u64,
        pool: Option<SharedTarget>,
    }

    impl OptionTarget for Client {
        fn type_name(&self) -> &str {
            "client"
        }

        fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
            if keys::option_eq(name, "timeout") {
                self.timeout = parse_number(name, value)?;
                return Ok(SetOutcome::Applied);
            }
            Ok(SetOutcome::Unknown)
        }

        fn set_reference(&mut self, name: &str, bean: SharedTarget) -> AutoconfResult<SetOutcome> {
            if keys::option_eq(name, "pool") {
                self.pool = Some(bean);
                return Ok(SetOutcome::Applied);
            }
            Ok(SetOutcome::Unknown)
        }

        fn autowire_slots(&self) -> Vec<AutowireSlot> {
            if self.pool.is_none() {
                vec![AutowireSlot::new("pool", "map")]
            } else {
                Vec::new()
            }
        }
    }

    fn bag(pairs: &[(&str, &str)]) -> ConfigurationBag {
        ConfigurationBag::from_pairs(pairs.iter().copied(), SourceLabel::Env)
    }

    #[test]
    fn test_tolerant_mode_keeps_unknown_keys() {
        let client = Arc::new(Mutex::new(Client::default()));
        let target = BindingTarget::new("client", client.clone(), "camel.beans.client.");
        let mut bag = bag(&[("timeout", "30"), ("unknownOption", "x")]);
        let mut applied = ProvenanceLedger::new();

        let count = OptionBinder::new(false).bind(&target, &mut bag, &mut applied).unwrap();

        assert_eq!(count, 1);
        assert_eq!(client.lock().timeout, 30);
        assert_eq!(bag.keys().collect::<Vec<_>>(), vec!["unknownOption"]);
        assert_eq!(applied.get("camel.beans.client.timeout"), Some("30"));
        assert_eq!(applied.location("camel.beans.client.timeout"), Some(&SourceLabel::Env));
    }

    #[test]
    fn test_fail_fast_aborts_on_unknown() {
        let target = BindingTarget::new("client", shared(Client::default()), "camel.beans.client.");
        let mut bag = bag(&[("unknownOption", "x")]);
        let err = OptionBinder::new(true)
            .bind(&target, &mut bag, &mut ProvenanceLedger::new())
            .unwrap_err();
        assert!(matches!(err, AutoconfError::UnresolvableOption { ref key, .. } if key == "camel.beans.client.unknownOption"));
    }

    #[test]
    fn test_invalid_value_is_fatal_even_when_tolerant() {
        let target = BindingTarget::new("client", shared(Client::default()), "x.");
        let mut bag = bag(&[("timeout", "soon")]);
        assert!(OptionBinder::new(false)
            .bind(&target, &mut bag, &mut ProvenanceLedger::new())
            .is_err());
    }

    #[test]
    fn test_bean_reference_values() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.bind("myPool", shared(MapBean::default()));
        let binder = OptionBinder::new(true).with_registry(registry);

        let client = Arc::new(Mutex::new(Client::default()));
        let target = BindingTarget::new("client", client.clone(), "x.");
        let mut ok = bag(&[("pool", "#bean:myPool")]);
        binder.bind(&target, &mut ok, &mut ProvenanceLedger::new()).unwrap();
        assert!(client.lock().pool.is_some());

        let mut missing = bag(&[("pool", "#bean:nope")]);
        let err = binder
            .bind(&target, &mut missing, &mut ProvenanceLedger::new())
            .unwrap_err();
        assert!(err.is_fatal_regardless_of_mode());
    }

    #[test]
    fn test_autowire_by_single_type() {
        let registry = InMemoryRegistry::new();
        let client = Arc::new(Mutex::new(Client::default()));
        let shared_client: SharedTarget = client.clone();

        assert_eq!(autowire(&shared_client, "client", &registry).unwrap(), 0);
        registry.bind("pool", shared(MapBean::default()));
        assert_eq!(autowire(&shared_client, "client", &registry).unwrap(), 1);
        assert!(client.lock().pool.is_some());
    }
}
