//! Bean creation and bean property binding for the `camel.beans.` namespace.

use std::sync::Arc;

use tracing::{debug, info};

use autoconf_core::keys;
use autoconf_core::{AutoconfError, AutoconfResult, ConfigurationBag, PropertyEntry, ProvenanceLedger};
use autoconf_domain::{
    resolve_bean_spec, shared, BeanRegistry, BindingTarget, ListBean, MapBean, PropertyBinder,
};

use crate::binding::OptionBinder;

pub const BEANS_PREFIX: &str = "camel.beans.";

/// Creates beans and then binds their properties.
///
/// Creation keys (no dot, no bracket) always run first. Failing to resolve or
/// create a bean is fatal whatever the fail-fast mode.
pub struct BeanBinder<'a> {
    registry: &'a Arc<dyn BeanRegistry>,
    binder: &'a OptionBinder,
}

impl<'a> BeanBinder<'a> {
    pub fn new(registry: &'a Arc<dyn BeanRegistry>, binder: &'a OptionBinder) -> Self {
        Self { registry, binder }
    }

    /// Consume bean keys from `bag`; option keys the beans do not know stay in it
    pub fn bind(&self, bag: &mut ConfigurationBag, applied: &mut ProvenanceLedger) -> AutoconfResult<()> {
        self.create_beans(bag, applied)?;
        self.fill_containers(bag, applied)?;
        self.bind_properties(bag, applied)
    }

    fn create_beans(&self, bag: &mut ConfigurationBag, applied: &mut ProvenanceLedger) -> AutoconfResult<()> {
        let creations: Vec<PropertyEntry> = bag
            .iter()
            .filter(|e| !e.key.contains('.') && !e.key.contains('['))
            .cloned()
            .collect();

        for entry in creations {
            let bean = resolve_bean_spec(&**self.registry, &entry.key, &entry.value)?;
            self.registry.bind(&entry.key, bean);
            info!("Created bean {} from {}", entry.key, entry.source);
            bag.remove(&entry.key);
            applied.put_with_default(
                format!("{BEANS_PREFIX}{}", entry.key),
                entry.value,
                entry.source,
                entry.default_value,
            );
        }
        Ok(())
    }

    /// `name[key]=value` entries create map or list beans on demand
    fn fill_containers(&self, bag: &mut ConfigurationBag, applied: &mut ProvenanceLedger) -> AutoconfResult<()> {
        let bracketed: Vec<(String, String, PropertyEntry)> = bag
            .iter()
            .filter_map(|e| {
                let (name, index, rest) = keys::split_bracket(&e.key)?;
                (rest.is_empty() && !name.contains('.'))
                    .then(|| (name.to_string(), index.to_string(), e.clone()))
            })
            .collect();

        let mut names: Vec<&str> = Vec::new();
        for (name, _, _) in &bracketed {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        for name in names {
            let group: Vec<&(String, String, PropertyEntry)> =
                bracketed.iter().filter(|(n, _, _)| n == name).collect();

            let bean = match self.registry.lookup_by_name(name) {
                Some(existing) => existing,
                None => {
                    let is_list = group
                        .iter()
                        .all(|(_, idx, _)| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()));
                    let created = if is_list {
                        shared(ListBean::default())
                    } else {
                        shared(MapBean::default())
                    };
                    debug!("Created {} bean {}", if is_list { "list" } else { "map" }, name);
                    self.registry.bind(name, created.clone());
                    created
                }
            };

            for (_, index, entry) in group {
                bean.lock().set_option(index, &entry.value)?;
                bag.remove(&entry.key);
                applied.put_with_default(
                    format!("{BEANS_PREFIX}{}", entry.key),
                    entry.value.clone(),
                    entry.source.clone(),
                    entry.default_value.clone(),
                );
            }
        }
        Ok(())
    }

    fn bind_properties(&self, bag: &mut ConfigurationBag, applied: &mut ProvenanceLedger) -> AutoconfResult<()> {
        let mut names: Vec<String> = Vec::new();
        for key in bag.keys() {
            if let Some((name, _)) = keys::split_first(key) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        for name in names {
            let bean = self.registry.lookup_by_name(&name).ok_or_else(|| {
                AutoconfError::unresolvable_target("bean", &name, format!("{BEANS_PREFIX}{name}"))
            })?;
            let prefix = format!("{name}.");
            let mut sub = bag.extract(&prefix);
            let target = BindingTarget::new(&name, bean, format!("{BEANS_PREFIX}{prefix}"));
            self.binder.bind(&target, &mut sub, applied)?;

            let leftover: Vec<String> = sub.keys().map(|k| format!("{prefix}{k}")).collect();
            let consumed: Vec<String> = bag
                .keys()
                .filter(|k| keys::starts_with_ignore_case(k, &prefix) && !leftover.iter().any(|l| l == k))
                .map(str::to_string)
                .collect();
            for key in consumed {
                bag.remove(&key);
            }
        }
        Ok(())
    }
}
