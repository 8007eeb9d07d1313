use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::target::SharedTarget;

/// Kinds of pluggable units that are configured by instance name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Component,
    DataFormat,
    Language,
}

impl UnitKind {
    pub const ALL: [UnitKind; 3] = [UnitKind::Component, UnitKind::DataFormat, UnitKind::Language];

    /// Key prefix for named instances of this kind, including the trailing dot
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Component => "camel.component.",
            Self::DataFormat => "camel.dataformat.",
            Self::Language => "camel.language.",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::DataFormat => "dataformat",
            Self::Language => "language",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A component, data format or language together with its registration name
#[derive(Clone)]
pub struct PluggableUnit {
    pub kind: UnitKind,
    pub name: String,
    pub instance: SharedTarget,
}

impl PluggableUnit {
    pub fn new(kind: UnitKind, name: impl Into<String>, instance: SharedTarget) -> Self {
        Self {
            kind,
            name: name.into(),
            instance,
        }
    }
}

impl fmt::Debug for PluggableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluggableUnit")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Looks up live units by name
pub trait UnitResolver: Send + Sync {
    fn resolve(&self, kind: UnitKind, name: &str) -> Option<SharedTarget>;

    /// Known names, used as hints when mapping environment variable names
    fn unit_names(&self, kind: UnitKind) -> Vec<String>;

    /// Developer console by id
    fn resolve_console(&self, _id: &str) -> Option<SharedTarget> {
        None
    }
}

/// Decides whether a freshly created unit is bound at all
pub trait AutowirePolicy: Send + Sync {
    fn is_eligible(&self, unit: &PluggableUnit) -> bool;
}

/// Eligible when autowiring is enabled for the context and for the unit itself
#[derive(Debug, Clone, Copy)]
pub struct ContextAutowirePolicy {
    pub context_enabled: bool,
}

impl Default for ContextAutowirePolicy {
    fn default() -> Self {
        Self {
            context_enabled: true,
        }
    }
}

impl AutowirePolicy for ContextAutowirePolicy {
    fn is_eligible(&self, unit: &PluggableUnit) -> bool {
        self.context_enabled && unit.instance.lock().autowire_enabled()
    }
}

type UnitFactory = Arc<dyn Fn() -> SharedTarget + Send + Sync>;

/// Resolver over registered instances and lazily created ones
#[derive(Default)]
pub struct StaticUnitResolver {
    instances: RwLock<HashMap<(UnitKind, String), SharedTarget>>,
    factories: RwLock<HashMap<(UnitKind, String), UnitFactory>>,
    consoles: RwLock<HashMap<String, SharedTarget>>,
}

impl StaticUnitResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: UnitKind, name: impl Into<String>, instance: SharedTarget) {
        self.instances.write().insert((kind, name.into()), instance);
    }

    /// Create the unit on first resolution
    pub fn register_factory<F>(&self, kind: UnitKind, name: impl Into<String>, factory: F)
    where
        F: Fn() -> SharedTarget + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert((kind, name.into()), Arc::new(factory));
    }

    pub fn register_console(&self, id: impl Into<String>, console: SharedTarget) {
        self.consoles.write().insert(id.into(), console);
    }
}

impl UnitResolver for StaticUnitResolver {
    fn resolve(&self, kind: UnitKind, name: &str) -> Option<SharedTarget> {
        let key = (kind, name.to_string());
        if let Some(found) = self.instances.read().get(&key) {
            return Some(found.clone());
        }
        let factory = self.factories.read().get(&key).cloned()?;
        let created = factory();
        self.instances.write().insert(key, created.clone());
        Some(created)
    }

    fn unit_names(&self, kind: UnitKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .instances
            .read()
            .keys()
            .chain(self.factories.read().keys())
            .filter(|(k, _)| *k == kind)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn resolve_console(&self, id: &str) -> Option<SharedTarget> {
        self.consoles.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::MapBean;
    use crate::target::shared;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_factory_creates_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let resolver = StaticUnitResolver::new();
        resolver.register_factory(UnitKind::Component, "seda", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            shared(MapBean::default())
        });

        assert!(resolver.resolve(UnitKind::Component, "seda").is_some());
        assert!(resolver.resolve(UnitKind::Component, "seda").is_some());
        assert!(resolver.resolve(UnitKind::Language, "seda").is_none());
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.unit_names(UnitKind::Component), vec!["seda".to_string()]);
    }

    #[test]
    fn test_context_policy() {
        let unit = PluggableUnit::new(UnitKind::Component, "x", shared(MapBean::default()));
        assert!(ContextAutowirePolicy::default().is_eligible(&unit));
        assert!(!ContextAutowirePolicy {
            context_enabled: false
        }
        .is_eligible(&unit));
    }
}
