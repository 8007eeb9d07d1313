use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use autoconf_core::{AutoconfError, AutoconfResult};

use crate::containers::ValueBean;
use crate::target::{shared, SharedTarget};

/// Registry of named beans
pub trait BeanRegistry: Send + Sync {
    fn lookup_by_name(&self, name: &str) -> Option<SharedTarget>;

    /// All beans whose `type_name` equals `type_name`, as (name, bean)
    fn find_by_type(&self, type_name: &str) -> Vec<(String, SharedTarget)>;

    fn bind(&self, name: &str, bean: SharedTarget);

    /// Create a new instance of a registered type
    fn instantiate(&self, type_name: &str) -> AutoconfResult<SharedTarget>;

    fn names(&self) -> Vec<String>;
}

/// Textual bean specification used by bean-creation keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeanSpec {
    /// `#class:TypeName` creates a new instance
    Class(String),
    /// `#type:TypeName` takes the single existing bean of that type
    Type(String),
    /// `#bean:name` refers to an existing bean
    Reference(String),
    /// Anything else is bound as a plain value
    Value(String),
}

impl BeanSpec {
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if let Some(class) = spec.strip_prefix("#class:") {
            Self::Class(class.trim().to_string())
        } else if let Some(ty) = spec.strip_prefix("#type:") {
            Self::Type(ty.trim().to_string())
        } else if let Some(name) = spec.strip_prefix("#bean:") {
            Self::Reference(name.trim().to_string())
        } else {
            Self::Value(spec.to_string())
        }
    }
}

/// Turn a bean specification into a live instance
pub fn resolve_bean_spec(
    registry: &dyn BeanRegistry,
    name: &str,
    spec: &str,
) -> AutoconfResult<SharedTarget> {
    match BeanSpec::parse(spec) {
        BeanSpec::Class(type_name) => registry.instantiate(&type_name).map_err(|e| {
            AutoconfError::BeanCreation {
                name: name.to_string(),
                message: e.to_string(),
            }
        }),
        BeanSpec::Type(type_name) => {
            let mut found = registry.find_by_type(&type_name);
            match found.len() {
                1 => Ok(found.remove(0).1),
                0 => Err(AutoconfError::BeanCreation {
                    name: name.to_string(),
                    message: format!("no bean of type {type_name} in registry"),
                }),
                n => Err(AutoconfError::BeanCreation {
                    name: name.to_string(),
                    message: format!("found {n} beans of type {type_name}, expected exactly one"),
                }),
            }
        }
        BeanSpec::Reference(reference) => registry.lookup_by_name(&reference).ok_or_else(|| {
            AutoconfError::BeanCreation {
                name: name.to_string(),
                message: format!("no bean named {reference} in registry"),
            }
        }),
        BeanSpec::Value(value) => Ok(shared(ValueBean { value })),
    }
}

type BeanFactory = Arc<dyn Fn() -> SharedTarget + Send + Sync>;

/// Thread-safe in-memory registry with per-type factories
#[derive(Default)]
pub struct InMemoryRegistry {
    beans: RwLock<Vec<(String, SharedTarget)>>,
    factories: RwLock<HashMap<String, BeanFactory>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> SharedTarget + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(type_name.into(), Arc::new(factory));
    }
}

impl BeanRegistry for InMemoryRegistry {
    fn lookup_by_name(&self, name: &str) -> Option<SharedTarget> {
        self.beans
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.clone())
    }

    fn find_by_type(&self, type_name: &str) -> Vec<(String, SharedTarget)> {
        self.beans
            .read()
            .iter()
            .filter(|(_, b)| b.lock().type_name() == type_name)
            .map(|(n, b)| (n.clone(), b.clone()))
            .collect()
    }

    fn bind(&self, name: &str, bean: SharedTarget) {
        let mut beans = self.beans.write();
        match beans.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = bean,
            None => beans.push((name.to_string(), bean)),
        }
        debug!("Bound bean {} into registry", name);
    }

    fn instantiate(&self, type_name: &str) -> AutoconfResult<SharedTarget> {
        let factory = self
            .factories
            .read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| {
                AutoconfError::Configuration(format!("no factory registered for type {type_name}"))
            })?;
        Ok(factory())
    }

    fn names(&self) -> Vec<String> {
        self.beans.read().iter().map(|(n, _)| n.clone()).collect()
    }
}
