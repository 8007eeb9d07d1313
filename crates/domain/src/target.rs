use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;

use autoconf_core::{AutoconfError, AutoconfResult};

/// Result of setting one option on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    /// The target has no option with that name
    Unknown,
}

/// An option that can be filled from the bean registry by type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutowireSlot {
    pub option: String,
    pub type_name: String,
}

impl AutowireSlot {
    pub fn new(option: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            type_name: type_name.into(),
        }
    }
}

/// Gives trait objects access to `Any` for downcasting
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Anything the engine can configure through a string-keyed property surface.
///
/// Names arrive in the spelling of the configuration key (`queueSize`,
/// `queue-size`, `QUEUESIZE`); implementations should compare them with
/// [`autoconf_core::keys::option_eq`].
pub trait OptionTarget: AsAny + Send {
    fn type_name(&self) -> &str;

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome>;

    /// Bind a bean reference (`#bean:name` values and autowiring)
    fn set_reference(&mut self, _name: &str, _bean: SharedTarget) -> AutoconfResult<SetOutcome> {
        Ok(SetOutcome::Unknown)
    }

    /// Nested configuration object, e.g. the `aws` section of vault settings
    fn sub_target(&self, _name: &str) -> Option<SharedTarget> {
        None
    }

    /// Options that are still unset and may be filled by type from the registry
    fn autowire_slots(&self) -> Vec<AutowireSlot> {
        Vec::new()
    }

    fn autowire_enabled(&self) -> bool {
        true
    }
}

/// A target shared between the registry, the engine and its owner
pub type SharedTarget = Arc<Mutex<dyn OptionTarget>>;

pub fn shared<T: OptionTarget + 'static>(target: T) -> SharedTarget {
    Arc::new(Mutex::new(target))
}

/// What a bag is applied to and the prefix reported in diagnostics
#[derive(Clone)]
pub struct BindingTarget {
    pub name: String,
    pub instance: SharedTarget,
    pub option_prefix: String,
}

impl BindingTarget {
    pub fn new(
        name: impl Into<String>,
        instance: SharedTarget,
        option_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instance,
            option_prefix: option_prefix.into(),
        }
    }
}

impl fmt::Debug for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTarget")
            .field("name", &self.name)
            .field("option_prefix", &self.option_prefix)
            .finish()
    }
}

/// Parse `true`/`false` (any case)
pub fn parse_bool(key: &str, value: &str) -> AutoconfResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AutoconfError::invalid_value(key, value, "expected true or false")),
    }
}

pub fn parse_number<T>(key: &str, value: &str) -> AutoconfResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AutoconfError::invalid_value(key, value, e.to_string()))
}
