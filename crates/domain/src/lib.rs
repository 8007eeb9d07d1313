//! Contracts between the configuration engine and the objects it configures.

pub mod binder;
pub mod containers;
pub mod events;
pub mod registry;
pub mod settings;
pub mod target;
pub mod units;

pub use autoconf_core::{AutoconfError, AutoconfResult};
pub use binder::PropertyBinder;
pub use containers::{GlobalOptions, ListBean, MapBean, RouteTemplateParameters, ValueBean};
pub use events::{LifecycleEvent, LifecycleSignal, TriggerReason};
pub use registry::{resolve_bean_spec, BeanRegistry, BeanSpec, InMemoryRegistry};
pub use settings::{DurationAction, DurationSettings, MainSettings};
pub use target::{shared, AutowireSlot, BindingTarget, OptionTarget, SetOutcome, SharedTarget};
pub use units::{
    AutowirePolicy, ContextAutowirePolicy, PluggableUnit, StaticUnitResolver, UnitKind,
    UnitResolver,
};
