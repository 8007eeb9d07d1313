//! Property sources, merging, namespace routing and binding.

pub mod aggregator;
pub mod beans;
pub mod binding;
pub mod bootstrap;
pub mod deferred;
pub mod engine;
pub mod formats;
pub mod overrides;
pub mod placeholders;
pub mod reload;
pub mod router;
pub mod sources;
pub mod wildcard;

pub use aggregator::PropertySourceAggregator;
pub use beans::BeanBinder;
pub use binding::{autowire, OptionBinder};
pub use bootstrap::BootstrapOptions;
pub use deferred::{CreationOutcome, DeferredAutowireRegistry, DrainReport, UnitBinding};
pub use engine::{ConfigurationEngine, ConfigurationEngineBuilder, ConfigurationReport};
pub use overrides::OverrideFileLoader;
pub use placeholders::PlaceholderRecorder;
pub use reload::{PropertiesReloadWatcher, RecommendedWatcher};
pub use router::{NamespaceRouter, RoutedProperties};
pub use sources::{
    EnvironmentSource, MapSource, PropertiesSource, PropertySource, SystemPropertiesSource,
};
pub use wildcard::{WildcardDeferralStore, WildcardEntry};
