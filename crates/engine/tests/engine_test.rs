use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use autoconf_core::keys;
use autoconf_core::{AutoconfError, AutoconfResult, ProvenanceLedger, SourceLabel};
use autoconf_domain::target::parse_number;
use autoconf_domain::{
    shared, BeanRegistry, InMemoryRegistry, MainSettings, MapBean, OptionTarget, PluggableUnit,
    SetOutcome, StaticUnitResolver, UnitKind,
};
use autoconf_engine::{
    ConfigurationEngine, CreationOutcome, EnvironmentSource, PropertiesReloadWatcher,
    PropertiesSource, SystemPropertiesSource,
};

#[derive(Default)]
struct HttpComponent {
    timeout: u64,
    retries: u32,
    password: String,
}

impl OptionTarget for HttpComponent {
    fn type_name(&self) -> &str {
        "http"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        if keys::option_eq(name, "timeout") {
            self.timeout = parse_number(name, value)?;
        } else if keys::option_eq(name, "retries") {
            self.retries = parse_number(name, value)?;
        } else if keys::option_eq(name, "password") {
            self.password = value.to_string();
        } else {
            return Ok(SetOutcome::Unknown);
        }
        Ok(SetOutcome::Applied)
    }
}

#[derive(Default)]
struct ContextSettings {
    name: String,
}

impl OptionTarget for ContextSettings {
    fn type_name(&self) -> &str {
        "context"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        if keys::option_eq(name, "name") {
            self.name = value.to_string();
            return Ok(SetOutcome::Applied);
        }
        Ok(SetOutcome::Unknown)
    }
}

fn tolerant() -> MainSettings {
    MainSettings {
        fail_fast: false,
        ..Default::default()
    }
}

fn resolver_with_http() -> (Arc<StaticUnitResolver>, Arc<Mutex<HttpComponent>>) {
    let resolver = Arc::new(StaticUnitResolver::new());
    let http = Arc::new(Mutex::new(HttpComponent::default()));
    resolver.register(UnitKind::Component, "http", http.clone());
    (resolver, http)
}

#[test]
fn test_system_property_beats_environment() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .source(Arc::new(EnvironmentSource::with_vars([(
            "CAMEL_COMPONENT_HTTP_TIMEOUT",
            "10",
        )])))
        .source(Arc::new(
            SystemPropertiesSource::new().with("camel.component.http.timeout", "5"),
        ))
        .resolver(resolver)
        .build();

    let report = engine.configure().unwrap();

    assert_eq!(http.lock().timeout, 5);
    assert_eq!(
        report.applied.location("camel.component.http.timeout"),
        Some(&SourceLabel::Sys)
    );
}

#[test]
fn test_unknown_option_tolerated_then_fatal_under_fail_fast() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .settings(tolerant())
        .initial_properties([
            ("camel.component.http.timeout", "30"),
            ("camel.component.http.bogus", "1"),
        ])
        .resolver(resolver.clone())
        .build();

    let report = engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 30);
    assert_eq!(report.not_configured.get("camel.component.http.bogus"), Some("1"));
    assert!(!report.applied.contains_key("camel.component.http.bogus"));

    let strict = ConfigurationEngine::builder()
        .initial_properties([("camel.component.http.bogus", "1")])
        .resolver(resolver)
        .build();
    let err = strict.configure().unwrap_err();
    assert!(matches!(err, AutoconfError::UnresolvableOption { .. }));
}

#[test]
fn test_missing_named_instance_is_fatal_unless_optional() {
    let engine = ConfigurationEngine::builder()
        .settings(tolerant())
        .initial_properties([("camel.component.nosuch.timeout", "1")])
        .build();
    assert!(matches!(
        engine.configure().unwrap_err(),
        AutoconfError::UnresolvableTarget { .. }
    ));

    let engine = ConfigurationEngine::builder()
        .settings(tolerant())
        .initial_properties([("camel.component.?nosuch.timeout", "1")])
        .build();
    assert!(engine.configure().is_ok());
}

#[test]
fn test_wildcard_applies_to_units_created_later() {
    let engine = ConfigurationEngine::builder()
        .initial_properties([("camel.component.*.timeout", "7")])
        .build();
    let report = engine.configure().unwrap();
    assert_eq!(report.wildcards_stored, 1);

    let early = Arc::new(Mutex::new(HttpComponent::default()));
    let outcome = engine
        .unit_created(PluggableUnit::new(UnitKind::Component, "early", early.clone()))
        .unwrap();
    assert_eq!(outcome, CreationOutcome::Buffered);
    assert_eq!(early.lock().timeout, 0);

    let drained = engine.initializing().unwrap();
    assert_eq!(drained.bound, 1);
    assert_eq!(early.lock().timeout, 7);

    let late = Arc::new(Mutex::new(HttpComponent::default()));
    let outcome = engine
        .unit_created(PluggableUnit::new(UnitKind::Component, "late", late.clone()))
        .unwrap();
    assert_eq!(outcome, CreationOutcome::Bound(1));
    assert_eq!(late.lock().timeout, 7);

    // same name again receives nothing new
    let again = Arc::new(Mutex::new(HttpComponent::default()));
    engine
        .unit_created(PluggableUnit::new(UnitKind::Component, "late", again.clone()))
        .unwrap();
    assert_eq!(again.lock().timeout, 0);
    assert_eq!(engine.applied().get("camel.component.late.timeout"), Some("7"));
}

#[test]
fn test_explicit_option_wins_over_wildcard() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .initial_properties([
            ("camel.component.*.timeout", "7"),
            ("camel.component.http.timeout", "9"),
        ])
        .resolver(resolver)
        .build();
    engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 9);
}

#[test]
fn test_configure_is_idempotent() {
    let (resolver, http) = resolver_with_http();
    let context = Arc::new(Mutex::new(ContextSettings::default()));
    let engine = ConfigurationEngine::builder()
        .initial_properties([
            ("camel.component.http.retries", "3"),
            ("camel.context.name", "orders"),
        ])
        .resolver(resolver)
        .target("context", context.clone())
        .build();

    let first = engine.configure().unwrap();
    let second = engine.configure().unwrap();

    assert_eq!(first.applied, second.applied);
    assert_eq!(http.lock().retries, 3);
    assert_eq!(context.lock().name, "orders");
}

#[test]
fn test_sensitive_values_are_masked_in_summary() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .initial_properties([("camel.component.http.password", "hunter2")])
        .resolver(resolver)
        .build();

    let report = engine.configure().unwrap();
    let text = report.summary().render_text();

    assert_eq!(http.lock().password, "hunter2");
    assert!(text.contains("camel.component.http.password=xxxxxx"));
    assert!(!text.contains("hunter2"));
    assert!(!report.summary_json().unwrap().contains("hunter2"));
}

#[test]
fn test_environment_disabled_from_properties() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .source(Arc::new(EnvironmentSource::with_vars([(
            "CAMEL_COMPONENT_HTTP_TIMEOUT",
            "10",
        )])))
        .initial_properties([
            ("camel.main.autoConfigurationEnvironmentVariablesEnabled", "false"),
            ("camel.component.http.timeout", "2"),
        ])
        .resolver(resolver)
        .build();

    engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 2);
    assert!(!engine.settings().environment_variables_enabled);
}

#[test]
fn test_auto_configuration_disabled_binds_nothing() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .initial_properties([
            ("camel.main.autoConfigurationEnabled", "false"),
            ("camel.component.http.timeout", "2"),
        ])
        .resolver(resolver)
        .build();

    let report = engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 0);
    assert!(report.not_configured.is_empty());
    assert!(!engine.settings().auto_configuration_enabled);
}

#[test]
fn test_beans_containers_and_templates() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.register_factory("http", || shared(HttpComponent::default()));
    let engine = ConfigurationEngine::builder()
        .initial_properties([
            ("camel.beans.client", "#class:http"),
            ("camel.beans.client.timeout", "15"),
            ("camel.beans.headers[accept]", "json"),
            ("camel.routeTemplate[0].templateId", "mytemplate"),
            ("camel.routeTemplate[0].bucket", "orders"),
            ("camel.globalOptions.CamelJacksonEnableTypeConverter", "true"),
            ("camel.variable.greeting", "hello"),
        ])
        .registry(registry.clone())
        .build();

    engine.configure().unwrap();

    let client = registry.lookup_by_name("client").unwrap();
    assert_eq!(client.lock().type_name(), "http");
    let headers = registry.lookup_by_name("headers").unwrap();
    assert_eq!(headers.lock().type_name(), "map");

    let params = engine.route_template_parameters().unwrap();
    assert_eq!(params.parameters("0").unwrap().get("bucket").map(String::as_str), Some("orders"));
    assert_eq!(
        engine.global_options().get("CamelJacksonEnableTypeConverter").map(String::as_str),
        Some("true")
    );
    assert_eq!(engine.variables().get("greeting").map(String::as_str), Some("hello"));
}

#[test]
fn test_override_files_and_properties_file() {
    let dir = TempDir::new().unwrap();
    let main_file = dir.path().join("application.properties");
    let overrides = dir.path().join("conf");
    std::fs::create_dir(&overrides).unwrap();

    let mut f = std::fs::File::create(&main_file).unwrap();
    writeln!(f, "camel.component.http.timeout=1").unwrap();
    writeln!(f, "camel.component.http.retries=4").unwrap();
    writeln!(
        f,
        "camel.main.fileConfigurations={}/*.properties",
        overrides.display()
    )
    .unwrap();
    std::fs::write(overrides.join("extra.properties"), "camel.component.http.timeout=99\n").unwrap();

    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .properties(PropertiesSource::new().with_location(&main_file))
        .resolver(resolver)
        .build();

    let report = engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 99);
    assert_eq!(http.lock().retries, 4);
    assert_eq!(
        report.applied.location("camel.component.http.timeout"),
        Some(&SourceLabel::Override)
    );
}

#[test]
fn test_reload_applies_changed_keys() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .initial_properties([("camel.component.http.timeout", "1")])
        .resolver(resolver)
        .build();
    engine.configure().unwrap();

    let changed = ProvenanceLedger::from_pairs(
        [("camel.component.http.timeout", "42")],
        SourceLabel::Location("application.properties".into()),
    );
    let report = engine.reload(&changed).unwrap();

    assert_eq!(http.lock().timeout, 42);
    assert_eq!(report.applied.get("camel.component.http.timeout"), Some("42"));
    assert_eq!(engine.merged().get("camel.component.http.timeout"), Some("42"));
}

#[test]
fn test_placeholders_resolve_from_merged_properties() {
    let engine = ConfigurationEngine::builder()
        .settings(tolerant())
        .initial_properties([("app.bucket", "orders")])
        .build();
    engine.configure().unwrap();

    let text = engine
        .resolve_placeholders("aws2-s3:{{app.bucket}}?region={{app.region:eu-west-1}}")
        .unwrap();
    assert_eq!(text, "aws2-s3:orders?region=eu-west-1");
    assert!(!engine.placeholder_summary().is_empty());
}

#[derive(Default)]
struct Consumer {
    pool: Option<autoconf_domain::SharedTarget>,
}

impl OptionTarget for Consumer {
    fn type_name(&self) -> &str {
        "consumer"
    }

    fn set_option(&mut self, _name: &str, _value: &str) -> AutoconfResult<SetOutcome> {
        Ok(SetOutcome::Unknown)
    }

    fn set_reference(
        &mut self,
        name: &str,
        bean: autoconf_domain::SharedTarget,
    ) -> AutoconfResult<SetOutcome> {
        if keys::option_eq(name, "pool") {
            self.pool = Some(bean);
            return Ok(SetOutcome::Applied);
        }
        Ok(SetOutcome::Unknown)
    }

    fn autowire_slots(&self) -> Vec<autoconf_domain::AutowireSlot> {
        if self.pool.is_none() {
            vec![autoconf_domain::AutowireSlot::new("pool", "map")]
        } else {
            Vec::new()
        }
    }
}

#[test]
fn test_autowire_fills_slot_on_created_unit() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.bind("pool", shared(MapBean::default()));
    let engine = ConfigurationEngine::builder()
        .settings(MainSettings {
            autowiring_enabled: true,
            ..Default::default()
        })
        .registry(registry)
        .build();
    engine.configure().unwrap();
    engine.initializing().unwrap();

    let consumer = Arc::new(Mutex::new(Consumer::default()));
    engine
        .unit_created(PluggableUnit::new(UnitKind::Component, "jms", consumer.clone()))
        .unwrap();
    assert!(consumer.lock().pool.is_some());
}

#[test]
fn test_autowiring_setting_applies_before_configure() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.bind("pool", shared(MapBean::default()));
    let engine = ConfigurationEngine::builder()
        .settings(MainSettings {
            autowiring_enabled: true,
            ..Default::default()
        })
        .registry(registry)
        .build();

    let consumer = Arc::new(Mutex::new(Consumer::default()));
    let outcome = engine
        .unit_created(PluggableUnit::new(UnitKind::Component, "jms", consumer.clone()))
        .unwrap();
    assert_eq!(outcome, CreationOutcome::Buffered);
    engine.initializing().unwrap();
    assert!(consumer.lock().pool.is_some());
}

#[test]
fn test_unrelated_reload_keeps_explicit_over_wildcard() {
    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .initial_properties([
            ("camel.component.*.timeout", "7"),
            ("camel.component.*.retries", "2"),
            ("camel.component.http.timeout", "9"),
        ])
        .resolver(resolver)
        .build();
    engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 9);
    assert_eq!(http.lock().retries, 2);

    http.lock().retries = 5;
    let changed = ProvenanceLedger::from_pairs(
        [("camel.main.name", "renamed")],
        SourceLabel::Location("application.properties".into()),
    );
    engine.reload(&changed).unwrap();
    assert_eq!(http.lock().timeout, 9);
    assert_eq!(http.lock().retries, 5);

    let changed = ProvenanceLedger::from_pairs(
        [("camel.component.*.timeout", "8"), ("camel.component.*.retries", "3")],
        SourceLabel::Location("application.properties".into()),
    );
    engine.reload(&changed).unwrap();
    assert_eq!(http.lock().timeout, 9);
    assert_eq!(http.lock().retries, 3);
}

#[test]
fn test_reload_respects_higher_precedence_owner() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("application.properties");
    std::fs::write(&file, "camel.component.http.timeout=1\ncamel.component.http.retries=1\n").unwrap();

    let (resolver, http) = resolver_with_http();
    let engine = ConfigurationEngine::builder()
        .source(Arc::new(
            SystemPropertiesSource::new().with("camel.component.http.timeout", "5"),
        ))
        .properties(PropertiesSource::new().with_location(&file))
        .resolver(resolver)
        .build();
    engine.configure().unwrap();
    assert_eq!(http.lock().timeout, 5);

    std::fs::write(&file, "camel.component.http.timeout=1\ncamel.component.http.retries=4\n").unwrap();
    let changed = PropertiesReloadWatcher::changed_properties(&file, &engine.merged()).unwrap();
    let report = engine.reload(&changed).unwrap();

    assert_eq!(http.lock().timeout, 5);
    assert_eq!(http.lock().retries, 4);
    assert!(!report.applied.contains_key("camel.component.http.timeout"));
    assert_eq!(
        engine.merged().location("camel.component.http.timeout"),
        Some(&SourceLabel::Sys)
    );
}

#[derive(Default)]
struct Credentials {
    profile: String,
}

impl OptionTarget for Credentials {
    fn type_name(&self) -> &str {
        "credentials"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        if keys::option_eq(name, "profile") {
            self.profile = value.to_string();
            return Ok(SetOutcome::Applied);
        }
        Ok(SetOutcome::Unknown)
    }
}

#[derive(Default)]
struct AwsVault {
    region: String,
    credentials: Arc<Mutex<Credentials>>,
}

impl OptionTarget for AwsVault {
    fn type_name(&self) -> &str {
        "awsVault"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        if keys::option_eq(name, "region") {
            self.region = value.to_string();
            return Ok(SetOutcome::Applied);
        }
        Ok(SetOutcome::Unknown)
    }

    fn sub_target(&self, name: &str) -> Option<autoconf_domain::SharedTarget> {
        if keys::option_eq(name, "credentials") {
            return Some(self.credentials.clone());
        }
        None
    }
}

#[derive(Default)]
struct VaultSettings {
    refresh_period: u64,
    aws: Arc<Mutex<AwsVault>>,
}

impl OptionTarget for VaultSettings {
    fn type_name(&self) -> &str {
        "vault"
    }

    fn set_option(&mut self, name: &str, value: &str) -> AutoconfResult<SetOutcome> {
        if keys::option_eq(name, "refreshPeriod") {
            self.refresh_period = parse_number(name, value)?;
            return Ok(SetOutcome::Applied);
        }
        Ok(SetOutcome::Unknown)
    }

    fn sub_target(&self, name: &str) -> Option<autoconf_domain::SharedTarget> {
        if keys::option_eq(name, "aws") {
            return Some(self.aws.clone());
        }
        None
    }
}

#[test]
fn test_vault_provider_sections_bind_onto_sub_targets() {
    let vault = Arc::new(Mutex::new(VaultSettings::default()));
    let aws = vault.lock().aws.clone();
    let engine = ConfigurationEngine::builder()
        .initial_properties([
            ("camel.vault.refreshPeriod", "30"),
            ("camel.vault.aws.region", "eu-west-1"),
            ("camel.vault.aws.credentials.profile", "ops"),
        ])
        .target("vault", vault.clone())
        .build();

    let report = engine.configure().unwrap();
    assert_eq!(vault.lock().refresh_period, 30);
    assert_eq!(aws.lock().region, "eu-west-1");
    assert_eq!(aws.lock().credentials.lock().profile, "ops");
    assert_eq!(
        report.applied.get("camel.vault.aws.credentials.profile"),
        Some("ops")
    );
}

#[test]
fn test_vault_provider_without_section_is_fatal() {
    let engine = ConfigurationEngine::builder()
        .settings(tolerant())
        .initial_properties([("camel.vault.gcp.projectId", "p1")])
        .target("vault", shared(VaultSettings::default()))
        .build();
    assert!(matches!(
        engine.configure().unwrap_err(),
        AutoconfError::UnresolvableTarget { .. }
    ));
}

#[test]
fn test_dev_console_binding() {
    let resolver = Arc::new(StaticUnitResolver::new());
    let console = Arc::new(Mutex::new(ContextSettings::default()));
    resolver.register_console("log", console.clone());

    let engine = ConfigurationEngine::builder()
        .initial_properties([("camel.devConsole.log.name", "tail")])
        .resolver(resolver.clone())
        .build();
    let report = engine.configure().unwrap();
    assert_eq!(console.lock().name, "tail");
    assert_eq!(report.applied.get("camel.devConsole.log.name"), Some("tail"));

    let engine = ConfigurationEngine::builder()
        .settings(tolerant())
        .initial_properties([("camel.devConsole.missing.name", "x")])
        .resolver(resolver)
        .build();
    assert!(matches!(
        engine.configure().unwrap_err(),
        AutoconfError::UnresolvableTarget { .. }
    ));
}
