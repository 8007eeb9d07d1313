//! 配置引擎
//!
//! 长期存活的单一所有者，持有一次配置流程和延迟绑定所需的全部状态。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use autoconf_core::keys;
use autoconf_core::sensitive;
use autoconf_core::{
    AutoconfError, AutoconfResult, ConfigurationBag, DiagnosticsReport, ProvenanceLedger,
};
use autoconf_domain::target::AsAny;
use autoconf_domain::{
    shared, AutowirePolicy, BeanRegistry, BindingTarget, ContextAutowirePolicy, GlobalOptions,
    InMemoryRegistry, MainSettings, MapBean, PluggableUnit, PropertyBinder,
    RouteTemplateParameters, SharedTarget, StaticUnitResolver, UnitKind, UnitResolver,
};

use crate::aggregator::PropertySourceAggregator;
use crate::beans::{BeanBinder, BEANS_PREFIX};
use crate::binding::{autowire, OptionBinder};
use crate::bootstrap::BootstrapOptions;
use crate::deferred::{CreationOutcome, DeferredAutowireRegistry, DrainReport, UnitBinding};
use crate::overrides::OverrideFileLoader;
use crate::placeholders::PlaceholderRecorder;
use crate::router::{NamespaceRouter, RoutedProperties};
use crate::sources::{accept_all, MapSource, PropertiesSource, PropertySource};
use crate::wildcard::WildcardDeferralStore;

const VARIABLE_PREFIX: &str = "camel.variable.";

/// 一次配置流程的结果
#[derive(Debug, Clone, Default)]
pub struct ConfigurationReport {
    /// 已应用到目标上的配置项及其来源
    pub applied: ProvenanceLedger,
    /// 已路由但没有匹配到属性或目标的配置项
    pub not_configured: ProvenanceLedger,
    pub wildcards_stored: usize,
}

impl ConfigurationReport {
    pub fn summary(&self) -> DiagnosticsReport {
        DiagnosticsReport::from_ledger("Auto-configuration summary", &self.applied, |_| true)
    }

    pub fn summary_json(&self) -> AutoconfResult<String> {
        self.summary().to_json()
    }
}

#[derive(Default)]
struct EngineState {
    merged: ProvenanceLedger,
    applied: ProvenanceLedger,
    fail_fast: bool,
    autowiring: bool,
}

pub struct ConfigurationEngine {
    aggregator: PropertySourceAggregator,
    properties: Arc<PropertiesSource>,
    settings: Arc<Mutex<MainSettings>>,
    resolver: Arc<dyn UnitResolver>,
    registry: Arc<dyn BeanRegistry>,
    targets: HashMap<String, SharedTarget>,
    global_options: Arc<Mutex<GlobalOptions>>,
    variables: Arc<Mutex<MapBean>>,
    wildcards: WildcardDeferralStore,
    deferred: DeferredAutowireRegistry,
    placeholders: PlaceholderRecorder,
    state: Mutex<EngineState>,
}

/// [`ConfigurationEngine`] 构建器
pub struct ConfigurationEngineBuilder {
    aggregator: PropertySourceAggregator,
    properties: Option<Arc<PropertiesSource>>,
    settings: MainSettings,
    resolver: Option<Arc<dyn UnitResolver>>,
    registry: Option<Arc<dyn BeanRegistry>>,
    targets: HashMap<String, SharedTarget>,
    policy: Option<Arc<dyn AutowirePolicy>>,
}

impl Default for ConfigurationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationEngineBuilder {
    pub fn new() -> Self {
        Self {
            aggregator: PropertySourceAggregator::new(),
            properties: None,
            settings: MainSettings::default(),
            resolver: None,
            registry: None,
            targets: HashMap::new(),
            policy: None,
        }
    }

    /// 配置文件来源，覆盖文件会合并到其中
    pub fn properties(mut self, properties: PropertiesSource) -> Self {
        self.properties = Some(Arc::new(properties));
        self
    }

    pub fn source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.aggregator.push_source(source);
        self
    }

    pub fn initial_properties<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.source(Arc::new(MapSource::initial(pairs)))
    }

    /// 编程方式提供的设置，可被 `camel.main.*` 配置项覆盖
    pub fn settings(mut self, settings: MainSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn UnitResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn BeanRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 单例命名空间（如 `context`、`vault`）的目标
    pub fn target(mut self, namespace_id: impl Into<String>, target: SharedTarget) -> Self {
        self.targets.insert(namespace_id.into(), target);
        self
    }

    pub fn autowire_policy(mut self, policy: Arc<dyn AutowirePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> ConfigurationEngine {
        let properties = self.properties.unwrap_or_default();
        let mut aggregator = self.aggregator;
        aggregator.push_source(properties.clone());

        let autowiring = self.settings.autowiring_enabled;
        let state = EngineState {
            fail_fast: self.settings.fail_fast,
            autowiring,
            ..Default::default()
        };
        let policy = self.policy.unwrap_or_else(|| {
            Arc::new(ContextAutowirePolicy {
                context_enabled: autowiring,
            })
        });

        ConfigurationEngine {
            aggregator,
            properties,
            settings: Arc::new(Mutex::new(self.settings)),
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(StaticUnitResolver::new())),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(InMemoryRegistry::new())),
            targets: self.targets,
            global_options: Arc::new(Mutex::new(GlobalOptions::default())),
            variables: Arc::new(Mutex::new(MapBean::default())),
            wildcards: WildcardDeferralStore::new(),
            deferred: DeferredAutowireRegistry::new(policy),
            placeholders: PlaceholderRecorder::new(),
            state: Mutex::new(state),
        }
    }
}

impl ConfigurationEngine {
    pub fn builder() -> ConfigurationEngineBuilder {
        ConfigurationEngineBuilder::new()
    }

    /// 执行完整的配置流程：引导选项、覆盖文件、合并、路由、绑定以及未配置项报告
    pub fn configure(&self) -> AutoconfResult<ConfigurationReport> {
        let defaults = self.settings.lock().clone();
        let bootstrap = BootstrapOptions::resolve(&self.aggregator, &defaults)?;
        bootstrap.apply_to(&mut self.settings.lock());

        let mut report = ConfigurationReport {
            applied: bootstrap.resolved.clone(),
            ..Default::default()
        };

        if !bootstrap.file_configurations.is_empty() {
            let overrides = OverrideFileLoader::new(bootstrap.file_configurations.clone()).load()?;
            info!("从覆盖文件加载了 {} 项配置", overrides.len());
            self.properties.merge_overrides(&overrides);
        }

        if !bootstrap.auto_configuration_enabled {
            info!("自动配置已禁用");
            let settings = self.settings.lock().clone();
            self.store_state(ProvenanceLedger::new(), &report.applied, &settings);
            return Ok(report);
        }

        self.aggregator.broadcast_name_hints(&self.name_hints());
        let merged = self
            .aggregator
            .merge_allowed(&|kind| bootstrap.allows(kind), &accept_all)?;
        debug!("合并得到 {} 项配置", merged.len());

        let routed = NamespaceRouter::new(self.resolver.as_ref()).route(&merged)?;

        self.wildcards.clear();
        self.apply_routed(routed, bootstrap.fail_fast, &mut report)?;

        let settings = self.settings.lock().clone();
        self.store_state(merged, &report.applied, &settings);
        if settings.log_summary {
            self.log_summary("Auto-configuration summary", &report.applied);
        }
        Ok(report)
    }

    /// 将变更的配置应用到运行中的目标
    ///
    /// 当前值来自更高优先级来源的配置项会被忽略，通配符只在新增或取值变化时应用。
    pub fn reload(&self, changed: &ProvenanceLedger) -> AutoconfResult<ConfigurationReport> {
        let (changed, fail_fast) = {
            let state = self.state.lock();
            (self.effective_changes(&state.merged, changed), state.fail_fast)
        };
        info!("自动配置 {} 项重新加载的配置", changed.len());
        let routed = NamespaceRouter::new(self.resolver.as_ref()).route(&changed)?;

        let mut report = ConfigurationReport::default();
        self.apply_routed(routed, fail_fast, &mut report)?;

        {
            let mut state = self.state.lock();
            state.merged.merge_from(&changed);
            state.applied.merge_from(&report.applied);
        }
        if self.settings.lock().log_summary {
            self.log_summary("Auto-configuration from reloaded properties summary", &report.applied);
        }
        Ok(report)
    }

    /// 可插拔单元已创建：立即绑定，或缓存到初始化阶段
    pub fn unit_created(&self, unit: PluggableUnit) -> AutoconfResult<CreationOutcome> {
        self.deferred.on_unit_created(unit, &EngineUnitBinding { engine: self })
    }

    /// 进入初始化阶段并绑定所有缓存的单元
    pub fn initializing(&self) -> AutoconfResult<DrainReport> {
        self.deferred.on_initializing(&EngineUnitBinding { engine: self })
    }

    pub fn stop(&self) {
        self.deferred.on_stop();
        debug!("配置引擎已停止");
    }

    /// 使用合并后的配置替换 `{{key}}` 占位符
    pub fn resolve_placeholders(&self, text: &str) -> AutoconfResult<String> {
        let merged = self.state.lock().merged.clone();
        self.placeholders.resolve(text, &merged)
    }

    pub fn placeholder_summary(&self) -> DiagnosticsReport {
        self.placeholders.summary()
    }

    pub fn settings(&self) -> MainSettings {
        self.settings.lock().clone()
    }

    pub fn merged(&self) -> ProvenanceLedger {
        self.state.lock().merged.clone()
    }

    /// 目前为止应用过的全部配置项，包括延迟绑定
    pub fn applied(&self) -> ProvenanceLedger {
        self.state.lock().applied.clone()
    }

    pub fn global_options(&self) -> BTreeMap<String, String> {
        self.global_options.lock().options.clone()
    }

    pub fn variables(&self) -> BTreeMap<String, String> {
        self.variables.lock().entries.clone()
    }

    pub fn route_template_parameters(&self) -> Option<RouteTemplateParameters> {
        let bean = self.registry.lookup_by_name(RouteTemplateParameters::BEAN_NAME)?;
        let guard = bean.lock();
        (*guard)
            .as_any()
            .downcast_ref::<RouteTemplateParameters>()
            .cloned()
    }

    pub fn wildcards(&self) -> &WildcardDeferralStore {
        &self.wildcards
    }

    pub fn registry(&self) -> &Arc<dyn BeanRegistry> {
        &self.registry
    }

    pub fn properties(&self) -> &Arc<PropertiesSource> {
        &self.properties
    }

    pub fn deferred(&self) -> &DeferredAutowireRegistry {
        &self.deferred
    }

    fn store_state(&self, merged: ProvenanceLedger, applied: &ProvenanceLedger, settings: &MainSettings) {
        let mut state = self.state.lock();
        state.merged = merged;
        state.applied = applied.clone();
        state.fail_fast = settings.fail_fast;
        state.autowiring = settings.autowiring_enabled;
    }

    /// 与当前来源比较后能够胜出的变更项
    fn effective_changes(&self, merged: &ProvenanceLedger, changed: &ProvenanceLedger) -> ProvenanceLedger {
        let mut effective = ProvenanceLedger::new();
        for entry in changed.iter() {
            let owner = merged
                .entry(&entry.key)
                .or_else(|| merged.find_normalized(&entry.key).and_then(|k| merged.entry(k)));
            match owner {
                Some(owner) if self.aggregator.outranks(&owner.source, &entry.source) => {
                    debug!(
                        "忽略重新加载的配置项 {}，当前来源 {} 优先级更高",
                        entry.key, owner.source
                    );
                }
                _ => effective.merge_entry(entry.clone()),
            }
        }
        effective
    }

    fn name_hints(&self) -> Vec<String> {
        UnitKind::ALL
            .iter()
            .flat_map(|kind| self.resolver.unit_names(*kind))
            .collect()
    }

    fn singleton_target(&self, id: &str) -> Option<SharedTarget> {
        match id {
            "main" => Some(self.settings.clone() as SharedTarget),
            "globalOptions" => Some(self.global_options.clone() as SharedTarget),
            "variable" => Some(self.variables.clone() as SharedTarget),
            other => self.targets.get(other).cloned(),
        }
    }

    /// 绑定所有路由后的配置组。main 选项最先绑定（可能改变快速失败模式），
    /// 随后是 bean，之后的配置项才能引用它们
    fn apply_routed(
        &self,
        mut routed: RoutedProperties,
        fail_fast: bool,
        report: &mut ConfigurationReport,
    ) -> AutoconfResult<()> {
        let applied = &mut report.applied;
        let mut leftovers: Vec<Leftover> = Vec::new();

        if let Some(pos) = routed.singletons.iter().position(|(id, _)| *id == "main") {
            let (_, mut bag) = routed.singletons.remove(pos);
            let binder = OptionBinder::new(fail_fast).with_registry(self.registry.clone());
            let target = BindingTarget::new("main", self.settings.clone(), "camel.main.");
            binder.bind(&target, &mut bag, applied)?;
            leftovers.push(Leftover::bound("camel.main.", bag));
        }

        let fail_fast = self.settings.lock().fail_fast;
        let binder = OptionBinder::new(fail_fast).with_registry(self.registry.clone());

        let mut beans = std::mem::take(&mut routed.beans);
        BeanBinder::new(&self.registry, &binder).bind(&mut beans, applied)?;
        leftovers.push(Leftover::bound(BEANS_PREFIX, beans));

        for (id, mut bag) in std::mem::take(&mut routed.singletons) {
            let prefix = singleton_prefix(id);
            match self.singleton_target(id) {
                Some(instance) => {
                    let target = BindingTarget::new(id, instance, &prefix);
                    binder.bind(&target, &mut bag, applied)?;
                    leftovers.push(Leftover::bound(prefix, bag));
                }
                None => {
                    debug!("命名空间 {} 没有注册目标", id);
                    leftovers.push(Leftover::orphaned(prefix, bag));
                }
            }
        }

        self.apply_vault(std::mem::take(&mut routed.vault), &binder, applied, &mut leftovers)?;
        self.apply_route_templates(std::mem::take(&mut routed.route_templates), &binder, applied, &mut leftovers)?;

        for (id, mut bag) in std::mem::take(&mut routed.dev_consoles) {
            let prefix = format!("camel.devConsole.{id}.");
            let console = self
                .resolver
                .resolve_console(&id)
                .ok_or_else(|| AutoconfError::unresolvable_target("devConsole", &id, &prefix))?;
            binder.bind(&BindingTarget::new(&id, console, &prefix), &mut bag, applied)?;
            leftovers.push(Leftover::bound(prefix, bag));
        }

        for wildcard in &routed.wildcards {
            self.wildcards.store_wildcard(
                &wildcard.pattern,
                &wildcard.option,
                &wildcard.entry.value,
                wildcard.entry.source.clone(),
            );
        }
        report.wildcards_stored = self.wildcards.len();

        for named in std::mem::take(&mut routed.named) {
            let target_key = format!("{}{}", named.kind.namespace(), named.name);
            for entry in named.bag.iter() {
                self.wildcards.mark_explicit(&target_key, &entry.key);
            }
            let unit = PluggableUnit::new(named.kind, &named.name, named.target.clone());
            self.wildcards.apply_to(&unit, &binder, applied)?;

            let prefix = format!("{target_key}.");
            let target = BindingTarget::new(&named.name, named.target, &prefix);
            let mut bag = named.bag;
            binder.bind(&target, &mut bag, applied)?;
            leftovers.push(Leftover::bound(prefix, bag));
        }

        self.apply_wildcards_to_known_units(&binder, applied)?;

        leftovers.push(Leftover::orphaned("", std::mem::take(&mut routed.unrouted)));
        self.report_leftovers(leftovers, fail_fast, &mut report.not_configured)
    }

    /// 已存在的单元立即应用匹配的通配符，之后创建的单元在创建时应用
    fn apply_wildcards_to_known_units(
        &self,
        binder: &OptionBinder,
        applied: &mut ProvenanceLedger,
    ) -> AutoconfResult<()> {
        let patterns: Vec<String> = self
            .wildcards
            .snapshot()
            .into_iter()
            .map(|entry| entry.pattern)
            .collect();
        if patterns.is_empty() {
            return Ok(());
        }
        for kind in UnitKind::ALL {
            for name in self.resolver.unit_names(kind) {
                let target_key = format!("{}{}", kind.namespace(), name);
                if !patterns.iter().any(|p| keys::wildcard_match(p, &target_key)) {
                    continue;
                }
                if let Some(instance) = self.resolver.resolve(kind, &name) {
                    self.wildcards
                        .apply_to(&PluggableUnit::new(kind, name, instance), binder, applied)?;
                }
            }
        }
        Ok(())
    }

    fn apply_vault(
        &self,
        vault: Vec<(String, ConfigurationBag)>,
        binder: &OptionBinder,
        applied: &mut ProvenanceLedger,
        leftovers: &mut Vec<Leftover>,
    ) -> AutoconfResult<()> {
        let parent = self.targets.get("vault").cloned();
        for (provider, mut bag) in vault {
            let prefix = if provider.is_empty() {
                "camel.vault.".to_string()
            } else {
                format!("camel.vault.{provider}.")
            };
            let Some(parent) = parent.clone() else {
                leftovers.push(Leftover::orphaned(prefix, bag));
                continue;
            };
            let instance = if provider.is_empty() {
                parent
            } else {
                let sub = parent.lock().sub_target(&provider);
                sub.ok_or_else(|| AutoconfError::unresolvable_target("vault", &provider, &prefix))?
            };
            binder.bind(&BindingTarget::new("vault", instance, &prefix), &mut bag, applied)?;
            leftovers.push(Leftover::bound(prefix, bag));
        }
        Ok(())
    }

    fn apply_route_templates(
        &self,
        mut bag: ConfigurationBag,
        binder: &OptionBinder,
        applied: &mut ProvenanceLedger,
        leftovers: &mut Vec<Leftover>,
    ) -> AutoconfResult<()> {
        if bag.is_empty() {
            return Ok(());
        }
        let params = self
            .registry
            .lookup_by_name(RouteTemplateParameters::BEAN_NAME)
            .unwrap_or_else(|| shared(RouteTemplateParameters::default()));
        let target = BindingTarget::new("routeTemplate", params.clone(), "camel.routeTemplate");
        binder.bind(&target, &mut bag, applied)?;
        self.registry.bind(RouteTemplateParameters::BEAN_NAME, params);
        leftovers.push(Leftover::bound("camel.routeTemplate", bag));
        Ok(())
    }

    /// 没有被消费的配置项：快速失败模式下报错，否则警告。
    /// 绑定器已经警告过的配置项只做记录
    fn report_leftovers(
        &self,
        leftovers: Vec<Leftover>,
        fail_fast: bool,
        not_configured: &mut ProvenanceLedger,
    ) -> AutoconfResult<()> {
        for Leftover { prefix, bag, warned } in leftovers {
            for entry in bag.iter() {
                let key = format!("{prefix}{}", entry.key);
                if fail_fast {
                    return Err(AutoconfError::unresolvable_option(&key, prefix.trim_end_matches('.')));
                }
                if !warned {
                    warn!(
                        "配置项未被自动配置: {}={}",
                        key,
                        sensitive::masked(&key, &entry.value)
                    );
                }
                not_configured.put_with_default(
                    key,
                    entry.value.clone(),
                    entry.source.clone(),
                    entry.default_value.clone(),
                );
            }
        }
        Ok(())
    }

    fn log_summary(&self, title: &str, applied: &ProvenanceLedger) {
        DiagnosticsReport::from_ledger("Variables summary", applied, |k| {
            keys::starts_with_ignore_case(k, VARIABLE_PREFIX)
        })
        .log();
        DiagnosticsReport::from_ledger(title, applied, |k| {
            !keys::starts_with_ignore_case(k, VARIABLE_PREFIX)
        })
        .log();
    }
}

/// 绑定后配置组中剩余的配置项
struct Leftover {
    prefix: String,
    bag: ConfigurationBag,
    warned: bool,
}

impl Leftover {
    fn bound(prefix: impl Into<String>, bag: ConfigurationBag) -> Self {
        Self {
            prefix: prefix.into(),
            bag,
            warned: true,
        }
    }

    fn orphaned(prefix: impl Into<String>, bag: ConfigurationBag) -> Self {
        Self {
            prefix: prefix.into(),
            bag,
            warned: false,
        }
    }
}

fn singleton_prefix(id: &str) -> String {
    crate::router::NAMESPACES
        .iter()
        .find(|ns| ns.id == id)
        .map(|ns| ns.prefix.to_string())
        .unwrap_or_else(|| format!("camel.{id}."))
}

/// 单个单元的延迟绑定：先应用通配符，再自动装配
struct EngineUnitBinding<'a> {
    engine: &'a ConfigurationEngine,
}

impl UnitBinding for EngineUnitBinding<'_> {
    fn bind_unit(&self, unit: &PluggableUnit) -> AutoconfResult<usize> {
        let (fail_fast, autowiring) = {
            let state = self.engine.state.lock();
            (state.fail_fast, state.autowiring)
        };
        let binder = OptionBinder::new(fail_fast).with_registry(self.engine.registry.clone());

        let mut applied = ProvenanceLedger::new();
        let mut count = self.engine.wildcards.apply_to(unit, &binder, &mut applied)?;
        if autowiring {
            count += autowire(&unit.instance, &unit.name, self.engine.registry.as_ref())?;
        }

        self.engine.state.lock().applied.merge_from(&applied);
        debug!("已将 {} 个选项绑定到 {} {}", count, unit.kind, unit.name);
        Ok(count)
    }
}
