//! Splits a merged ledger into per-target bags by namespace prefix.

use std::collections::HashMap;

use tracing::debug;

use autoconf_core::keys;
use autoconf_core::{AutoconfError, AutoconfResult, ConfigurationBag, PropertyEntry, ProvenanceLedger};
use autoconf_domain::{SharedTarget, UnitKind, UnitResolver};

/// How keys of a namespace are routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceFamily {
    /// One bag applied to one well-known target
    Singleton,
    /// First segment selects a vault provider
    Vault,
    /// First segment is a developer console id
    DevConsole,
    /// `[id].parameter` keys
    RouteTemplate,
    Beans,
    /// `<name>.<option>` keys resolved to a live unit
    Named(UnitKind),
}

#[derive(Debug, Clone, Copy)]
pub struct Namespace {
    pub id: &'static str,
    pub prefix: &'static str,
    pub family: NamespaceFamily,
}

const fn singleton(id: &'static str, prefix: &'static str) -> Namespace {
    Namespace {
        id,
        prefix,
        family: NamespaceFamily::Singleton,
    }
}

/// Known namespaces. Prefixes are compared ignoring case and the longest
/// matching prefix wins.
pub const NAMESPACES: &[Namespace] = &[
    singleton("main", "camel.main."),
    singleton("context", "camel.context."),
    singleton("globalOptions", "camel.globalOptions."),
    singleton("variable", "camel.variable."),
    singleton("server", "camel.server."),
    singleton("ssl", "camel.ssl."),
    singleton("debug", "camel.debug."),
    singleton("trace", "camel.trace."),
    singleton("routeController", "camel.routeController."),
    singleton("rest", "camel.rest."),
    singleton("threadPool", "camel.threadpool."),
    singleton("health", "camel.health."),
    singleton("lra", "camel.lra."),
    singleton("opentelemetry", "camel.opentelemetry."),
    singleton("metrics", "camel.metrics."),
    singleton("resilience4j", "camel.resilience4j."),
    singleton("faultTolerance", "camel.faulttolerance."),
    singleton("properties", "camel.component.properties."),
    Namespace {
        id: "vault",
        prefix: "camel.vault.",
        family: NamespaceFamily::Vault,
    },
    Namespace {
        id: "devConsole",
        prefix: "camel.devConsole.",
        family: NamespaceFamily::DevConsole,
    },
    Namespace {
        id: "routeTemplate",
        prefix: "camel.routeTemplate",
        family: NamespaceFamily::RouteTemplate,
    },
    Namespace {
        id: "beans",
        prefix: "camel.beans.",
        family: NamespaceFamily::Beans,
    },
    Namespace {
        id: "component",
        prefix: "camel.component.",
        family: NamespaceFamily::Named(UnitKind::Component),
    },
    Namespace {
        id: "dataformat",
        prefix: "camel.dataformat.",
        family: NamespaceFamily::Named(UnitKind::DataFormat),
    },
    Namespace {
        id: "language",
        prefix: "camel.language.",
        family: NamespaceFamily::Named(UnitKind::Language),
    },
];

/// Vault providers with their own configuration section
pub const VAULT_PROVIDERS: &[&str] = &["aws", "gcp", "azure", "hashicorp", "kubernetes", "ibm"];

/// Keys outside this prefix are application properties and are not routed
pub const ROOT_PREFIX: &str = "camel.";

/// Options for one resolved named instance
#[derive(Clone)]
pub struct NamedInstanceBag {
    pub kind: UnitKind,
    pub name: String,
    pub target: SharedTarget,
    pub bag: ConfigurationBag,
}

/// A wildcard entry split into its pattern and option key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedWildcard {
    pub pattern: String,
    pub option: String,
    pub entry: PropertyEntry,
}

#[derive(Default)]
pub struct RoutedProperties {
    /// Singleton bags in namespace table order
    pub singletons: Vec<(&'static str, ConfigurationBag)>,
    /// Vault bags by provider; the empty name holds the vault's own options
    pub vault: Vec<(String, ConfigurationBag)>,
    pub dev_consoles: Vec<(String, ConfigurationBag)>,
    pub route_templates: ConfigurationBag,
    pub beans: ConfigurationBag,
    pub named: Vec<NamedInstanceBag>,
    pub wildcards: Vec<RoutedWildcard>,
    /// Keys under the root prefix that match no namespace
    pub unrouted: ConfigurationBag,
}

impl RoutedProperties {
    pub fn singleton(&self, id: &str) -> Option<&ConfigurationBag> {
        self.singletons.iter().find(|(n, _)| *n == id).map(|(_, b)| b)
    }
}

pub fn namespace_of(key: &str) -> Option<&'static Namespace> {
    NAMESPACES
        .iter()
        .filter(|ns| keys::starts_with_ignore_case(key, ns.prefix))
        .max_by_key(|ns| ns.prefix.len())
}

/// Routes ledger keys to namespace bags, resolving named instances as it goes
pub struct NamespaceRouter<'a> {
    resolver: &'a dyn UnitResolver,
}

impl<'a> NamespaceRouter<'a> {
    pub fn new(resolver: &'a dyn UnitResolver) -> Self {
        Self { resolver }
    }

    pub fn route(&self, ledger: &ProvenanceLedger) -> AutoconfResult<RoutedProperties> {
        let mut routed = RoutedProperties::default();
        let mut named_index: HashMap<(UnitKind, String), usize> = HashMap::new();

        for entry in ledger.iter() {
            if !keys::starts_with_ignore_case(&entry.key, ROOT_PREFIX) {
                continue;
            }
            let Some(ns) = namespace_of(&entry.key) else {
                routed.unrouted.merge_entry(entry.clone());
                continue;
            };
            let rest = &entry.key[ns.prefix.len()..];
            let stripped = |key: &str| PropertyEntry {
                key: key.to_string(),
                ..entry.clone()
            };

            match ns.family {
                NamespaceFamily::Singleton => {
                    push_group(&mut routed.singletons, ns.id, stripped(rest));
                }
                NamespaceFamily::Vault => {
                    let (provider, option) = match keys::split_first(rest) {
                        Some((head, tail))
                            if VAULT_PROVIDERS.iter().any(|p| p.eq_ignore_ascii_case(head)) =>
                        {
                            (head.to_ascii_lowercase(), tail)
                        }
                        _ => (String::new(), rest),
                    };
                    push_group(&mut routed.vault, provider, stripped(option));
                }
                NamespaceFamily::DevConsole => match keys::split_first(rest) {
                    Some((id, option)) if !option.is_empty() => {
                        push_group(&mut routed.dev_consoles, id.to_string(), stripped(option));
                    }
                    _ => routed.unrouted.merge_entry(entry.clone()),
                },
                NamespaceFamily::RouteTemplate => {
                    if rest.starts_with('[') {
                        routed.route_templates.merge_entry(stripped(rest));
                    } else {
                        routed.unrouted.merge_entry(entry.clone());
                    }
                }
                NamespaceFamily::Beans => routed.beans.merge_entry(stripped(rest)),
                NamespaceFamily::Named(kind) => {
                    let Some((name, option)) = keys::split_first(rest).filter(|(_, o)| !o.is_empty())
                    else {
                        routed.unrouted.merge_entry(entry.clone());
                        continue;
                    };
                    if name.contains('*') {
                        routed.wildcards.push(RoutedWildcard {
                            pattern: format!("{}{}", kind.namespace(), name),
                            option: option.to_string(),
                            entry: entry.clone(),
                        });
                        continue;
                    }
                    let (name, optional) = match name.strip_prefix('?') {
                        Some(n) => (n, true),
                        None => (name, false),
                    };
                    let slot = (kind, name.to_string());
                    if let Some(&idx) = named_index.get(&slot) {
                        routed.named[idx].bag.merge_entry(stripped(option));
                        continue;
                    }
                    match self.resolver.resolve(kind, name) {
                        Some(target) => {
                            named_index.insert(slot, routed.named.len());
                            let mut bag = ConfigurationBag::new();
                            bag.merge_entry(stripped(option));
                            routed.named.push(NamedInstanceBag {
                                kind,
                                name: name.to_string(),
                                target,
                                bag,
                            });
                        }
                        None if optional => {
                            debug!("Optional {} {} not found, ignoring {}", kind, name, entry.key);
                        }
                        None => {
                            return Err(AutoconfError::unresolvable_target(
                                kind.label(),
                                name,
                                &entry.key,
                            ));
                        }
                    }
                }
            }
        }

        Ok(routed)
    }
}

fn push_group<K: PartialEq>(groups: &mut Vec<(K, ConfigurationBag)>, id: K, entry: PropertyEntry) {
    match groups.iter_mut().find(|(k, _)| *k == id) {
        Some((_, bag)) => bag.merge_entry(entry),
        None => {
            let mut bag = ConfigurationBag::new();
            bag.merge_entry(entry);
            groups.push((id, bag));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoconf_core::SourceLabel;
    use autoconf_domain::{shared, MapBean, StaticUnitResolver};

    fn ledger(pairs: &[(&str, &str)]) -> ProvenanceLedger {
        ProvenanceLedger::from_pairs(pairs.iter().copied(), SourceLabel::Location("test".into()))
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(namespace_of("camel.component.properties.location").unwrap().id, "properties");
        assert_eq!(namespace_of("camel.component.http.timeout").unwrap().id, "component");
        assert_eq!(namespace_of("Camel.Context.name").unwrap().id, "context");
        assert!(namespace_of("camel.unknown.x").is_none());
    }

    #[test]
    fn test_route_families() {
        let resolver = StaticUnitResolver::new();
        resolver.register(UnitKind::Component, "http", shared(MapBean::default()));

        let routed = NamespaceRouter::new(&resolver)
            .route(&ledger(&[
                ("camel.context.name", "demo"),
                ("camel.vault.aws.region", "eu-west-1"),
                ("camel.vault.refreshPeriod", "10"),
                ("camel.devConsole.log.enabled", "true"),
                ("camel.routeTemplate[t1].greeting", "hi"),
                ("camel.beans.myBean", "#class:Foo"),
                ("camel.component.http.timeout", "30"),
                ("camel.component.http.retries", "2"),
                ("camel.component.*.bridgeErrorHandler", "true"),
                ("camel.component.?missing.x", "1"),
                ("camel.bogus.key", "1"),
                ("app.name", "ignored"),
            ]))
            .unwrap();

        assert_eq!(routed.singleton("context").unwrap().get("name"), Some("demo"));
        assert_eq!(routed.vault[0].0, "aws");
        assert_eq!(routed.vault[0].1.get("region"), Some("eu-west-1"));
        assert_eq!(routed.vault[1].0, "");
        assert_eq!(routed.dev_consoles[0].0, "log");
        assert_eq!(routed.route_templates.get("[t1].greeting"), Some("hi"));
        assert_eq!(routed.beans.get("myBean"), Some("#class:Foo"));
        assert_eq!(routed.named.len(), 1);
        assert_eq!(routed.named[0].bag.len(), 2);
        assert_eq!(routed.wildcards[0].pattern, "camel.component.*");
        assert_eq!(routed.wildcards[0].option, "bridgeErrorHandler");
        assert_eq!(routed.unrouted.len(), 1);
        assert!(routed.unrouted.contains_key("camel.bogus.key"));
    }

    #[test]
    fn test_missing_named_instance_is_fatal() {
        let resolver = StaticUnitResolver::new();
        let err = NamespaceRouter::new(&resolver)
            .route(&ledger(&[("camel.dataformat.json.prettyPrint", "true")]))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AutoconfError::UnresolvableTarget { ref kind, ref name, .. } if kind == "dataformat" && name == "json"
        ));
    }
}
