//! Property source implementations
//!
//! Each source loads a prefix-filtered set of keys together with the label
//! of where every value came from. A source that does not exist is empty.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use autoconf_core::keys;
use autoconf_core::{AutoconfResult, ProvenanceLedger, SourceKind, SourceLabel};

use crate::formats;

/// Key predicate handed to [`PropertySource::load`]
pub type KeyFilter<'a> = &'a dyn Fn(&str) -> bool;

pub fn accept_all(_: &str) -> bool {
    true
}

/// A source of raw key/value pairs
pub trait PropertySource: Send + Sync {
    /// Precedence class used to order sources
    fn kind(&self) -> SourceKind;

    /// Human readable name for logs
    fn name(&self) -> String;

    fn load(&self, filter: KeyFilter<'_>) -> AutoconfResult<ProvenanceLedger>;

    /// Known unit names that help restore dashed names from environment variables
    fn accept_name_hints(&self, _hints: &[String]) {}
}

/// Loaded property files plus the override layer folded on top of them
#[derive(Default)]
pub struct PropertiesSource {
    locations: Vec<PathBuf>,
    overrides: RwLock<ProvenanceLedger>,
}

impl PropertiesSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later locations win over earlier ones
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.locations.push(path.into());
        self
    }

    /// Programmatic override property
    pub fn add_override(&self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.write().put(key, value, SourceLabel::Override);
    }

    /// Fold entries, typically read from override files, into the override layer
    pub fn merge_overrides(&self, overrides: &ProvenanceLedger) {
        self.overrides.write().merge_from(overrides);
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    fn load_location(path: &Path, filter: KeyFilter<'_>, into: &mut ProvenanceLedger) -> AutoconfResult<()> {
        if !path.exists() {
            debug!("Property location {} not found, skipping", path.display());
            return Ok(());
        }
        let label = SourceLabel::Location(path.display().to_string());
        for (key, value) in formats::parse_file(path)? {
            if filter(&key) {
                into.put(key, value, label.clone());
            }
        }
        Ok(())
    }
}

impl PropertySource for PropertiesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Location
    }

    fn name(&self) -> String {
        "properties".to_string()
    }

    fn load(&self, filter: KeyFilter<'_>) -> AutoconfResult<ProvenanceLedger> {
        let mut ledger = ProvenanceLedger::new();
        for path in &self.locations {
            Self::load_location(path, filter, &mut ledger)?;
        }
        for entry in self.overrides.read().iter() {
            if filter(&entry.key) {
                ledger.merge_entry(entry.clone());
            }
        }
        Ok(ledger)
    }
}

/// Operating system environment variables mapped to dotted keys
pub struct EnvironmentSource {
    vars: Option<Vec<(String, String)>>,
    prefixes: Vec<String>,
    hints: RwLock<Vec<String>>,
}

impl EnvironmentSource {
    /// Read the real process environment on every load
    pub fn from_process() -> Self {
        Self {
            vars: None,
            prefixes: vec!["CAMEL_".to_string()],
            hints: RwLock::new(Vec::new()),
        }
    }

    /// Fixed variable list, used by tests and embedders
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
            prefixes: vec!["CAMEL_".to_string()],
            hints: RwLock::new(Vec::new()),
        }
    }

    /// Only variables starting with one of these prefixes are considered
    pub fn with_prefixes<S: Into<String>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn snapshot(&self) -> Vec<(String, String)> {
        match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        }
    }
}

impl PropertySource for EnvironmentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Env
    }

    fn name(&self) -> String {
        "environment".to_string()
    }

    fn load(&self, filter: KeyFilter<'_>) -> AutoconfResult<ProvenanceLedger> {
        let hints = self.hints.read().clone();
        let mut ledger = ProvenanceLedger::new();
        for (name, value) in self.snapshot() {
            if !self.prefixes.iter().any(|p| name.starts_with(p.as_str())) {
                continue;
            }
            let key = keys::env_name_to_key(&name, &hints);
            if filter(&key) {
                ledger.put(key, value, SourceLabel::Env);
            }
        }
        Ok(ledger)
    }

    fn accept_name_hints(&self, hints: &[String]) {
        *self.hints.write() = hints.to_vec();
    }
}

/// Process-level properties, set programmatically
#[derive(Default)]
pub struct SystemPropertiesSource {
    props: RwLock<ProvenanceLedger>,
}

impl SystemPropertiesSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.props.write().put(key, value, SourceLabel::Sys);
    }

    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }
}

impl PropertySource for SystemPropertiesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Sys
    }

    fn name(&self) -> String {
        "system properties".to_string()
    }

    fn load(&self, filter: KeyFilter<'_>) -> AutoconfResult<ProvenanceLedger> {
        Ok(filtered(&self.props.read(), filter))
    }
}

/// Fixed entries under one label, used for initial properties and custom sources
pub struct MapSource {
    label: SourceLabel,
    entries: ProvenanceLedger,
}

impl MapSource {
    pub fn new<K, V>(label: SourceLabel, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries = ProvenanceLedger::from_pairs(pairs, label.clone());
        Self { label, entries }
    }

    pub fn initial<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(SourceLabel::Initial, pairs)
    }
}

impl PropertySource for MapSource {
    fn kind(&self) -> SourceKind {
        self.label.kind()
    }

    fn name(&self) -> String {
        self.label.to_string()
    }

    fn load(&self, filter: KeyFilter<'_>) -> AutoconfResult<ProvenanceLedger> {
        Ok(filtered(&self.entries, filter))
    }
}

fn filtered(ledger: &ProvenanceLedger, filter: KeyFilter<'_>) -> ProvenanceLedger {
    let mut out = ProvenanceLedger::new();
    for entry in ledger.iter().filter(|e| filter(&e.key)) {
        out.merge_entry(entry.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_location_is_empty() {
        let source = PropertiesSource::new().with_location("/definitely/not/here.properties");
        assert!(source.load(&accept_all).unwrap().is_empty());
    }

    #[test]
    fn test_override_layer_wins_over_files() {
        let mut file = NamedTempFile::with_suffix(".properties").unwrap();
        writeln!(file, "camel.context.name=fromFile\ncamel.rest.port=8080").unwrap();

        let source = PropertiesSource::new().with_location(file.path());
        source.add_override("camel.context.name", "fromOverride");

        let ledger = source.load(&accept_all).unwrap();
        assert_eq!(ledger.get("camel.context.name"), Some("fromOverride"));
        assert_eq!(ledger.location("camel.context.name"), Some(&SourceLabel::Override));
        assert!(matches!(ledger.location("camel.rest.port"), Some(SourceLabel::Location(_))));
    }

    #[test]
    fn test_environment_prefix_and_filter() {
        let source = EnvironmentSource::with_vars([
            ("CAMEL_CONTEXT_NAME", "env"),
            ("HOME", "/root"),
            ("CAMEL_REST_PORT", "9090"),
        ]);
        let ledger = source.load(&|k: &str| k.starts_with("camel.context.")).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("camel.context.name"), Some("env"));
        assert_eq!(ledger.location("camel.context.name"), Some(&SourceLabel::Env));
    }

    #[test]
    fn test_environment_hints() {
        let source = EnvironmentSource::with_vars([("CAMEL_COMPONENT_AWS2_S3_REGION", "eu")]);
        source.accept_name_hints(&["aws2-s3".to_string()]);
        let ledger = source.load(&accept_all).unwrap();
        assert_eq!(ledger.get("camel.component.aws2-s3.region"), Some("eu"));
    }
}
