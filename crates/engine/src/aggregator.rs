//! Merges property sources into one provenance ledger.

use std::sync::Arc;

use tracing::debug;

use autoconf_core::keys;
use autoconf_core::{
    AutoconfResult, PropertyEntry, ProvenanceLedger, SourceKind, SourceLabel, DEFAULT_PRECEDENCE,
};

use crate::sources::{KeyFilter, PropertySource};

/// Applies sources from lowest to highest precedence so that every key is
/// owned by exactly one winning source.
pub struct PropertySourceAggregator {
    sources: Vec<Arc<dyn PropertySource>>,
    precedence: Vec<SourceKind>,
}

impl Default for PropertySourceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySourceAggregator {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            precedence: DEFAULT_PRECEDENCE.to_vec(),
        }
    }

    /// Replace the precedence table, highest first
    pub fn with_precedence(mut self, precedence: Vec<SourceKind>) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn add_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn push_source(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Arc<dyn PropertySource>] {
        &self.sources
    }

    pub fn broadcast_name_hints(&self, hints: &[String]) {
        for source in &self.sources {
            source.accept_name_hints(hints);
        }
    }

    fn rank(&self, kind: SourceKind) -> usize {
        self.precedence
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.precedence.len())
    }

    /// True when a value from `a` beats a value from `b`
    pub fn outranks(&self, a: &SourceLabel, b: &SourceLabel) -> bool {
        self.rank(a.kind()) < self.rank(b.kind())
    }

    /// Sources of the allowed kinds, lowest precedence first. Sources of equal
    /// rank keep registration order, later ones winning.
    fn ordered(&self, allow: &dyn Fn(SourceKind) -> bool) -> Vec<&Arc<dyn PropertySource>> {
        let mut ordered: Vec<&Arc<dyn PropertySource>> =
            self.sources.iter().filter(|s| allow(s.kind())).collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(self.rank(s.kind())));
        ordered
    }

    /// Merge every source
    pub fn merge(&self, filter: KeyFilter<'_>) -> AutoconfResult<ProvenanceLedger> {
        self.merge_allowed(&|_| true, filter)
    }

    /// Merge only sources whose kind passes `allow`
    pub fn merge_allowed(
        &self,
        allow: &dyn Fn(SourceKind) -> bool,
        filter: KeyFilter<'_>,
    ) -> AutoconfResult<ProvenanceLedger> {
        let mut ledger = ProvenanceLedger::new();
        for source in self.ordered(allow) {
            let loaded = source.load(filter)?;
            debug!("Merging {} keys from {}", loaded.len(), source.name());
            let from_env = source.kind() == SourceKind::Env;
            for mut entry in loaded.iter().cloned() {
                if !ledger.contains_key(&entry.key) {
                    if from_env {
                        if let Some(existing) = ledger.find_normalized(&entry.key) {
                            entry.key = existing.to_string();
                        }
                    } else if let Some(env_key) = env_spelling_of(&ledger, &entry.key) {
                        ledger.remove(&env_key);
                    }
                }
                ledger.merge_entry(entry);
            }
        }
        Ok(ledger)
    }

    /// Resolve one key using the same precedence, restricted to that key
    /// (compared in normalized form) and to the allowed source kinds.
    pub fn resolve_key(
        &self,
        key: &str,
        allow: &dyn Fn(SourceKind) -> bool,
    ) -> AutoconfResult<Option<PropertyEntry>> {
        let wanted = keys::normalize(key);
        let filter = |k: &str| keys::normalize(k) == wanted;
        let mut winner: Option<PropertyEntry> = None;
        for source in self.ordered(allow) {
            if let Some(found) = source.load(&filter)?.iter().last() {
                winner = Some(PropertyEntry {
                    key: key.to_string(),
                    ..found.clone()
                });
            }
        }
        Ok(winner)
    }
}

/// Key of an environment-derived entry naming the same property as `key`
/// under a different spelling
fn env_spelling_of(ledger: &ProvenanceLedger, key: &str) -> Option<String> {
    let wanted = keys::normalize(key);
    ledger
        .iter()
        .find(|e| e.source.kind() == SourceKind::Env && keys::normalize(&e.key) == wanted)
        .map(|e| e.key.clone())
}
