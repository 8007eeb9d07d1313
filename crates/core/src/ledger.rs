//! Insertion-ordered key/value store that remembers where every value came from.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::keys;
use crate::source::SourceLabel;

/// One resolved property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
    pub source: SourceLabel,
    pub default_value: Option<String>,
}

impl PropertyEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, source: SourceLabel) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source,
            default_value: None,
        }
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }
}

/// Ordered key -> (value, source, default) record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceLedger {
    entries: Vec<PropertyEntry>,
    index: HashMap<String, usize>,
}

/// A namespace-scoped subset of a ledger with the namespace prefix stripped
pub type ConfigurationBag = ProvenanceLedger;

impl ProvenanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>, source: SourceLabel) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut ledger = Self::new();
        for (key, value) in pairs {
            ledger.put(key, value, source.clone());
        }
        ledger
    }

    /// Set a value. An existing entry keeps its position and its default value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>, source: SourceLabel) {
        self.merge_entry(PropertyEntry::new(key, value, source));
    }

    pub fn put_with_default(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        source: SourceLabel,
        default_value: Option<String>,
    ) {
        let mut entry = PropertyEntry::new(key, value, source);
        entry.default_value = default_value;
        self.merge_entry(entry);
    }

    /// Overwrite value and source of an existing key, retaining the old default
    /// when the incoming entry has none.
    pub fn merge_entry(&mut self, entry: PropertyEntry) {
        match self.index.get(&entry.key) {
            Some(&pos) => {
                let existing = &mut self.entries[pos];
                existing.value = entry.value;
                existing.source = entry.source;
                if entry.default_value.is_some() {
                    existing.default_value = entry.default_value;
                }
            }
            None => {
                self.index.insert(entry.key.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Merge every entry of `other` on top of this ledger
    pub fn merge_from(&mut self, other: &ProvenanceLedger) {
        for entry in other.iter() {
            self.merge_entry(entry.clone());
        }
    }

    pub fn entry(&self, key: &str) -> Option<&PropertyEntry> {
        self.index.get(key).map(|&pos| &self.entries[pos])
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entry(key).map(|e| e.value.as_str())
    }

    /// Source label of `key`
    pub fn location(&self, key: &str) -> Option<&SourceLabel> {
        self.entry(key).map(|e| &e.source)
    }

    pub fn default_value(&self, key: &str) -> Option<&str> {
        self.entry(key).and_then(|e| e.default_value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyEntry> {
        let pos = self.index.remove(key)?;
        let removed = self.entries.remove(pos);
        for idx in self.index.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        Some(removed)
    }

    /// Copy every entry whose key starts with `prefix` (ignoring case) into a
    /// new bag, stripping the prefix. The ledger itself is left untouched.
    pub fn extract(&self, prefix: &str) -> ConfigurationBag {
        let mut bag = ConfigurationBag::new();
        for entry in &self.entries {
            if let Some(rest) = keys::strip_prefix_ignore_case(&entry.key, prefix) {
                if rest.is_empty() {
                    continue;
                }
                bag.merge_entry(PropertyEntry {
                    key: rest.to_string(),
                    value: entry.value.clone(),
                    source: entry.source.clone(),
                    default_value: entry.default_value.clone(),
                });
            }
        }
        bag
    }

    /// Find an existing key that normalizes to the same form as `key`
    pub fn find_normalized(&self, key: &str) -> Option<&str> {
        let wanted = keys::normalize(key);
        self.entries
            .iter()
            .find(|e| keys::normalize(&e.key) == wanted)
            .map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl<'a> IntoIterator for &'a ProvenanceLedger {
    type Item = &'a PropertyEntry;
    type IntoIter = std::slice::Iter<'a, PropertyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
