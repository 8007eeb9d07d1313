//! Override files selected by `dir/pattern` entries.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use autoconf_core::{AutoconfResult, ProvenanceLedger, SourceLabel};

use crate::formats;

/// Loads every file matching the configured `dir/pattern` entries
#[derive(Debug, Clone, Default)]
pub struct OverrideFileLoader {
    patterns: Vec<String>,
}

impl OverrideFileLoader {
    pub fn new<S: Into<String>>(patterns: impl IntoIterator<Item = S>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Directories containing override files, used for reload watching
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.patterns.iter().map(|p| split_pattern(p).0).collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Matching files in pattern order, each directory sorted by file name
    pub fn matching_files(&self) -> AutoconfResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for pattern in &self.patterns {
            let (dir, glob) = split_pattern(pattern);
            if !dir.is_dir() {
                debug!("Override directory {} not found, skipping", dir.display());
                continue;
            }
            let mut found: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| glob_match(&glob, n))
                })
                .collect();
            found.sort();
            files.extend(found);
        }
        Ok(files)
    }

    /// Read all matching files into one ledger labelled `override`.
    /// A file that fails to parse aborts the load.
    pub fn load(&self) -> AutoconfResult<ProvenanceLedger> {
        let mut ledger = ProvenanceLedger::new();
        for file in self.matching_files()? {
            info!("Loading override file {}", file.display());
            for (key, value) in formats::parse_file(&file)? {
                ledger.put(key, value, SourceLabel::Override);
            }
        }
        Ok(ledger)
    }
}

fn split_pattern(pattern: &str) -> (PathBuf, String) {
    let path = Path::new(pattern);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("*")
        .to_string();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, name)
}

/// `*` matches any run of characters, everything else is literal
fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !name.starts_with(first) || name.len() < first.len() + last.len() || !name.ends_with(last) {
        return false;
    }
    let mut rest = &name[first.len()..name.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.properties", "app.properties"));
        assert!(glob_match("app-*.toml", "app-dev.toml"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("*.properties", "app.toml"));
        assert!(glob_match("exact.json", "exact.json"));
    }

    #[test]
    fn test_load_sorted_and_labelled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.properties"), "camel.context.name=b\n").unwrap();
        fs::write(dir.path().join("a.properties"), "camel.context.name=a\ncamel.rest.port=1\n").unwrap();
        fs::write(dir.path().join("ignored.txt"), "camel.context.name=x\n").unwrap();

        let pattern = format!("{}/*.properties", dir.path().display());
        let ledger = OverrideFileLoader::new([pattern]).load().unwrap();

        assert_eq!(ledger.get("camel.context.name"), Some("b"));
        assert_eq!(ledger.get("camel.rest.port"), Some("1"));
        assert_eq!(ledger.location("camel.rest.port"), Some(&SourceLabel::Override));
    }

    #[test]
    fn test_malformed_override_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.properties"), "no separator here\n").unwrap();
        let pattern = format!("{}/*.properties", dir.path().display());
        assert!(OverrideFileLoader::new([pattern]).load().is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let loader = OverrideFileLoader::new(["/nope/nothing/*.properties"]);
        assert!(loader.load().unwrap().is_empty());
    }
}
