//! Watches property file directories and computes the keys that changed.

use std::path::{Path, PathBuf};

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use autoconf_core::{AutoconfError, AutoconfResult, ProvenanceLedger, SourceLabel};

use crate::formats;

pub use notify::RecommendedWatcher;

pub struct PropertiesReloadWatcher {
    directories: Vec<PathBuf>,
}

impl PropertiesReloadWatcher {
    pub fn new<P: Into<PathBuf>>(directories: impl IntoIterator<Item = P>) -> Self {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Start watching. Paths of created or modified files arrive on the
    /// receiver for as long as the returned watcher is alive.
    pub fn watch(&self) -> AutoconfResult<(RecommendedWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
                    for path in event.paths {
                        if tx.send(path).is_err() {
                            debug!("Reload receiver dropped");
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("File watch error: {}", e),
            }
        })
        .map_err(|e| AutoconfError::Configuration(format!("Cannot create file watcher: {e}")))?;

        for dir in &self.directories {
            watcher.watch(dir, RecursiveMode::NonRecursive).map_err(|e| {
                AutoconfError::Configuration(format!("Cannot watch {}: {e}", dir.display()))
            })?;
            debug!("Watching {} for property changes", dir.display());
        }
        Ok((watcher, rx))
    }

    /// Keys in `path` whose value differs from `current`
    pub fn changed_properties(
        path: &Path,
        current: &ProvenanceLedger,
    ) -> AutoconfResult<ProvenanceLedger> {
        let source = SourceLabel::Location(path.display().to_string());
        let mut changed = ProvenanceLedger::new();
        for (key, value) in formats::parse_file(path)? {
            if current.get(&key) != Some(value.as_str()) {
                changed.put(key, value, source.clone());
            }
        }
        Ok(changed)
    }
}
