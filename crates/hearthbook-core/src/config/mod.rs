//! Configuration service backed by an environment-style file

pub mod envfile;

use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Configuration key naming the live store file.
pub const KEY_DATABASE_PATH: &str = "DATABASE_PATH";

/// Store filename used when no configuration names one.
pub const DEFAULT_DATABASE_PATH: &str = "hearthbook.db";

/// Process-wide configuration service.
///
/// Values come from an environment-style file, with the process
/// environment as a read-through fallback. Restoring a configuration
/// snapshot merges its values into the live mapping so the running
/// application picks them up without a restart.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl ConfigStore {
    /// Load configuration from the file at `path`.
    ///
    /// A missing file yields an empty store; the path is still remembered
    /// as the write target for restored snapshots.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            envfile::parse(&std::fs::read_to_string(&path)?)
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// The configuration file this store reads from and restores into.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a key, falling back to the process environment.
    pub fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned().or_else(|| std::env::var(key).ok())
    }

    /// Override a single value in the live configuration.
    pub fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
    }

    /// Merge a parsed mapping into the live configuration.
    ///
    /// Returns the number of values applied.
    pub fn merge(&self, mapping: HashMap<String, String>) -> usize {
        let applied = mapping.len();
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.extend(mapping);
        tracing::info!("Reloaded {} configuration values", applied);
        applied
    }

    /// Path of the live store file.
    pub fn database_path(&self) -> PathBuf {
        self.get(KEY_DATABASE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH))
    }
}
