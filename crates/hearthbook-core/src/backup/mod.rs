//! Backup and restore services for the Hearthbook store
//!
//! This module provides the operator-facing pipeline around the store:
//! - Exporting the live store and config snapshot as a portable bundle
//! - Restoring an uploaded bundle (or legacy raw store) over the live one
//! - Preflight compatibility checks against uploads

mod archive;
mod restore;

pub use archive::*;
pub use restore::*;

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::store::LiveStore;
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Filename prefix for exported bundles.
const EXPORT_PREFIX: &str = "hearthbook-backup";

/// A finished export: bundle bytes plus the report describing them.
#[derive(Debug)]
pub struct StoreExport {
    /// The packed bundle.
    pub bytes: Vec<u8>,
    /// Details for display or logging.
    pub report: ExportReport,
}

/// Details of a completed export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Dated filename the bundle should be saved under.
    pub suggested_filename: String,
    /// Size of the packed bundle in bytes.
    pub bundle_size: u64,
    /// Size of the store file that went into it.
    pub store_size: u64,
    /// Whether a configuration snapshot was included.
    pub config_included: bool,
    /// SHA-256 of the bundle bytes.
    pub sha256: String,
}

/// Exports the live store and configuration as portable bundles.
pub struct BackupService {
    config: Arc<ConfigStore>,
    store: Arc<LiveStore>,
}

impl BackupService {
    pub fn new(config: Arc<ConfigStore>, store: Arc<LiveStore>) -> Self {
        Self { config, store }
    }

    /// Export the live store and current config snapshot as a bundle.
    ///
    /// The store is quiesced for the duration of the read so the copied
    /// bytes are a consistent snapshot. The live store is never modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceUnavailable`] when the store file is
    /// missing or unreadable, or when a config file exists but cannot be
    /// read. A missing config file is not an error; the bundle simply
    /// carries no snapshot.
    pub fn export(&self, stamp: NaiveDate) -> Result<StoreExport> {
        let _lease = self.store.quiesce()?;

        let store_path = self.store.path();
        let store_bytes = std::fs::read(store_path).map_err(|e| Error::SourceUnavailable {
            path: store_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config_path = self.config.path();
        let config_text = if config_path.exists() {
            let text =
                std::fs::read_to_string(config_path).map_err(|e| Error::SourceUnavailable {
                    path: config_path.to_path_buf(),
                    message: e.to_string(),
                })?;
            Some(text)
        } else {
            None
        };

        let bytes = pack_bundle(&store_bytes, config_text.as_deref(), stamp)?;

        let report = ExportReport {
            suggested_filename: format!("{}-{}{}", EXPORT_PREFIX, stamp, BUNDLE_EXTENSION),
            bundle_size: bytes.len() as u64,
            store_size: store_bytes.len() as u64,
            config_included: config_text.is_some(),
            sha256: format!("{:x}", Sha256::digest(&bytes)),
        };

        tracing::info!(
            "Exported store ({} bytes) as {}",
            report.store_size,
            report.suggested_filename
        );

        Ok(StoreExport { bytes, report })
    }
}

/// A dated safety backup sitting next to the live store.
#[derive(Debug, Clone, Serialize)]
pub struct DatedBackup {
    /// Full path of the backup file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// List dated safety backups for the store at `path`, oldest first.
pub fn list_dated_backups(path: &Path) -> Result<Vec<DatedBackup>> {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return Ok(Vec::new()),
    };
    let marker = format!("{}.backup-", file_name);
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let entries = match std::fs::read_dir(&parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let matches = name
            .to_str()
            .map(|n| n.starts_with(&marker))
            .unwrap_or(false);
        if !matches {
            continue;
        }
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            backups.push(DatedBackup {
                path: entry.path(),
                size_bytes: metadata.len(),
            });
        }
    }

    // Dated names sort chronologically
    backups.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(backups)
}
