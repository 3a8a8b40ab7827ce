//! Restore pipeline: validate, gate, and promote an uploaded store

use crate::config::{envfile, ConfigStore};
use crate::error::{Error, Result};
use crate::store::{self, LiveStore};
use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use super::{unpack_bundle, BundleContents, BUNDLE_EXTENSION};

/// Outcome of a completed restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreOutcome {
    /// Whether admin credentials were cleared for compatibility.
    pub admin_reset_required: bool,
    /// Newest ledger record in the restored store.
    pub latest_generation: Option<String>,
    /// Config values applied, when a snapshot was restored.
    pub config_applied: Option<usize>,
    /// Dated backup of the previous store, when one existed.
    pub store_backup: Option<PathBuf>,
    /// Dated backup of the previous config file, when one was replaced.
    pub config_backup: Option<PathBuf>,
}

/// Result of a preflight compatibility check against an upload.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Whether restoring this upload would clear admin credentials.
    pub admin_reset_required: bool,
    /// Newest ledger record in the uploaded store.
    pub latest_generation: Option<String>,
    /// Same predicate as `admin_reset_required`, under the name the
    /// confirmation prompt words it with.
    pub older_than_baseline: bool,
    /// Whether the upload carries a configuration snapshot.
    pub config_included: bool,
}

/// Replaces the live store (and configuration) from an uploaded backup.
pub struct RestoreService {
    config: Arc<ConfigStore>,
    store: Arc<LiveStore>,
}

impl RestoreService {
    pub fn new(config: Arc<ConfigStore>, store: Arc<LiveStore>) -> Self {
        Self { config, store }
    }

    /// Restore an uploaded backup over the live store.
    ///
    /// Uploads named with the bundle extension are unpacked; anything
    /// else is treated as a legacy raw store with no config snapshot.
    /// The candidate must pass the store signature check before anything
    /// on disk is touched.
    ///
    /// Dated backups of the current store and config are written before
    /// the swap, and the compatibility gate runs against the staged
    /// candidate before it is promoted, so a gate failure never leaves a
    /// half-restored live store. There is no automatic rollback: a
    /// failure after the backups leaves them in place as the recovery
    /// path, and the returned error names the store backup.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedArchive`], [`Error::MissingStoreEntry`], and
    /// [`Error::InvalidStoreFormat`] reject the upload before any disk
    /// mutation. Every later failure surfaces as [`Error::RestoreFailed`].
    pub fn restore(
        &self,
        upload: &[u8],
        upload_name: &str,
        stamp: NaiveDate,
    ) -> Result<RestoreOutcome> {
        let candidate = classify(upload, upload_name)?;

        tracing::info!(
            "Restoring store from {} ({} bytes)",
            upload_name,
            upload.len()
        );

        let lease = match self.store.quiesce() {
            Ok(lease) => lease,
            Err(e) => {
                return Err(Error::RestoreFailed {
                    backup: None,
                    source: Box::new(e),
                })
            }
        };

        let mut store_backup = None;
        let result = self.swap_store(&candidate, stamp, &mut store_backup);
        drop(lease);

        result.map_err(|e| Error::RestoreFailed {
            backup: store_backup,
            source: Box::new(e),
        })
    }

    /// Run the restore compatibility check without touching the live store.
    ///
    /// The upload is validated exactly as a restore would validate it,
    /// then copied to a scratch file and inspected through a read-only
    /// connection. The live store is never quiesced.
    pub fn preflight(&self, upload: &[u8], upload_name: &str) -> Result<PreflightReport> {
        let candidate = classify(upload, upload_name)?;

        let mut scratch = tempfile::NamedTempFile::new()?;
        scratch.write_all(&candidate.store)?;
        scratch.flush()?;

        let conn =
            Connection::open_with_flags(scratch.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let gate = store::check_compatibility(&conn)?;

        Ok(PreflightReport {
            admin_reset_required: gate.admin_reset_required,
            older_than_baseline: gate.admin_reset_required,
            latest_generation: gate.latest_generation,
            config_included: candidate.config.is_some(),
        })
    }

    /// Steps between quiesce and release. `store_backup_out` reports the
    /// dated backup path even when a later step fails.
    fn swap_store(
        &self,
        candidate: &BundleContents,
        stamp: NaiveDate,
        store_backup_out: &mut Option<PathBuf>,
    ) -> Result<RestoreOutcome> {
        let store_path = self.store.path().to_path_buf();

        let store_backup = store::backup_existing(&store_path, stamp)?;
        *store_backup_out = store_backup.clone();

        let config_backup = if candidate.config.is_some() {
            store::backup_existing(self.config.path(), stamp)?
        } else {
            None
        };

        let staged = store::stage(&store_path, &candidate.store)?;
        let gate = {
            // The connection must close before the rename below.
            let conn = Connection::open_with_flags(&staged, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
            let gate = store::check_compatibility(&conn)?;
            if gate.admin_reset_required {
                let cleared = store::clear_admin_credentials(&conn)?;
                tracing::info!(
                    "Cleared admin credentials on {} settings records (restored generation {} is at or before {})",
                    cleared,
                    gate.latest_generation.as_deref().unwrap_or("none"),
                    store::BASELINE_GENERATION
                );
            }
            gate
        };

        store::promote(&staged, &store_path)?;

        let config_applied = match candidate.config.as_deref() {
            Some(text) => {
                std::fs::write(self.config.path(), text)?;
                Some(self.config.merge(envfile::parse(text)))
            }
            None => None,
        };

        tracing::info!("Restored store at {}", store_path.display());

        Ok(RestoreOutcome {
            admin_reset_required: gate.admin_reset_required,
            latest_generation: gate.latest_generation,
            config_applied,
            store_backup,
            config_backup,
        })
    }
}

/// Classify an upload by filename and validate its store signature.
fn classify(upload: &[u8], upload_name: &str) -> Result<BundleContents> {
    let candidate = if upload_name.ends_with(BUNDLE_EXTENSION) {
        unpack_bundle(upload)?
    } else {
        BundleContents {
            store: upload.to_vec(),
            config: None,
        }
    };

    if !store::is_valid_store_signature(&candidate.store) {
        return Err(Error::InvalidStoreFormat);
    }

    Ok(candidate)
}
