//! Live store custody
//!
//! This module owns every interaction with the store file itself:
//! - Sniffing the on-disk format signature of candidate stores
//! - Quiescing the live store for maintenance and releasing it afterwards
//! - Dated safety backups written next to the live file
//! - Staged write-then-rename replacement of the store
//! - The change-history ledger and credential compatibility gate

mod ledger;

pub use ledger::*;

use crate::error::{Error, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Signature text carried in the first bytes of every valid store file.
pub const STORE_SIGNATURE: &str = "SQLite format 3";

/// Number of leading bytes inspected by the signature check.
pub const SIGNATURE_LEN: usize = 16;

/// Suffix of the staging file written next to the live store.
const STAGING_SUFFIX: &str = ".staged";

/// Sidecar suffixes SQLite may leave next to a store file.
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Check whether `bytes` begin with a valid store signature.
///
/// Buffers shorter than the signature window are rejected rather than
/// erroring. The window is decoded lossily, so stray non-UTF-8 bytes
/// around the signature do not mask it.
pub fn is_valid_store_signature(bytes: &[u8]) -> bool {
    if bytes.len() < SIGNATURE_LEN {
        return false;
    }
    String::from_utf8_lossy(&bytes[..SIGNATURE_LEN]).contains(STORE_SIGNATURE)
}

/// Handle to the application's live store file and its pooled connection.
///
/// The connection opens lazily and never creates the file: a missing
/// store surfaces as an open error instead of an implicit empty database.
#[derive(Debug)]
pub struct LiveStore {
    path: PathBuf,
    pool: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    connection: Option<Connection>,
    quiesced: bool,
}

impl LiveStore {
    /// Create a handle for the store at `path` without touching the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: Mutex::new(PoolState::default()),
        }
    }

    /// Path of the live store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the pooled connection, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreQuiesced`] while a maintenance lease is
    /// outstanding, or the underlying open error when the store file is
    /// missing or unreadable.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.quiesced {
            return Err(Error::StoreQuiesced);
        }
        if pool.connection.is_none() {
            pool.connection = Some(open_store(&self.path)?);
        }
        match pool.connection.as_ref() {
            Some(connection) => f(connection),
            None => unreachable!("pool connection opened above"),
        }
    }

    /// Close the pooled connection and take exclusive custody of the file.
    ///
    /// The returned lease releases custody when dropped, on every exit
    /// path. A second quiesce while a lease is outstanding is refused,
    /// which also serializes concurrent backup and restore attempts.
    pub fn quiesce(&self) -> Result<StoreLease<'_>> {
        let mut pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.quiesced {
            return Err(Error::StoreQuiesced);
        }
        let had_connection = pool.connection.take().is_some();
        pool.quiesced = true;
        tracing::info!("Quiesced store at {}", self.path.display());
        Ok(StoreLease {
            store: self,
            reopen: had_connection,
        })
    }
}

fn open_store(path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    Ok(connection)
}

/// Exclusive custody of a quiesced store, released on drop.
#[derive(Debug)]
pub struct StoreLease<'a> {
    store: &'a LiveStore,
    reopen: bool,
}

impl Drop for StoreLease<'_> {
    fn drop(&mut self) {
        let mut pool = self
            .store
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pool.quiesced = false;
        if self.reopen {
            match open_store(&self.store.path) {
                Ok(connection) => pool.connection = Some(connection),
                Err(e) => {
                    tracing::warn!(
                        "Failed to reopen store at {} after maintenance: {}",
                        self.store.path.display(),
                        e
                    );
                }
            }
        }
        tracing::info!("Released store at {}", self.store.path.display());
    }
}

/// Copy `path` to its dated backup sibling, if it exists.
///
/// The backup lands at `<path>.backup-<YYYY-MM-DD>`. Backups are
/// date-granular: a second call on the same day overwrites the first.
/// A missing source is not an error and writes nothing.
pub fn backup_existing(path: &Path, stamp: NaiveDate) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = dated_backup_path(path, stamp);
    fs::copy(path, &backup)?;
    tracing::info!("Backed up {} to {}", path.display(), backup.display());
    Ok(Some(backup))
}

/// Dated backup sibling for `path`.
pub fn dated_backup_path(path: &Path, stamp: NaiveDate) -> PathBuf {
    append_to_filename(path, &format!(".backup-{}", stamp))
}

/// Write candidate store bytes to the staging file next to the live path.
///
/// Staging next to the destination keeps the later rename on a single
/// filesystem.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let staged = append_to_filename(path, STAGING_SUFFIX);
    fs::write(&staged, bytes)?;
    Ok(staged)
}

/// Promote a staged file over the live store path.
///
/// Stale SQLite sidecars of the old store are removed first so the
/// promoted file cannot pair with a journal from the previous database.
pub fn promote(staged: &Path, path: &Path) -> Result<()> {
    for suffix in SIDECAR_SUFFIXES {
        let sidecar = append_to_filename(path, suffix);
        if sidecar.exists() {
            fs::remove_file(&sidecar)?;
        }
    }
    fs::rename(staged, path)?;
    tracing::info!("Promoted staged store over {}", path.display());
    Ok(())
}

fn append_to_filename(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
