//! Error types for hearthbook-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store maintenance operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read/write ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Store database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid backup bundle: {reason}")]
    MalformedArchive { reason: String },

    #[error("Backup bundle does not contain a store file")]
    MissingStoreEntry,

    #[error("Uploaded file is not a valid Hearthbook store")]
    InvalidStoreFormat,

    #[error("Cannot read {path} for export: {message}")]
    SourceUnavailable { path: PathBuf, message: String },

    #[error("Store is quiesced for maintenance")]
    StoreQuiesced,

    #[error("Restore failed: {source}")]
    RestoreFailed {
        /// Dated backup of the previous store, when one was written
        /// before the failure.
        backup: Option<PathBuf>,
        source: Box<Error>,
    },
}

/// Result type alias for store maintenance operations
pub type Result<T> = std::result::Result<T, Error>;
