//! # hearthbook-core
//!
//! Core library for backing up, restoring, and migration-gating the
//! Hearthbook household store.
//!
//! This crate provides the foundational functionality for:
//! - Packing and unpacking portable backup bundles (store + config snapshot)
//! - Guarding the live store file: quiescence, dated safety backups, and
//!   staged replacement
//! - Parsing and hot-reloading environment-style configuration
//! - Gating restored stores against the credential-scheme baseline
//!
//! ## Modules
//!
//! - [`backup`] - Export and restore services plus the bundle codec
//! - [`config`] - Configuration service and env snapshot parsing
//! - [`error`] - Error types and Result alias
//! - [`store`] - Live store custody and the change-history ledger
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hearthbook_core::{BackupService, ConfigStore, LiveStore};
//!
//! let config = Arc::new(ConfigStore::load(".env").expect("Failed to load config"));
//! let store = Arc::new(LiveStore::new(config.database_path()));
//!
//! let service = BackupService::new(config, store);
//! let export = service
//!     .export(chrono::Utc::now().date_naive())
//!     .expect("Failed to export");
//! println!(
//!     "{} ({} bytes)",
//!     export.report.suggested_filename, export.report.bundle_size
//! );
//! ```

// Module declarations
pub mod backup;
pub mod config;
pub mod error;
pub mod store;

// Re-export key types for convenience

// Error types
pub use error::{Error, Result};

// Configuration
pub use config::{envfile, ConfigStore, DEFAULT_DATABASE_PATH, KEY_DATABASE_PATH};

// Store custody and the compatibility gate
pub use store::{
    admin_credential_set, backup_existing, check_compatibility, clear_admin_credentials,
    dated_backup_path, is_valid_store_signature, latest_generation, precedes_or_equals_baseline,
    read_ledger, GateReport, LiveStore, StoreLease, BASELINE_GENERATION, STORE_SIGNATURE,
};

// Backup and restore services
pub use backup::{
    list_dated_backups, pack_bundle, unpack_bundle, BackupService, BundleContents, DatedBackup,
    ExportReport, PreflightReport, RestoreOutcome, RestoreService, StoreExport, BUNDLE_EXTENSION,
    CONFIG_ENTRY_SUFFIX, STORE_ENTRY_NAME,
};
