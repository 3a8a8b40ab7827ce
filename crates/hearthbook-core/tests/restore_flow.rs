//! Integration tests for the backup, restore, and migration-gate pipeline.
//!
//! These tests run the full operator workflows against real SQLite store
//! files in a scratch directory: export, preflight, restore of bundles
//! and legacy raw stores, safety backups, and the credential gate.

use chrono::NaiveDate;
use hearthbook_core::{
    dated_backup_path, pack_bundle, BackupService, ConfigStore, Error, LiveStore, RestoreService,
};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test fixture owning a scratch directory with a live store and config.
struct TestFixture {
    _temp_dir: TempDir,
    store_path: PathBuf,
    env_path: PathBuf,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();
        Self {
            store_path: base.join("hearthbook.db"),
            env_path: base.join(".env"),
            _temp_dir: temp_dir,
        }
    }

    fn base(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Creates a store at `path` with the given ledger records and one
    /// privileged settings record holding `admin_password`.
    fn create_store(path: &Path, records: &[&str], admin_password: &str) {
        let conn = Connection::open(path).expect("Failed to create store");
        conn.execute("CREATE TABLE migrations (name TEXT PRIMARY KEY)", [])
            .expect("Failed to create ledger table");
        for record in records {
            conn.execute("INSERT INTO migrations (name) VALUES (?1)", [record])
                .expect("Failed to insert ledger record");
        }
        conn.execute(
            "CREATE TABLE settings (id INTEGER PRIMARY KEY, admin_password TEXT)",
            [],
        )
        .expect("Failed to create settings table");
        conn.execute(
            "INSERT INTO settings (admin_password) VALUES (?1)",
            [admin_password],
        )
        .expect("Failed to insert settings record");
    }

    fn create_live_store(&self, records: &[&str], admin_password: &str) {
        Self::create_store(&self.store_path, records, admin_password);
    }

    fn write_env(&self, text: &str) {
        fs::write(&self.env_path, text).expect("Failed to write env file");
    }

    fn services(&self) -> (Arc<ConfigStore>, Arc<LiveStore>) {
        let config = Arc::new(ConfigStore::load(&self.env_path).expect("Failed to load config"));
        let store = Arc::new(LiveStore::new(&self.store_path));
        (config, store)
    }

    fn admin_password(&self) -> String {
        let conn = Connection::open(&self.store_path).expect("Failed to open store");
        conn.query_row("SELECT admin_password FROM settings", [], |row| row.get(0))
            .expect("Failed to read admin password")
    }
}

fn stamp() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date")
}

// ============================================================================
// Export then restore
// ============================================================================

#[test]
fn restore_of_pre_baseline_bundle_resets_admin_credentials() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20240101000000_init"], "hunter2");
    fixture.write_env("GREETING=hello\n");

    let (config, store) = fixture.services();
    let backup = BackupService::new(Arc::clone(&config), Arc::clone(&store));
    let export = backup.export(stamp()).expect("Failed to export");
    assert!(export.report.config_included);

    let restore = RestoreService::new(Arc::clone(&config), Arc::clone(&store));
    let outcome = restore
        .restore(&export.bytes, &export.report.suggested_filename, stamp())
        .expect("Failed to restore");

    assert!(outcome.admin_reset_required);
    assert_eq!(
        outcome.latest_generation.as_deref(),
        Some("20240101000000_init")
    );
    assert_eq!(outcome.config_applied, Some(1));
    assert_eq!(fixture.admin_password(), "");
    assert_eq!(config.get("GREETING").as_deref(), Some("hello"));
}

#[test]
fn restore_at_the_exact_baseline_generation_still_resets() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20250807141402_visit_log"], "hunter2");

    let (config, store) = fixture.services();
    let backup = BackupService::new(Arc::clone(&config), Arc::clone(&store));
    let export = backup.export(stamp()).expect("Failed to export");

    let restore = RestoreService::new(config, store);
    let outcome = restore
        .restore(&export.bytes, &export.report.suggested_filename, stamp())
        .expect("Failed to restore");

    assert!(outcome.admin_reset_required);
    assert_eq!(fixture.admin_password(), "");
}

// ============================================================================
// Legacy raw store uploads
// ============================================================================

#[test]
fn legacy_raw_upload_with_current_generation_keeps_credentials() {
    let fixture = TestFixture::new();
    let upload_path = fixture.base().join("legacy.db");
    TestFixture::create_store(&upload_path, &["20260101000000_future"], "uploaded-secret");
    let upload = fs::read(&upload_path).expect("Failed to read upload");

    fixture.create_live_store(&["20240101000000_init"], "live-secret");
    fixture.write_env("GREETING=hello\n");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(Arc::clone(&config), Arc::clone(&store));
    let outcome = restore
        .restore(&upload, "legacy.db", stamp())
        .expect("Failed to restore");

    assert!(!outcome.admin_reset_required);
    assert_eq!(
        outcome.latest_generation.as_deref(),
        Some("20260101000000_future")
    );
    assert_eq!(outcome.config_applied, None);
    assert!(outcome.config_backup.is_none());
    assert_eq!(fixture.admin_password(), "uploaded-secret");
    assert_eq!(
        fs::read_to_string(&fixture.env_path).expect("Failed to read env"),
        "GREETING=hello\n"
    );
}

#[test]
fn restore_onto_a_missing_store_skips_the_dated_backup() {
    let fixture = TestFixture::new();
    let upload_path = fixture.base().join("seed.db");
    TestFixture::create_store(&upload_path, &["20260101000000_future"], "seed-secret");
    let upload = fs::read(&upload_path).expect("Failed to read upload");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(config, store);
    let outcome = restore
        .restore(&upload, "seed.db", stamp())
        .expect("Failed to restore");

    assert!(outcome.store_backup.is_none());
    assert!(fixture.store_path.exists());
    assert_eq!(fixture.admin_password(), "seed-secret");
}

// ============================================================================
// Safety backups
// ============================================================================

#[test]
fn restore_writes_a_dated_backup_of_the_previous_store() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20240101000000_init"], "live-secret");
    let before = fs::read(&fixture.store_path).expect("Failed to read store");

    let upload_path = fixture.base().join("upload.db");
    TestFixture::create_store(&upload_path, &["20260101000000_future"], "new-secret");
    let upload = fs::read(&upload_path).expect("Failed to read upload");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(config, store);
    let outcome = restore
        .restore(&upload, "upload.db", stamp())
        .expect("Failed to restore");

    let backup_path = outcome.store_backup.expect("store backup expected");
    assert_eq!(backup_path, dated_backup_path(&fixture.store_path, stamp()));
    assert_eq!(
        fs::read(&backup_path).expect("Failed to read backup"),
        before
    );
}

#[test]
fn failed_restore_preserves_the_dated_backup() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20260101000000_future"], "live-secret");
    fixture.write_env("GREETING=hello\n");
    let before = fs::read(&fixture.store_path).expect("Failed to read store");

    let (config, store) = fixture.services();

    // Replace the config file with a directory so the config-side backup
    // copy fails after the store backup has been written.
    fs::remove_file(&fixture.env_path).expect("Failed to remove env file");
    fs::create_dir(&fixture.env_path).expect("Failed to create env dir");

    let bundle =
        pack_bundle(&before, Some("A=1\n"), stamp()).expect("Failed to pack bundle");

    let restore = RestoreService::new(config, store);
    let err = restore
        .restore(&bundle, "hearthbook-backup.zip", stamp())
        .expect_err("restore should fail");

    match err {
        Error::RestoreFailed {
            backup: Some(backup),
            ..
        } => {
            assert_eq!(fs::read(&backup).expect("Failed to read backup"), before);
        }
        other => panic!("Expected RestoreFailed with a backup path, got {:?}", other),
    }
    assert_eq!(
        fs::read(&fixture.store_path).expect("Failed to read store"),
        before
    );
}

// ============================================================================
// Rejection before destruction
// ============================================================================

#[test]
fn invalid_upload_is_rejected_before_any_disk_changes() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20240101000000_init"], "live-secret");
    let before = fs::read(&fixture.store_path).expect("Failed to read store");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(config, store);

    let err = restore
        .restore(b"definitely not a database", "junk.db", stamp())
        .expect_err("restore should reject the upload");
    assert!(matches!(err, Error::InvalidStoreFormat));

    assert_eq!(
        fs::read(&fixture.store_path).expect("Failed to read store"),
        before
    );
    assert!(!dated_backup_path(&fixture.store_path, stamp()).exists());
    assert_eq!(fixture.admin_password(), "live-secret");
}

#[test]
fn malformed_bundle_is_rejected_before_any_disk_changes() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20240101000000_init"], "live-secret");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(config, store);

    let err = restore
        .restore(b"PK pretend zip", "broken.zip", stamp())
        .expect_err("restore should reject the upload");
    assert!(matches!(err, Error::MalformedArchive { .. }));
    assert!(!dated_backup_path(&fixture.store_path, stamp()).exists());
}

#[test]
fn restore_refuses_while_the_store_is_quiesced() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20260101000000_future"], "live-secret");
    let upload = fs::read(&fixture.store_path).expect("Failed to read store");

    let (config, store) = fixture.services();
    let _lease = store.quiesce().expect("Failed to quiesce");

    let restore = RestoreService::new(config, Arc::clone(&store));
    let err = restore
        .restore(&upload, "upload.db", stamp())
        .expect_err("restore should refuse a quiesced store");
    assert!(matches!(err, Error::RestoreFailed { backup: None, .. }));
}

// ============================================================================
// Preflight
// ============================================================================

#[test]
fn preflight_reports_without_modifying_the_store() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20260101000000_future"], "live-secret");
    let before = fs::read(&fixture.store_path).expect("Failed to read store");

    let upload_path = fixture.base().join("old.db");
    TestFixture::create_store(&upload_path, &["20240101000000_init"], "old-secret");
    let old_store = fs::read(&upload_path).expect("Failed to read upload");
    let bundle =
        pack_bundle(&old_store, Some("A=1\n"), stamp()).expect("Failed to pack bundle");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(config, store);
    let report = restore
        .preflight(&bundle, "old-backup.zip")
        .expect("Failed to preflight");

    assert!(report.admin_reset_required);
    assert!(report.older_than_baseline);
    assert_eq!(
        report.latest_generation.as_deref(),
        Some("20240101000000_init")
    );
    assert!(report.config_included);

    // Nothing on disk moved
    assert_eq!(
        fs::read(&fixture.store_path).expect("Failed to read store"),
        before
    );
    assert_eq!(fixture.admin_password(), "live-secret");
    assert!(!dated_backup_path(&fixture.store_path, stamp()).exists());
    assert!(!fixture.env_path.exists());
}

#[test]
fn preflight_passes_a_current_generation_upload() {
    let fixture = TestFixture::new();
    let upload_path = fixture.base().join("current.db");
    TestFixture::create_store(&upload_path, &["20250807141403_newer"], "secret");
    let upload = fs::read(&upload_path).expect("Failed to read upload");

    let (config, store) = fixture.services();
    let restore = RestoreService::new(config, store);
    let report = restore
        .preflight(&upload, "current.db")
        .expect("Failed to preflight");

    assert!(!report.admin_reset_required);
    assert!(!report.older_than_baseline);
    assert!(!report.config_included);
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn export_restore_round_trip_preserves_store_bytes() {
    let fixture = TestFixture::new();
    fixture.create_live_store(&["20260101000000_future"], "keep-me");
    let original = fs::read(&fixture.store_path).expect("Failed to read store");

    let (config, store) = fixture.services();
    let backup = BackupService::new(Arc::clone(&config), Arc::clone(&store));
    let export = backup.export(stamp()).expect("Failed to export");

    // Wipe the live store, then restore the bundle over the gap.
    fs::remove_file(&fixture.store_path).expect("Failed to remove store");
    let restore = RestoreService::new(config, store);
    restore
        .restore(&export.bytes, &export.report.suggested_filename, stamp())
        .expect("Failed to restore");

    assert_eq!(
        fs::read(&fixture.store_path).expect("Failed to read store"),
        original
    );
    assert_eq!(fixture.admin_password(), "keep-me");
}
