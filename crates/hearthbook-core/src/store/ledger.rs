//! Change-history ledger and the credential compatibility gate
//!
//! The store's `migrations` table lists every applied schema change,
//! each named with a sortable `YYYYMMDDHHMMSS` timestamp prefix. Stores
//! whose newest change is at or before the credential-scheme cutoff
//! stored admin credentials under a retired scheme the running
//! application can no longer verify, so those credentials must be
//! cleared when such a store is restored.

use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;

/// Newest schema generation that still used the retired credential
/// scheme. Restored stores at or before this generation get their admin
/// credentials cleared.
pub const BASELINE_GENERATION: &str = "20250807141402";

/// Length of the sortable timestamp prefix on ledger record names.
pub const GENERATION_WIDTH: usize = 14;

/// Outcome of the compatibility gate for a candidate store.
#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    /// Whether the store's admin credentials must be cleared.
    pub admin_reset_required: bool,
    /// Name of the newest ledger record, if any.
    pub latest_generation: Option<String>,
}

/// Read the names of all applied schema changes.
///
/// A store without the ledger table reads as empty: nothing has been
/// applied to it yet.
pub fn read_ledger(conn: &Connection) -> Result<Vec<String>> {
    if !table_exists(conn, "migrations")? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare("SELECT name FROM migrations")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Name of the record with the greatest timestamp prefix.
///
/// Ledger order is not trusted; every record is compared by prefix.
pub fn latest_generation(names: &[String]) -> Option<String> {
    names
        .iter()
        .max_by(|a, b| generation_prefix(a).cmp(generation_prefix(b)))
        .cloned()
}

/// Sortable timestamp prefix of a ledger record name.
///
/// Names shorter than the full prefix compare by what they have.
pub fn generation_prefix(name: &str) -> &str {
    name.get(..GENERATION_WIDTH).unwrap_or(name)
}

/// Whether a record's generation is at or before the baseline cutoff.
///
/// The comparison is inclusive: a store stamped exactly at the baseline
/// still requires the credential reset.
pub fn precedes_or_equals_baseline(name: &str) -> bool {
    generation_prefix(name) <= BASELINE_GENERATION
}

/// Run the compatibility gate against a store connection.
///
/// An empty ledger never requires a reset.
pub fn check_compatibility(conn: &Connection) -> Result<GateReport> {
    let ledger = read_ledger(conn)?;
    let latest = latest_generation(&ledger);
    let admin_reset_required = latest
        .as_deref()
        .map(precedes_or_equals_baseline)
        .unwrap_or(false);
    Ok(GateReport {
        admin_reset_required,
        latest_generation: latest,
    })
}

/// Clear the admin credential on every privileged settings record.
///
/// Returns the number of records cleared. The application prompts for a
/// fresh credential on the next privileged login.
pub fn clear_admin_credentials(conn: &Connection) -> Result<usize> {
    let cleared = conn.execute("UPDATE settings SET admin_password = ''", [])?;
    Ok(cleared)
}

/// Whether any settings record still carries a non-empty admin credential.
pub fn admin_credential_set(conn: &Connection) -> Result<bool> {
    if !table_exists(conn, "settings")? {
        return Ok(false);
    }
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM settings WHERE admin_password <> ''",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
