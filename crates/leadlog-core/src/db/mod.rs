//! SQLite storage for the lead lifecycle engine.
//!
//! Runtime defaults are conservative:
//! - `journal_mode = WAL` so history readers never block comment writers
//! - `busy_timeout = 5s` to ride out short write contention
//! - `foreign_keys = ON` to keep comments, follow-ups, and leads consistent

pub mod comments;
pub mod follow_ups;
pub mod leads;
pub mod migrations;
pub mod notifications;
pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use std::{path::Path, time::Duration};

/// Busy timeout used for engine connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the database inside the project directory.
pub const DATABASE_FILE: &str = "leadlog.db";

/// Open (or create) the lead database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open lead database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply schema migrations")?;

    Ok(conn)
}

/// Open an existing database without creating it.
///
/// Returns `Ok(None)` when the file is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn try_open_database(path: &Path) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }
    open_database(path).map(Some)
}

/// In-memory database with the full schema, for tests and dry runs.
///
/// # Errors
///
/// Returns an error if migrating the schema fails.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    migrations::migrate(&mut conn).context("apply schema migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

pub(crate) fn micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Read a `*_at_us` column as a UTC timestamp.
pub(crate) fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let us: i64 = row.get(idx)?;
    DateTime::<Utc>::from_timestamp_micros(us)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, us))
}

/// Nullable variant of [`ts_column`].
pub(crate) fn ts_column_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let us: Option<i64> = row.get(idx)?;
    us.map(|us| {
        DateTime::<Utc>::from_timestamp_micros(us)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, us))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_database, try_open_database};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".leadlog").join("leadlog.db");
        (dir, path)
    }

    #[test]
    fn open_database_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_database(&path).expect("open lead db");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_database_runs_migrations() {
        let (_dir, path) = temp_db_path();
        let conn = open_database(&path).expect("open lead db");

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn try_open_database_missing_file() {
        let (_dir, path) = temp_db_path();
        assert!(try_open_database(&path).expect("no error").is_none());
    }
}
