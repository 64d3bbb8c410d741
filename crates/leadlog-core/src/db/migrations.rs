//! SQLite schema migrations for the lead database.

use super::schema;
use rusqlite::{Connection, types::Type};

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL), (2, schema::MIGRATION_V2_SQL)];

/// Read `PRAGMA user_version` and convert it to a Rust `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the version value cannot be
/// represented as `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// Each migration only runs when its version is above `user_version`, and the
/// SQL itself uses `IF NOT EXISTS` / `INSERT OR IGNORE`, so re-running is safe.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        tracing::debug!(version, "applied schema migration");
        current = *version;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::{LATEST_SCHEMA_VERSION, current_schema_version, migrate};
    use crate::db::schema;
    use rusqlite::{Connection, params};

    fn sqlite_object_exists(
        conn: &Connection,
        object_type: &str,
        object_name: &str,
    ) -> rusqlite::Result<bool> {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            )",
            params![object_type, object_name],
            |row| row.get(0),
        )
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);

        for table in [
            "lead_states",
            "comment_types",
            "loss_reasons",
            "leads",
            "comments",
            "loss_follow_ups",
            "notifications",
            "audit_entries",
        ] {
            assert!(sqlite_object_exists(&conn, "table", table)?, "missing table {table}");
        }

        for index in schema::REQUIRED_INDEXES {
            assert!(
                sqlite_object_exists(&conn, "index", index)?,
                "missing expected index {index}"
            );
        }

        for trigger in schema::REQUIRED_TRIGGERS {
            assert!(
                sqlite_object_exists(&conn, "trigger", trigger)?,
                "missing expected trigger {trigger}"
            );
        }

        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);

        let reasons: i64 =
            conn.query_row("SELECT COUNT(*) FROM loss_reasons", [], |row| row.get(0))?;
        assert_eq!(reasons, 6);

        Ok(())
    }

    #[test]
    fn migrate_upgrades_from_v1_and_locks_existing_audit_rows() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;

        conn.execute_batch(schema::MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1_i64)?;
        conn.execute(
            "INSERT INTO audit_entries (entity_kind, entity_id, action, actor, after_json, created_at_us)
             VALUES ('leads', 7, 'UPDATE', 'ana', '{\"state_id\":3}', 10)",
            [],
        )?;

        let applied = migrate(&mut conn)?;
        assert_eq!(applied, LATEST_SCHEMA_VERSION);

        assert!(conn.execute("DELETE FROM audit_entries", []).is_err());
        let rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))?;
        assert_eq!(rows, 1);

        Ok(())
    }
}
