//! Reads and writes against `audit_entries`.
//!
//! The store never validates payload shape. Appends are plain inserts and
//! the table's triggers refuse any later UPDATE or DELETE.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};

use super::{AuditAction, AuditEntry, NewAuditEntry};
use crate::db::{micros, ts_column};
use crate::error::Result;
use crate::model::{AuditEntryId, EntityKind, EntityRef};

/// Filter for [`query`]. Fields combine with AND semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub actor: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    /// Keep only entries whose raw "after" text mentions `"state_id"`.
    /// This is a text match, so malformed payloads are still returned.
    pub state_changes_only: bool,
    pub limit: Option<u32>,
}

impl AuditFilter {
    /// `UPDATE` entries that look like state changes.
    #[must_use]
    pub fn state_updates() -> Self {
        Self {
            action: Some(AuditAction::Update),
            state_changes_only: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

impl AuditOrder {
    const fn sql(self) -> &'static str {
        match self {
            Self::OldestFirst => "ORDER BY created_at_us ASC, entry_id ASC",
            Self::NewestFirst => "ORDER BY created_at_us DESC, entry_id DESC",
        }
    }
}

const ENTRY_COLUMNS: &str =
    "entry_id, entity_kind, entity_id, action, actor, before_json, after_json, created_at_us";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let kind: String = row.get(1)?;
    let kind = kind
        .parse::<EntityKind>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(error)))?;
    let action: String = row.get(3)?;
    let action = action
        .parse::<AuditAction>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error)))?;

    Ok(AuditEntry {
        id: row.get(0)?,
        entity: EntityRef {
            kind,
            id: row.get(2)?,
        },
        action,
        actor: row.get(4)?,
        before: row.get(5)?,
        after: row.get(6)?,
        created_at: ts_column(row, 7)?,
    })
}

/// Append one entry.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn append(conn: &Connection, entry: &NewAuditEntry) -> Result<AuditEntryId> {
    conn.execute(
        "INSERT INTO audit_entries \
         (entity_kind, entity_id, action, actor, before_json, after_json, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.entity.kind.as_str(),
            entry.entity.id,
            entry.action.as_str(),
            entry.actor,
            entry.before,
            entry.after,
            micros(entry.created_at),
        ],
    )?;
    let id = AuditEntryId(conn.last_insert_rowid());
    tracing::trace!(entry = %id, entity = %entry.entity, action = %entry.action, "audit entry appended");
    Ok(id)
}

/// Fetch one entry by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get(conn: &Connection, id: AuditEntryId) -> Result<Option<AuditEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM audit_entries WHERE entry_id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_entry).optional()?)
}

/// Entries for `entity` matching `filter`, in `order` (ties broken by id).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn query(
    conn: &Connection,
    entity: &EntityRef,
    filter: &AuditFilter,
    order: AuditOrder,
) -> Result<Vec<AuditEntry>> {
    let mut conditions = vec![
        "entity_kind = ?1".to_string(),
        "entity_id = ?2".to_string(),
    ];
    let mut param_values: Vec<Box<dyn ToSql>> = vec![
        Box::new(entity.kind.as_str()),
        Box::new(entity.id),
    ];

    if let Some(action) = filter.action {
        param_values.push(Box::new(action.as_str()));
        conditions.push(format!("action = ?{}", param_values.len()));
    }

    if let Some(actor) = &filter.actor {
        param_values.push(Box::new(actor.clone()));
        conditions.push(format!("actor = ?{}", param_values.len()));
    }

    if let Some(since) = filter.since {
        param_values.push(Box::new(micros(since)));
        conditions.push(format!("created_at_us >= ?{}", param_values.len()));
    }

    if let Some(until) = filter.until {
        param_values.push(Box::new(micros(until)));
        conditions.push(format!("created_at_us <= ?{}", param_values.len()));
    }

    if filter.state_changes_only {
        conditions.push(r#"after_json LIKE '%"state_id"%'"#.to_string());
    }

    let limit_clause = filter
        .limit
        .map_or_else(String::new, |limit| format!(" LIMIT {limit}"));
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM audit_entries WHERE {} {}{limit_clause}",
        conditions.join(" AND "),
        order.sql()
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(rusqlite::params_from_iter(params_ref), row_to_entry)?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::model::LeadId;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid t0")
    }

    fn entry(lead: i64, actor: &str, after: &str, at: DateTime<Utc>) -> NewAuditEntry {
        NewAuditEntry {
            entity: EntityRef::lead(LeadId(lead)),
            action: AuditAction::Update,
            actor: actor.to_string(),
            before: None,
            after: after.to_string(),
            created_at: at,
        }
    }

    #[test]
    fn append_and_get_round_trip_raw_text() {
        let conn = open_in_memory().expect("db");
        let id = append(&conn, &entry(1, "ana", "{not json", t0())).expect("append");
        let stored = get(&conn, id).expect("get").expect("present");
        assert_eq!(stored.after, "{not json");
        assert_eq!(stored.entity, EntityRef::lead(LeadId(1)));
        assert_eq!(stored.created_at, t0());
        assert!(stored.after_payload().is_err());
    }

    #[test]
    fn query_orders_and_breaks_ties_by_id() {
        let conn = open_in_memory().expect("db");
        let a = append(&conn, &entry(1, "ana", r#"{"state_id":3}"#, t0())).expect("a");
        let b = append(&conn, &entry(1, "ana", r#"{"state_id":4}"#, t0())).expect("b");
        let c = append(&conn, &entry(1, "bob", r#"{"state_id":5}"#, t0() - Duration::hours(1)))
            .expect("c");
        append(&conn, &entry(2, "ana", r#"{"state_id":3}"#, t0())).expect("other lead");

        let lead = EntityRef::lead(LeadId(1));
        let oldest: Vec<_> = query(&conn, &lead, &AuditFilter::default(), AuditOrder::OldestFirst)
            .expect("query")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(oldest, vec![c, a, b]);

        let newest: Vec<_> = query(&conn, &lead, &AuditFilter::default(), AuditOrder::NewestFirst)
            .expect("query")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(newest, vec![b, a, c]);
    }

    #[test]
    fn filters_combine() {
        let conn = open_in_memory().expect("db");
        let lead = EntityRef::lead(LeadId(1));
        append(&conn, &entry(1, "ana", r#"{"name":"Acme Ltd"}"#, t0())).expect("rename");
        let malformed = append(&conn, &entry(1, "ana", r#"{"state_id": oops"#, t0() + Duration::minutes(1)))
            .expect("malformed");
        let by_bob = append(&conn, &entry(1, "bob", r#"{"state_id":4}"#, t0() + Duration::minutes(2)))
            .expect("bob");

        let states: Vec<_> = query(&conn, &lead, &AuditFilter::state_updates(), AuditOrder::OldestFirst)
            .expect("query")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(states, vec![malformed, by_bob]);

        let filter = AuditFilter {
            actor: Some("bob".to_string()),
            since: Some(t0() + Duration::minutes(2)),
            until: Some(t0() + Duration::minutes(2)),
            ..AuditFilter::state_updates()
        };
        let only_bob = query(&conn, &lead, &filter, AuditOrder::OldestFirst).expect("query");
        assert_eq!(only_bob.len(), 1);
        assert_eq!(only_bob[0].id, by_bob);

        let limited = AuditFilter {
            limit: Some(1),
            ..AuditFilter::default()
        };
        let newest = query(&conn, &lead, &limited, AuditOrder::NewestFirst).expect("query");
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].id, by_bob);

        let inserts = AuditFilter {
            action: Some(AuditAction::Insert),
            ..AuditFilter::default()
        };
        assert!(query(&conn, &lead, &inserts, AuditOrder::OldestFirst).expect("query").is_empty());
    }
}
