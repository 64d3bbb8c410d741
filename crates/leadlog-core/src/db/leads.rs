//! Lead rows: intake, lookup, state writes, and visibility-scoped listing.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{micros, ts_column, ts_column_opt};
use crate::error::{LeadError, Result};
use crate::model::{Lead, LeadId, LeadState, StateCategory};

/// Narrows which leads an actor may see. Authorization proper lives outside
/// this crate; listing only asks this collaborator.
pub trait LeadScope {
    fn allows(&self, actor: &str, lead: &Lead) -> bool;
}

/// Scope that sees every lead.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllLeads;

impl LeadScope for AllLeads {
    fn allows(&self, _actor: &str, _lead: &Lead) -> bool {
        true
    }
}

/// Filter criteria for [`list_leads`]. Fields combine with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub state: Option<LeadState>,
    /// Drop leads whose state is in a recontact or final category.
    pub active_pipeline_only: bool,
    pub include_clients: bool,
    pub limit: Option<u32>,
}

const LEAD_COLUMNS: &str = "lead_id, name, state_id, is_client, is_deleted, \
                            created_at_us, modified_at_us, modified_by";

fn row_to_lead(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        name: row.get(1)?,
        state: row.get(2)?,
        is_client: row.get(3)?,
        is_deleted: row.get(4)?,
        created_at: ts_column(row, 5)?,
        modified_at: ts_column_opt(row, 6)?,
        modified_by: row.get(7)?,
    })
}

/// Intake a new lead.
///
/// # Errors
///
/// Returns [`LeadError::InvalidInput`] for a blank name, or a storage error.
pub fn create_lead(
    conn: &Connection,
    name: &str,
    state: LeadState,
    created_at: DateTime<Utc>,
) -> Result<Lead> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LeadError::InvalidInput {
            field: "name",
            reason: "lead name must not be empty".to_string(),
        });
    }

    conn.execute(
        "INSERT INTO leads (name, state_id, created_at_us) VALUES (?1, ?2, ?3)",
        params![name, state, micros(created_at)],
    )?;
    let id = LeadId(conn.last_insert_rowid());
    require_lead(conn, id)
}

/// Fetch a lead by id. Soft-deleted leads are treated as absent.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_lead(conn: &Connection, id: LeadId) -> Result<Option<Lead>> {
    let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE lead_id = ?1 AND is_deleted = 0");
    Ok(conn.query_row(&sql, [id], row_to_lead).optional()?)
}

/// Fetch a lead or fail with [`LeadError::LeadNotFound`].
///
/// # Errors
///
/// Returns not-found for unknown or soft-deleted leads, or a storage error.
pub fn require_lead(conn: &Connection, id: LeadId) -> Result<Lead> {
    get_lead(conn, id)?.ok_or(LeadError::LeadNotFound(id))
}

/// Single-field state write plus modification metadata. No guards, no audit:
/// callers go through the state machine.
///
/// # Errors
///
/// Returns not-found if no live row was updated, or a storage error.
pub fn update_state(
    conn: &Connection,
    id: LeadId,
    state: LeadState,
    actor: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE leads SET state_id = ?1, modified_by = ?2, modified_at_us = ?3 \
         WHERE lead_id = ?4 AND is_deleted = 0",
        params![state, actor, micros(at), id],
    )?;
    if changed == 0 {
        return Err(LeadError::LeadNotFound(id));
    }
    Ok(())
}

/// Flag a lead as a client, freezing it.
///
/// # Errors
///
/// Returns not-found if no live row was updated, or a storage error.
pub fn mark_client(conn: &Connection, id: LeadId, actor: &str, at: DateTime<Utc>) -> Result<()> {
    let changed = conn.execute(
        "UPDATE leads SET is_client = 1, modified_by = ?1, modified_at_us = ?2 \
         WHERE lead_id = ?3 AND is_deleted = 0",
        params![actor, micros(at), id],
    )?;
    if changed == 0 {
        return Err(LeadError::LeadNotFound(id));
    }
    Ok(())
}

/// Soft-delete a lead. Its audit history is kept.
///
/// # Errors
///
/// Returns not-found if the lead is unknown or already deleted.
pub fn soft_delete_lead(conn: &Connection, id: LeadId, actor: &str, at: DateTime<Utc>) -> Result<()> {
    let changed = conn.execute(
        "UPDATE leads SET is_deleted = 1, deleted_at_us = ?1, modified_by = ?2, modified_at_us = ?1 \
         WHERE lead_id = ?3 AND is_deleted = 0",
        params![micros(at), actor, id],
    )?;
    if changed == 0 {
        return Err(LeadError::LeadNotFound(id));
    }
    Ok(())
}

/// List live leads matching `filter` that `scope` lets `actor` see, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_leads(
    conn: &Connection,
    filter: &LeadFilter,
    actor: &str,
    scope: &dyn LeadScope,
) -> Result<Vec<Lead>> {
    let mut conditions = vec!["l.is_deleted = 0".to_string()];
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if !filter.include_clients {
        conditions.push("l.is_client = 0".to_string());
    }

    if let Some(state) = filter.state {
        param_values.push(Box::new(state));
        conditions.push(format!("l.state_id = ?{}", param_values.len()));
    }

    if filter.active_pipeline_only {
        param_values.push(Box::new(StateCategory::Ordinary.as_str()));
        conditions.push(format!("s.category = ?{}", param_values.len()));
    }

    let sql = format!(
        "SELECT l.lead_id, l.name, l.state_id, l.is_client, l.is_deleted, \
         l.created_at_us, l.modified_at_us, l.modified_by \
         FROM leads l INNER JOIN lead_states s ON s.state_id = l.state_id \
         WHERE {} ORDER BY l.created_at_us DESC, l.lead_id DESC",
        conditions.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt.query_map(rusqlite::params_from_iter(params_ref), row_to_lead)?;

    let limit = filter
        .limit
        .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
    let mut leads = Vec::new();
    for row in rows {
        let lead = row?;
        if scope.allows(actor, &lead) {
            leads.push(lead);
            if leads.len() >= limit {
                break;
            }
        }
    }
    Ok(leads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid t0")
    }

    struct OwnLeadsOnly;

    impl LeadScope for OwnLeadsOnly {
        fn allows(&self, actor: &str, lead: &Lead) -> bool {
            lead.name.starts_with(actor)
        }
    }

    #[test]
    fn create_and_fetch_lead() {
        let conn = open_in_memory().expect("db");
        let lead = create_lead(&conn, "  Acme Corp ", LeadState::New, t0()).expect("create");
        assert_eq!(lead.name, "Acme Corp");
        assert_eq!(lead.state, LeadState::New);
        assert!(!lead.is_client);
        assert_eq!(lead.created_at, t0());
        assert!(lead.modified_at.is_none());

        let fetched = get_lead(&conn, lead.id).expect("get").expect("present");
        assert_eq!(fetched, lead);
    }

    #[test]
    fn blank_name_is_rejected() {
        let conn = open_in_memory().expect("db");
        let err = create_lead(&conn, "   ", LeadState::New, t0()).expect_err("blank");
        assert!(err.is_validation());
    }

    #[test]
    fn update_state_records_modifier() {
        let conn = open_in_memory().expect("db");
        let lead = create_lead(&conn, "Acme", LeadState::New, t0()).expect("create");
        let later = t0() + Duration::hours(3);
        update_state(&conn, lead.id, LeadState::Contacted, "ana", later).expect("update");

        let fetched = require_lead(&conn, lead.id).expect("lead");
        assert_eq!(fetched.state, LeadState::Contacted);
        assert_eq!(fetched.modified_by.as_deref(), Some("ana"));
        assert_eq!(fetched.modified_at, Some(later));
    }

    #[test]
    fn soft_deleted_leads_are_not_found() {
        let conn = open_in_memory().expect("db");
        let lead = create_lead(&conn, "Acme", LeadState::New, t0()).expect("create");
        soft_delete_lead(&conn, lead.id, "ana", t0()).expect("delete");

        assert!(get_lead(&conn, lead.id).expect("get").is_none());
        let err = require_lead(&conn, lead.id).expect_err("gone");
        assert!(err.is_not_found());
        assert!(update_state(&conn, lead.id, LeadState::Lost, "ana", t0()).is_err());
    }

    #[test]
    fn list_filters_pipeline_clients_and_scope() {
        let conn = open_in_memory().expect("db");
        let a = create_lead(&conn, "ana-1", LeadState::Contacted, t0()).expect("a");
        let b = create_lead(&conn, "ana-2", LeadState::Lost, t0() + Duration::minutes(1))
            .expect("b");
        let c = create_lead(&conn, "bob-1", LeadState::Negotiation, t0() + Duration::minutes(2))
            .expect("c");
        let d = create_lead(&conn, "ana-3", LeadState::Won, t0() + Duration::minutes(3))
            .expect("d");
        mark_client(&conn, d.id, "ana", t0()).expect("client");

        let all = list_leads(&conn, &LeadFilter::default(), "ana", &AllLeads).expect("list");
        let ids: Vec<_> = all.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);

        let active = LeadFilter {
            active_pipeline_only: true,
            ..LeadFilter::default()
        };
        let ids: Vec<_> = list_leads(&conn, &active, "ana", &AllLeads)
            .expect("list")
            .iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec![c.id, a.id]);

        let scoped = list_leads(&conn, &active, "ana", &OwnLeadsOnly).expect("list");
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, a.id);

        let with_clients = LeadFilter {
            include_clients: true,
            state: Some(LeadState::Won),
            ..LeadFilter::default()
        };
        let clients = list_leads(&conn, &with_clients, "ana", &AllLeads).expect("list");
        assert_eq!(clients.len(), 1);
        assert!(clients[0].is_client);
    }
}
