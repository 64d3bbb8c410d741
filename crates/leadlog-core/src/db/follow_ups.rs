//! Loss-reason catalog and loss follow-up records.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{micros, ts_column};
use crate::error::{LeadError, Result};
use crate::model::{
    CommentId, FollowUpId, FuturePossibility, LeadId, LossFollowUp, LossReason, LossReasonId,
};

const RECONTACT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Fields of a follow-up that the caller supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFollowUp<'a> {
    pub lead_id: LeadId,
    pub loss_reason: &'a LossReason,
    pub notes: Option<&'a str>,
    pub future_possibility: FuturePossibility,
    pub recontact_on: Option<NaiveDate>,
    pub comment_id: Option<CommentId>,
    pub actor: &'a str,
}

/// Look up an active loss reason.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_loss_reason(conn: &Connection, id: LossReasonId) -> Result<Option<LossReason>> {
    Ok(conn
        .query_row(
            "SELECT loss_reason_id, name FROM loss_reasons \
             WHERE loss_reason_id = ?1 AND is_active = 1",
            [id],
            |row| {
                Ok(LossReason {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?)
}

/// Look up an active loss reason or fail with [`LeadError::LossReasonNotFound`].
///
/// # Errors
///
/// Returns not-found for unknown or retired reasons, or a storage error.
pub fn require_loss_reason(conn: &Connection, id: LossReasonId) -> Result<LossReason> {
    get_loss_reason(conn, id)?.ok_or(LeadError::LossReasonNotFound(id))
}

/// All active loss reasons in id order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_loss_reasons(conn: &Connection) -> Result<Vec<LossReason>> {
    let mut stmt = conn.prepare(
        "SELECT loss_reason_id, name FROM loss_reasons WHERE is_active = 1 ORDER BY loss_reason_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(LossReason {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    let mut reasons = Vec::new();
    for row in rows {
        reasons.push(row?);
    }
    Ok(reasons)
}

fn row_to_follow_up(row: &Row<'_>) -> rusqlite::Result<LossFollowUp> {
    let possibility: String = row.get(5)?;
    let future_possibility = possibility.parse::<FuturePossibility>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(error))
    })?;
    let recontact_on: Option<String> = row.get(6)?;
    let recontact_on = recontact_on
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, RECONTACT_DATE_FORMAT).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(error))
            })
        })
        .transpose()?;

    Ok(LossFollowUp {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        loss_reason_id: row.get(2)?,
        loss_reason: row.get(3)?,
        notes: row.get(4)?,
        future_possibility,
        recontact_on,
        comment_id: row.get(7)?,
        actor: row.get(8)?,
        created_at: ts_column(row, 9)?,
    })
}

const FOLLOW_UP_SELECT: &str = "SELECT f.follow_up_id, f.lead_id, f.loss_reason_id, r.name, \
     f.notes, f.future_possibility, f.recontact_on, f.comment_id, f.actor, f.created_at_us \
     FROM loss_follow_ups f INNER JOIN loss_reasons r ON r.loss_reason_id = f.loss_reason_id";

/// Record a rejection's follow-up details.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn insert_follow_up(
    conn: &Connection,
    new: &NewFollowUp<'_>,
    at: DateTime<Utc>,
) -> Result<LossFollowUp> {
    let notes = new.notes.map(str::trim).filter(|n| !n.is_empty());
    let recontact_on = new
        .recontact_on
        .map(|date| date.format(RECONTACT_DATE_FORMAT).to_string());

    conn.execute(
        "INSERT INTO loss_follow_ups \
         (lead_id, loss_reason_id, notes, future_possibility, recontact_on, comment_id, actor, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.lead_id,
            new.loss_reason.id,
            notes,
            new.future_possibility.as_str(),
            recontact_on,
            new.comment_id,
            new.actor,
            micros(at),
        ],
    )?;
    let id = FollowUpId(conn.last_insert_rowid());
    let sql = format!("{FOLLOW_UP_SELECT} WHERE f.follow_up_id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_follow_up)?)
}

/// Follow-ups for a lead, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_follow_ups(conn: &Connection, lead_id: LeadId) -> Result<Vec<LossFollowUp>> {
    let sql =
        format!("{FOLLOW_UP_SELECT} WHERE f.lead_id = ?1 ORDER BY f.created_at_us, f.follow_up_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([lead_id], row_to_follow_up)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
