//! Notification rows.
//!
//! The engine only writes and cancels notifications; delivery is somebody
//! else's job. Cancelling is a soft delete so the dispatcher can still see
//! what was withdrawn and when.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};

use super::{micros, ts_column, ts_column_opt};
use crate::error::{LeadError, Result};
use crate::model::{
    EntityKind, EntityRef, LeadId, Notification, NotificationId, NotificationKind, Priority,
};

/// Everything the scheduler needs to create a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: String,
    pub kind: NotificationKind,
    pub entity: EntityRef,
    pub fire_at: DateTime<Utc>,
    pub priority: Priority,
    pub title: String,
    pub message: String,
}

const NOTIFICATION_COLUMNS: &str = "notification_id, recipient, kind, entity_kind, entity_id, \
     fire_at_us, priority, title, message, is_read, is_deleted, deleted_at_us, created_at_us";

fn parse_text<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        recipient: row.get(1)?,
        kind: parse_text(row, 2)?,
        entity: EntityRef {
            kind: parse_text::<EntityKind>(row, 3)?,
            id: row.get(4)?,
        },
        fire_at: ts_column(row, 5)?,
        priority: parse_text(row, 6)?,
        title: row.get(7)?,
        message: row.get(8)?,
        is_read: row.get(9)?,
        is_deleted: row.get(10)?,
        deleted_at: ts_column_opt(row, 11)?,
        created_at: ts_column(row, 12)?,
    })
}

/// Write a notification row for later delivery.
///
/// # Errors
///
/// Returns a storage error if the insert fails.
pub fn schedule(conn: &Connection, new: &NewNotification, at: DateTime<Utc>) -> Result<Notification> {
    conn.execute(
        "INSERT INTO notifications \
         (recipient, kind, entity_kind, entity_id, fire_at_us, priority, title, message, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            new.recipient,
            new.kind.as_str(),
            new.entity.kind.as_str(),
            new.entity.id,
            micros(new.fire_at),
            new.priority.as_str(),
            new.title,
            new.message,
            micros(at),
        ],
    )?;
    let id = NotificationId(conn.last_insert_rowid());
    let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_notification)?)
}

/// Soft-delete every pending reminder attached to any comment of `lead_id`
/// that is addressed to `recipient`. Returns how many were cancelled.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub fn cancel_pending_comment_reminders(
    conn: &Connection,
    lead_id: LeadId,
    recipient: &str,
    at: DateTime<Utc>,
) -> Result<usize> {
    let cancelled = conn.execute(
        "UPDATE notifications SET is_deleted = 1, deleted_at_us = ?1 \
         WHERE kind = ?2 AND entity_kind = ?3 AND recipient = ?4 \
           AND is_deleted = 0 AND is_read = 0 \
           AND entity_id IN (SELECT comment_id FROM comments WHERE lead_id = ?5)",
        params![
            micros(at),
            NotificationKind::Reminder.as_str(),
            EntityKind::Comments.as_str(),
            recipient,
            lead_id,
        ],
    )?;
    Ok(cancelled)
}

/// Notifications tied to one entity, oldest fire time first.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn list_for_entity(
    conn: &Connection,
    entity: EntityRef,
    include_cancelled: bool,
) -> Result<Vec<Notification>> {
    let cancelled_clause = if include_cancelled { "" } else { " AND is_deleted = 0" };
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE entity_kind = ?1 AND entity_id = ?2{cancelled_clause} \
         ORDER BY fire_at_us ASC, notification_id ASC"
    );
    collect(conn, &sql, params![entity.kind.as_str(), entity.id])
}

/// Pending notifications about a lead: re-contact prompts on the lead itself
/// plus reminders on any of its comments.
///
/// # Errors
///
/// Returns a storage error if the query fails.
pub fn pending_for_lead(conn: &Connection, lead_id: LeadId) -> Result<Vec<Notification>> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE is_deleted = 0 AND is_read = 0 AND ( \
             (entity_kind = ?1 AND entity_id = ?2) \
             OR (entity_kind = ?3 AND entity_id IN (SELECT comment_id FROM comments WHERE lead_id = ?2)) \
         ) \
         ORDER BY fire_at_us ASC, notification_id ASC"
    );
    collect(
        conn,
        &sql,
        params![EntityKind::Leads.as_str(), lead_id, EntityKind::Comments.as_str()],
    )
}

/// Mark a notification as read (delivered and acknowledged).
///
/// # Errors
///
/// Returns [`LeadError::InvalidInput`] if no live notification has this id.
pub fn mark_read(conn: &Connection, id: NotificationId) -> Result<()> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE notification_id = ?1 AND is_deleted = 0",
        [id],
    )?;
    if changed == 0 {
        return Err(LeadError::InvalidInput {
            field: "notification",
            reason: format!("notification {id} does not exist or was cancelled"),
        });
    }
    Ok(())
}

fn collect(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_notification)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
