//! Comment rows. Comments are immutable; moderation only soft-deletes.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{micros, ts_column};
use crate::error::{LeadError, Result};
use crate::model::{Comment, CommentId, CommentType, LeadId};

const COMMENT_COLUMNS: &str =
    "comment_id, lead_id, comment_type_id, body, author, created_at_us, is_deleted";

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        comment_type: row.get(2)?,
        body: row.get(3)?,
        author: row.get(4)?,
        created_at: ts_column(row, 5)?,
        is_deleted: row.get(6)?,
    })
}

/// Insert a comment.
///
/// # Errors
///
/// Returns [`LeadError::InvalidInput`] for a blank body, or a storage error.
pub fn insert_comment(
    conn: &Connection,
    lead_id: LeadId,
    comment_type: CommentType,
    body: &str,
    author: &str,
    at: DateTime<Utc>,
) -> Result<Comment> {
    if body.trim().is_empty() {
        return Err(LeadError::InvalidInput {
            field: "comment",
            reason: "comment text must not be empty".to_string(),
        });
    }

    conn.execute(
        "INSERT INTO comments (lead_id, comment_type_id, body, author, created_at_us) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![lead_id, comment_type, body, author, micros(at)],
    )?;
    let id = CommentId(conn.last_insert_rowid());
    get_comment(conn, id)?.ok_or(LeadError::CommentNotFound(id))
}

/// Fetch a comment by id, including moderated ones.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_comment(conn: &Connection, id: CommentId) -> Result<Option<Comment>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE comment_id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_comment).optional()?)
}

/// Visible comments for a lead, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_comments(conn: &Connection, lead_id: LeadId) -> Result<Vec<Comment>> {
    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments \
         WHERE lead_id = ?1 AND is_deleted = 0 \
         ORDER BY created_at_us ASC, comment_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([lead_id], row_to_comment)?;

    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

/// Hide a comment for moderation.
///
/// # Errors
///
/// Returns [`LeadError::CommentNotFound`] if no visible comment has this id.
pub fn soft_delete_comment(conn: &Connection, id: CommentId, at: DateTime<Utc>) -> Result<()> {
    let changed = conn.execute(
        "UPDATE comments SET is_deleted = 1, deleted_at_us = ?1 \
         WHERE comment_id = ?2 AND is_deleted = 0",
        params![micros(at), id],
    )?;
    if changed == 0 {
        return Err(LeadError::CommentNotFound(id));
    }
    Ok(())
}
