//! Canonical SQLite schema for leadlog.
//!
//! - `lead_states`, `comment_types`, `loss_reasons` hold seeded reference data
//! - `leads` keeps only the *current* state of each lead
//! - `comments`, `loss_follow_ups`, `notifications` hold workflow side effects
//! - `audit_entries` is the append-only log every history view is replayed from

/// Migration v1: reference catalogs, workflow tables, and the audit log.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS lead_states (
    state_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL CHECK (
        category IN ('ordinary', 'recontact', 'final_negative', 'final_positive')
    )
);

CREATE TABLE IF NOT EXISTS comment_types (
    comment_type_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS loss_reasons (
    loss_reason_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1))
);

CREATE TABLE IF NOT EXISTS leads (
    lead_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    state_id INTEGER NOT NULL REFERENCES lead_states(state_id),
    is_client INTEGER NOT NULL DEFAULT 0 CHECK (is_client IN (0, 1)),
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    deleted_at_us INTEGER,
    created_at_us INTEGER NOT NULL,
    modified_at_us INTEGER,
    modified_by TEXT
);

CREATE TABLE IF NOT EXISTS comments (
    comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    lead_id INTEGER NOT NULL REFERENCES leads(lead_id),
    comment_type_id INTEGER NOT NULL REFERENCES comment_types(comment_type_id),
    body TEXT NOT NULL CHECK (length(trim(body)) > 0),
    author TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    deleted_at_us INTEGER,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS loss_follow_ups (
    follow_up_id INTEGER PRIMARY KEY AUTOINCREMENT,
    lead_id INTEGER NOT NULL REFERENCES leads(lead_id),
    loss_reason_id INTEGER NOT NULL REFERENCES loss_reasons(loss_reason_id),
    notes TEXT,
    future_possibility TEXT NOT NULL CHECK (future_possibility IN ('no', 'maybe', 'yes')),
    recontact_on TEXT,
    comment_id INTEGER REFERENCES comments(comment_id),
    actor TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('reminder', 'recontact')),
    entity_kind TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    fire_at_us INTEGER NOT NULL,
    priority TEXT NOT NULL CHECK (priority IN ('low', 'normal', 'high', 'urgent')),
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
    is_deleted INTEGER NOT NULL DEFAULT 0 CHECK (is_deleted IN (0, 1)),
    deleted_at_us INTEGER,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_entries (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('INSERT', 'UPDATE', 'DELETE')),
    actor TEXT NOT NULL,
    before_json TEXT,
    after_json TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

INSERT OR IGNORE INTO lead_states (state_id, name, category) VALUES
    (1, 'New', 'ordinary'),
    (2, 'Pending', 'ordinary'),
    (3, 'Contacted', 'ordinary'),
    (4, 'Qualified', 'ordinary'),
    (5, 'Negotiation', 'ordinary'),
    (6, 'Proposal Sent', 'ordinary'),
    (7, 'On Hold', 'ordinary'),
    (8, 'Recontact', 'recontact'),
    (9, 'Lost', 'final_negative'),
    (10, 'Won', 'final_positive');

INSERT OR IGNORE INTO comment_types (comment_type_id, name) VALUES
    (1, 'General note'),
    (2, 'Initial contact'),
    (3, 'Lead follow-up'),
    (4, 'Negotiation'),
    (5, 'Proposal sent'),
    (6, 'Temporary pause'),
    (7, 'Lead rejection'),
    (8, 'Call scheduled');

INSERT OR IGNORE INTO loss_reasons (loss_reason_id, name) VALUES
    (1, 'Budget'),
    (2, 'Competitor'),
    (3, 'No response'),
    (4, 'Not interested'),
    (5, 'Timing'),
    (6, 'Other');
";

/// Migration v2: read-path indexes and append-only enforcement on the audit log.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_audit_entries_entity_action_created
    ON audit_entries(entity_kind, entity_id, action, created_at_us);

CREATE INDEX IF NOT EXISTS idx_leads_state_deleted
    ON leads(state_id, is_deleted);

CREATE INDEX IF NOT EXISTS idx_comments_lead_created
    ON comments(lead_id, created_at_us);

CREATE INDEX IF NOT EXISTS idx_loss_follow_ups_lead
    ON loss_follow_ups(lead_id, created_at_us);

CREATE INDEX IF NOT EXISTS idx_notifications_entity_pending
    ON notifications(entity_kind, entity_id, is_deleted, is_read);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient_fire
    ON notifications(recipient, fire_at_us);

CREATE TRIGGER IF NOT EXISTS audit_entries_no_update
BEFORE UPDATE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit_entries is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_entries_no_delete
BEFORE DELETE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit_entries is append-only');
END;
";

/// Indexes expected by the audit, dedup, and reminder query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_audit_entries_entity_action_created",
    "idx_leads_state_deleted",
    "idx_comments_lead_created",
    "idx_loss_follow_ups_lead",
    "idx_notifications_entity_pending",
    "idx_notifications_recipient_fire",
];

/// Triggers that keep `audit_entries` append-only.
pub const REQUIRED_TRIGGERS: &[&str] = &["audit_entries_no_update", "audit_entries_no_delete"];

#[cfg(test)]
mod tests {
    use crate::db::migrations::migrate;
    use crate::model::{CommentType, LeadState};
    use rusqlite::Connection;

    fn migrated() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        migrate(&mut conn).expect("migrate");
        conn
    }

    #[test]
    fn seeded_states_match_catalog() {
        let conn = migrated();
        for state in LeadState::ALL {
            let (name, category): (String, String) = conn
                .query_row(
                    "SELECT name, category FROM lead_states WHERE state_id = ?1",
                    [state.id()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .expect("seeded state row");
            assert_eq!(name, state.name());
            assert_eq!(category, state.category().as_str());
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM lead_states", [], |row| row.get(0))
            .expect("count states");
        assert_eq!(count, i64::try_from(LeadState::ALL.len()).expect("fits"));
    }

    #[test]
    fn seeded_comment_types_match_catalog() {
        let conn = migrated();
        for kind in CommentType::ALL {
            let name: String = conn
                .query_row(
                    "SELECT name FROM comment_types WHERE comment_type_id = ?1",
                    [kind.id()],
                    |row| row.get(0),
                )
                .expect("seeded comment type row");
            assert_eq!(name, kind.name());
        }
    }

    #[test]
    fn audit_entries_reject_update_and_delete() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO audit_entries (entity_kind, entity_id, action, actor, after_json, created_at_us)
             VALUES ('leads', 1, 'UPDATE', 'ana', '{}', 1)",
            [],
        )
        .expect("insert is allowed");

        let update = conn.execute("UPDATE audit_entries SET actor = 'eve'", []);
        assert!(update.is_err());
        let delete = conn.execute("DELETE FROM audit_entries", []);
        assert!(delete.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
