//! Duplicate guard in front of the audit store.
//!
//! Before a state-change entry is appended, the guard looks for an entry on
//! the same entity, with the same action, that already records the same
//! target state inside the configured window. This is a read-then-write
//! check with no uniqueness constraint behind it: two truly concurrent
//! writers can both pass.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::audit::store::{self, AuditFilter, AuditOrder};
use crate::audit::{AuditAction, AuditPayload};
use crate::config::DedupConfig;
use crate::error::Result;
use crate::model::EntityRef;

/// What is about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupCandidate {
    pub entity: EntityRef,
    pub action: AuditAction,
    pub target_state_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupGuard {
    window: Duration,
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::from_config(&DedupConfig::default())
    }
}

impl DedupGuard {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    #[must_use]
    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.window())
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// `true` if an equivalent entry was written within the window ending at `now`.
    ///
    /// Entries whose payload cannot be parsed never match.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lookup fails.
    pub fn should_suppress(
        &self,
        conn: &Connection,
        candidate: &DedupCandidate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let filter = AuditFilter {
            action: Some(candidate.action),
            since: Some(now - self.window),
            state_changes_only: true,
            ..AuditFilter::default()
        };
        let recent = store::query(conn, &candidate.entity, &filter, AuditOrder::NewestFirst)?;

        let duplicate = recent.iter().find(|entry| match entry.after_payload() {
            Ok(AuditPayload::StateChange(change)) => {
                change.state_id == Some(candidate.target_state_id)
            }
            Ok(AuditPayload::Other(_)) | Err(_) => false,
        });

        if let Some(entry) = duplicate {
            tracing::debug!(
                entity = %candidate.entity,
                state_id = candidate.target_state_id,
                previous = %entry.id,
                "suppressing duplicate state-change entry"
            );
            return Ok(true);
        }
        Ok(false)
    }
}
