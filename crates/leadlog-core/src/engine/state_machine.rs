//! Guarded lead state changes and the audit entries describing them.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use super::Engine;
use crate::audit::{AuditAction, AuditEntry, AuditPayload, NewAuditEntry, StateChangePayload, store};
use crate::db::leads;
use crate::dedup::DedupCandidate;
use crate::error::{LeadError, Result};
use crate::model::{CommentId, EntityRef, Lead, LeadId, LeadState, LossReason};

/// Why a state change happened, recorded in the audit "after" payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionReason {
    pub text: Option<String>,
    /// Comment-driven rather than an explicit move.
    pub automatic: bool,
    pub loss_reason: Option<LossReason>,
    pub comment_id: Option<CommentId>,
}

impl TransitionReason {
    #[must_use]
    pub fn manual(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn automatic(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            automatic: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_loss_reason(mut self, reason: LossReason) -> Self {
        self.loss_reason = Some(reason);
        self
    }

    #[must_use]
    pub const fn with_comment(mut self, comment_id: CommentId) -> Self {
        self.comment_id = Some(comment_id);
        self
    }
}

/// A state change that took effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedTransition {
    pub from: LeadState,
    pub to: LeadState,
    /// `None` when the dedup guard suppressed the entry.
    pub audit: Option<AuditEntry>,
}

impl Engine {
    /// Move a lead to `target` in its own transaction.
    ///
    /// Returns the audit entry written, or `None` for a no-op or a
    /// deduplicated change.
    ///
    /// # Errors
    ///
    /// Returns not-found for unknown leads, [`LeadError::LeadFrozen`] for
    /// clients, [`LeadError::InvalidTransition`] when leaving a won state, or
    /// a storage error. Nothing is written on error.
    pub fn apply_transition(
        &self,
        conn: &mut Connection,
        lead_id: LeadId,
        target: Option<LeadState>,
        actor: &str,
        reason: TransitionReason,
    ) -> Result<Option<AuditEntry>> {
        let tx = conn.transaction()?;
        let applied = self.apply_transition_in(&tx, lead_id, target, actor, &reason)?;
        tx.commit()?;
        Ok(applied.and_then(|applied| applied.audit))
    }

    /// Same as [`Engine::apply_transition`] inside a caller-owned transaction.
    ///
    /// # Errors
    ///
    /// See [`Engine::apply_transition`].
    pub fn apply_transition_in(
        &self,
        conn: &Connection,
        lead_id: LeadId,
        target: Option<LeadState>,
        actor: &str,
        reason: &TransitionReason,
    ) -> Result<Option<AppliedTransition>> {
        let lead = leads::require_lead(conn, lead_id)?;
        if lead.is_frozen() {
            return Err(LeadError::LeadFrozen(lead_id));
        }

        let Some(target) = target else {
            debug!(lead = %lead_id, "no target state; nothing to apply");
            return Ok(None);
        };
        if target == lead.state {
            debug!(lead = %lead_id, state = %target, "lead already in target state");
            return Ok(None);
        }
        lead.state
            .can_transition_to(target)
            .map_err(|why| LeadError::InvalidTransition {
                lead: lead_id,
                from: lead.state,
                to: target,
                reason: why,
            })?;

        let now = self.clock.now();
        leads::update_state(conn, lead_id, target, actor, now)?;

        let candidate = DedupCandidate {
            entity: EntityRef::lead(lead_id),
            action: AuditAction::Update,
            target_state_id: target.id(),
        };
        if self.dedup.should_suppress(conn, &candidate, now)? {
            debug!(lead = %lead_id, from = %lead.state, to = %target, "state changed; audit entry deduplicated");
            return Ok(Some(AppliedTransition {
                from: lead.state,
                to: target,
                audit: None,
            }));
        }

        let audit = append_state_change(conn, &lead, target, actor, reason, now)?;
        info!(
            lead = %lead_id,
            from = %lead.state,
            to = %target,
            automatic = reason.automatic,
            entry = %audit.id,
            "lead state changed"
        );
        Ok(Some(AppliedTransition {
            from: lead.state,
            to: target,
            audit: Some(audit),
        }))
    }

    /// Close a lead as won and flag it as a client, after which it is frozen.
    ///
    /// # Errors
    ///
    /// Returns not-found, [`LeadError::LeadFrozen`] if already a client, or a
    /// storage error.
    pub fn convert_to_client(
        &self,
        conn: &mut Connection,
        lead_id: LeadId,
        actor: &str,
    ) -> Result<Lead> {
        let tx = conn.transaction()?;
        self.apply_transition_in(
            &tx,
            lead_id,
            Some(LeadState::Won),
            actor,
            &TransitionReason::manual("converted to client"),
        )?;
        leads::mark_client(&tx, lead_id, actor, self.clock.now())?;
        let lead = leads::require_lead(&tx, lead_id)?;
        tx.commit()?;
        info!(lead = %lead_id, "lead converted to client");
        Ok(lead)
    }
}

fn append_state_change(
    conn: &Connection,
    lead: &Lead,
    target: LeadState,
    actor: &str,
    reason: &TransitionReason,
    now: DateTime<Utc>,
) -> Result<AuditEntry> {
    let before = AuditPayload::StateChange(StateChangePayload::for_state(lead.state));
    let after = AuditPayload::StateChange(StateChangePayload {
        reason: reason.text.clone(),
        actor: Some(actor.to_string()),
        automatic: Some(reason.automatic),
        loss_reason_id: reason.loss_reason.as_ref().map(|r| r.id),
        loss_reason: reason.loss_reason.as_ref().map(|r| r.name.clone()),
        comment_id: reason.comment_id,
        ..StateChangePayload::for_state(target)
    });

    let entry = NewAuditEntry::update(EntityRef::lead(lead.id), actor, Some(&before), &after, now)?;
    let id = store::append(conn, &entry)?;
    Ok(entry.into_stored(id))
}
