//! Comment creation and the workflows a comment can trigger.

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use super::{AppliedTransition, Engine, RejectionRequest, TransitionReason};
use crate::db::notifications::{self, NewNotification};
use crate::db::{comments, leads};
use crate::error::{LeadError, Result};
use crate::model::{
    Comment, CommentType, EntityRef, FuturePossibility, Lead, LeadId, LossFollowUp, LossReasonId,
    Notification, NotificationKind,
};
use crate::transition::WorkflowDescriptor;

/// Ask for a follow-up reminder on the new comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderRequest {
    /// Days until the reminder fires; `None` uses the comment type's default.
    pub days: Option<u32>,
}

/// Rejection fields collected alongside a rejection comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionDetails {
    pub loss_reason_id: Option<LossReasonId>,
    pub notes: Option<String>,
    pub future_possibility: FuturePossibility,
    pub future_contact_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRequest {
    pub lead_id: LeadId,
    pub comment_type: CommentType,
    pub text: String,
    pub actor: String,
    pub reminder: Option<ReminderRequest>,
    /// Move the lead according to the transition table.
    pub auto_transition: bool,
    /// Only read for rejection comment types.
    pub rejection: Option<RejectionDetails>,
}

impl CommentRequest {
    #[must_use]
    pub fn new(
        lead_id: LeadId,
        comment_type: CommentType,
        text: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            lead_id,
            comment_type,
            text: text.into(),
            actor: actor.into(),
            reminder: None,
            auto_transition: true,
            rejection: None,
        }
    }
}

/// Side effects a comment produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    CommentCreated,
    RejectionProcessed,
    ReminderCreated,
    StateChanged,
}

impl ActionTaken {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CommentCreated => "comment_created",
            Self::RejectionProcessed => "rejection_processed",
            Self::ReminderCreated => "reminder_created",
            Self::StateChanged => "state_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentOutcome {
    pub comment: Comment,
    pub follow_up: Option<LossFollowUp>,
    pub reminder: Option<Notification>,
    pub transition: Option<AppliedTransition>,
    pub actions: BTreeSet<ActionTaken>,
}

impl Engine {
    /// File a comment and run whatever it triggers, in one transaction.
    ///
    /// A rejection comment runs the rejection workflow instead of the
    /// ordinary transition. `state_changed` is reported whenever the lead's
    /// state moved, even if the audit entry was deduplicated.
    ///
    /// # Errors
    ///
    /// Returns not-found for an unknown lead, [`LeadError::LeadFrozen`] for
    /// clients, [`LeadError::InvalidInput`] for blank text, any rejection
    /// error, or a storage error. Nothing is written on error.
    pub fn create_comment(&self, conn: &mut Connection, request: &CommentRequest) -> Result<CommentOutcome> {
        let tx = conn.transaction()?;
        let outcome = self.create_comment_in(&tx, request)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn create_comment_in(&self, conn: &Connection, request: &CommentRequest) -> Result<CommentOutcome> {
        let lead = leads::require_lead(conn, request.lead_id)?;
        if lead.is_frozen() {
            return Err(LeadError::LeadFrozen(lead.id));
        }

        let workflow = self.table.describe(request.comment_type);
        let now = self.clock.now();
        let comment = comments::insert_comment(
            conn,
            lead.id,
            request.comment_type,
            &request.text,
            &request.actor,
            now,
        )?;

        let mut actions = BTreeSet::from([ActionTaken::CommentCreated]);
        let mut follow_up = None;
        let mut transition = None;

        if workflow.is_rejection {
            let details = request.rejection.clone().unwrap_or_default();
            let rejection = self.reject_in(
                conn,
                &RejectionRequest {
                    lead_id: lead.id,
                    loss_reason_id: details.loss_reason_id,
                    notes: details.notes,
                    future_possibility: details.future_possibility,
                    future_contact_date: details.future_contact_date,
                    actor: request.actor.clone(),
                },
                Some(comment.id),
            )?;
            actions.insert(ActionTaken::RejectionProcessed);
            follow_up = Some(rejection.follow_up);
            transition = rejection.transition;
        }

        let reminder = match request.reminder {
            Some(reminder) => self.schedule_reminder(conn, &lead, &comment, &workflow, reminder)?,
            None => None,
        };
        if reminder.is_some() {
            actions.insert(ActionTaken::ReminderCreated);
        }

        if !workflow.is_rejection && request.auto_transition {
            let reason = TransitionReason::automatic(request.comment_type.name()).with_comment(comment.id);
            transition = self.apply_transition_in(
                conn,
                lead.id,
                workflow.triggers_state,
                &request.actor,
                &reason,
            )?;
        }
        if transition.is_some() {
            actions.insert(ActionTaken::StateChanged);
        }

        debug!(
            lead = %lead.id,
            comment = %comment.id,
            comment_type = %request.comment_type,
            actions = ?actions,
            "comment filed"
        );

        Ok(CommentOutcome {
            comment,
            follow_up,
            reminder,
            transition,
            actions,
        })
    }

    fn schedule_reminder(
        &self,
        conn: &Connection,
        lead: &Lead,
        comment: &Comment,
        workflow: &WorkflowDescriptor,
        request: ReminderRequest,
    ) -> Result<Option<Notification>> {
        if !workflow.allows_reminder {
            debug!(comment_type = %comment.comment_type, "comment type does not take reminders");
            return Ok(None);
        }
        let Some(days) = request.days.or(workflow.default_reminder_days) else {
            return Ok(None);
        };

        let fire_at = comment
            .created_at
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| LeadError::InvalidInput {
                field: "reminder days",
                reason: format!("{days} days from {} is out of range", comment.created_at),
            })?;
        let notification = notifications::schedule(
            conn,
            &NewNotification {
                recipient: comment.author.clone(),
                kind: NotificationKind::Reminder,
                entity: EntityRef::comment(comment.id),
                fire_at,
                priority: self.config.reminders.default_priority,
                title: format!("Follow up: {}", lead.name),
                message: comment.body.clone(),
            },
            comment.created_at,
        )?;
        Ok(Some(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{follow_ups, open_in_memory};
    use crate::engine::test_support::{engine_at, t0};
    use crate::model::LeadState;

    #[test]
    fn initial_contact_moves_lead_and_schedules_default_reminder() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::New, t0()).expect("lead");

        let request = CommentRequest {
            reminder: Some(ReminderRequest::default()),
            ..CommentRequest::new(lead.id, CommentType::InitialContact, "Intro call", "ana")
        };
        let outcome = engine.create_comment(&mut conn, &request).expect("comment");

        assert_eq!(
            outcome.actions,
            BTreeSet::from([
                ActionTaken::CommentCreated,
                ActionTaken::ReminderCreated,
                ActionTaken::StateChanged,
            ])
        );
        let reminder = outcome.reminder.expect("reminder");
        assert_eq!(reminder.fire_at, t0() + Duration::days(2));
        assert_eq!(reminder.entity, EntityRef::comment(outcome.comment.id));

        let audit = outcome.transition.and_then(|t| t.audit).expect("audited");
        let after = audit.after_payload().expect("after");
        let after = after.as_state_change().expect("state payload");
        assert_eq!(after.automatic, Some(true));
        assert_eq!(after.reason.as_deref(), Some("Initial contact"));
        assert_eq!(after.comment_id, Some(outcome.comment.id));
        assert_eq!(
            leads::require_lead(&conn, lead.id).expect("lead").state,
            LeadState::Contacted
        );
    }

    #[test]
    fn note_without_transition_only_creates_comment() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Contacted, t0()).expect("lead");

        let outcome = engine
            .create_comment(
                &mut conn,
                &CommentRequest::new(lead.id, CommentType::GeneralNote, "Prefers email", "ana"),
            )
            .expect("comment");
        assert_eq!(outcome.actions, BTreeSet::from([ActionTaken::CommentCreated]));

        let opted_out = CommentRequest {
            auto_transition: false,
            reminder: Some(ReminderRequest { days: Some(10) }),
            ..CommentRequest::new(lead.id, CommentType::Negotiation, "Pricing talk", "ana")
        };
        let outcome = engine.create_comment(&mut conn, &opted_out).expect("comment");
        assert_eq!(
            outcome.actions,
            BTreeSet::from([ActionTaken::CommentCreated, ActionTaken::ReminderCreated])
        );
        assert_eq!(
            outcome.reminder.expect("reminder").fire_at,
            t0() + Duration::days(10)
        );
        assert_eq!(
            leads::require_lead(&conn, lead.id).expect("lead").state,
            LeadState::Contacted
        );
    }

    #[test]
    fn rejection_comment_runs_rejection_and_ignores_reminder() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Negotiation, t0()).expect("lead");

        let request = CommentRequest {
            reminder: Some(ReminderRequest { days: Some(3) }),
            rejection: Some(RejectionDetails {
                loss_reason_id: Some(LossReasonId(2)),
                ..RejectionDetails::default()
            }),
            ..CommentRequest::new(lead.id, CommentType::LeadRejection, "Went with a rival", "ana")
        };
        let outcome = engine.create_comment(&mut conn, &request).expect("reject");

        assert_eq!(
            outcome.actions,
            BTreeSet::from([
                ActionTaken::CommentCreated,
                ActionTaken::RejectionProcessed,
                ActionTaken::StateChanged,
            ])
        );
        let follow_up = outcome.follow_up.expect("follow-up");
        assert_eq!(follow_up.comment_id, Some(outcome.comment.id));
        assert_eq!(follow_up.loss_reason, "Competitor");

        let audit = outcome.transition.and_then(|t| t.audit).expect("audited");
        let after = audit.after_payload().expect("after");
        let after = after.as_state_change().expect("state payload");
        assert_eq!(after.automatic, Some(true));
        assert_eq!(after.comment_id, Some(outcome.comment.id));
    }

    #[test]
    fn rejection_comment_without_reason_rolls_back_comment() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Negotiation, t0()).expect("lead");

        let err = engine
            .create_comment(
                &mut conn,
                &CommentRequest::new(lead.id, CommentType::LeadRejection, "No thanks", "ana"),
            )
            .expect_err("missing reason");
        assert!(matches!(err, LeadError::MissingLossReason(_)));
        assert!(comments::list_comments(&conn, lead.id).expect("list").is_empty());
        assert!(follow_ups::list_follow_ups(&conn, lead.id).expect("list").is_empty());
    }

    #[test]
    fn out_of_range_reminder_is_refused_and_rolls_back() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::New, t0()).expect("lead");

        let request = CommentRequest {
            reminder: Some(ReminderRequest { days: Some(u32::MAX) }),
            ..CommentRequest::new(lead.id, CommentType::InitialContact, "Intro call", "ana")
        };
        let err = engine.create_comment(&mut conn, &request).expect_err("overflow");
        assert!(matches!(err, LeadError::InvalidInput { field: "reminder days", .. }));
        assert!(err.is_validation());

        assert!(comments::list_comments(&conn, lead.id).expect("list").is_empty());
        assert!(notifications::pending_for_lead(&conn, lead.id).expect("pending").is_empty());
        assert_eq!(
            leads::require_lead(&conn, lead.id).expect("lead").state,
            LeadState::New
        );
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::New, t0()).expect("lead");
        let err = engine
            .create_comment(
                &mut conn,
                &CommentRequest::new(lead.id, CommentType::InitialContact, "  ", "ana"),
            )
            .expect_err("blank");
        assert!(err.is_validation());
        assert_eq!(
            leads::require_lead(&conn, lead.id).expect("lead").state,
            LeadState::New
        );
    }
}
