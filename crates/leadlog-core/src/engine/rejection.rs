//! Closing a lead as lost.
//!
//! A rejection records a loss follow-up, optionally schedules a re-contact
//! prompt, withdraws the actor's pending reminders on the lead's comments,
//! and forces the lead into `Lost`. All of it commits or none of it does.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use super::{AppliedTransition, Engine, TransitionReason};
use crate::db::follow_ups::{self, NewFollowUp};
use crate::db::{leads, notifications};
use crate::error::{LeadError, Result};
use crate::model::{
    CommentId, EntityRef, FuturePossibility, Lead, LeadId, LeadState, LossFollowUp, LossReason,
    LossReasonId, Notification, NotificationKind,
};

/// Reason text recorded on every rejection-driven state change.
pub const REJECTION_REASON: &str = "lead rejection";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionRequest {
    pub lead_id: LeadId,
    /// Required; `None` fails with [`LeadError::MissingLossReason`].
    pub loss_reason_id: Option<LossReasonId>,
    pub notes: Option<String>,
    pub future_possibility: FuturePossibility,
    pub future_contact_date: Option<NaiveDate>,
    pub actor: String,
}

/// Everything a rejection wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionOutcome {
    pub follow_up: LossFollowUp,
    pub recontact: Option<Notification>,
    pub cancelled_reminders: usize,
    /// `None` if the lead was already `Lost`.
    pub transition: Option<AppliedTransition>,
}

impl Engine {
    /// Reject a lead in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::MissingLossReason`] without a loss reason,
    /// not-found for an unknown lead or loss reason, [`LeadError::LeadFrozen`]
    /// for clients, or a storage error. Nothing is written on error.
    pub fn reject(&self, conn: &mut Connection, request: &RejectionRequest) -> Result<LossFollowUp> {
        let tx = conn.transaction()?;
        let outcome = self.reject_in(&tx, request, None)?;
        tx.commit()?;
        Ok(outcome.follow_up)
    }

    /// Run the rejection workflow inside a caller-owned transaction.
    ///
    /// `comment_id` is set when a rejection comment triggered the workflow;
    /// the resulting state change is then marked automatic.
    ///
    /// # Errors
    ///
    /// See [`Engine::reject`].
    pub fn reject_in(
        &self,
        conn: &Connection,
        request: &RejectionRequest,
        comment_id: Option<CommentId>,
    ) -> Result<RejectionOutcome> {
        let lead = leads::require_lead(conn, request.lead_id)?;
        if lead.is_frozen() {
            return Err(LeadError::LeadFrozen(lead.id));
        }
        let reason_id = request
            .loss_reason_id
            .ok_or(LeadError::MissingLossReason(lead.id))?;
        let loss_reason = follow_ups::require_loss_reason(conn, reason_id)?;
        let now = self.clock.now();

        let follow_up = follow_ups::insert_follow_up(
            conn,
            &NewFollowUp {
                lead_id: lead.id,
                loss_reason: &loss_reason,
                notes: request.notes.as_deref(),
                future_possibility: request.future_possibility,
                recontact_on: request.future_contact_date,
                comment_id,
                actor: &request.actor,
            },
            now,
        )?;

        let recontact = match (
            request.future_possibility.indicates_recontact(),
            request.future_contact_date,
        ) {
            (true, Some(date)) => Some(self.schedule_recontact(conn, &lead, &loss_reason, request, date, now)?),
            (true, None) => {
                debug!(lead = %lead.id, "re-contact possible but no date given; nothing scheduled");
                None
            }
            (false, _) => None,
        };

        let cancelled_reminders =
            notifications::cancel_pending_comment_reminders(conn, lead.id, &request.actor, now)?;

        let reason = TransitionReason {
            text: Some(REJECTION_REASON.to_string()),
            automatic: comment_id.is_some(),
            loss_reason: Some(loss_reason.clone()),
            comment_id,
        };
        let transition =
            self.apply_transition_in(conn, lead.id, Some(LeadState::Lost), &request.actor, &reason)?;

        info!(
            lead = %lead.id,
            loss_reason = %loss_reason.name,
            future = %request.future_possibility,
            recontact = recontact.is_some(),
            cancelled_reminders,
            "lead rejected"
        );

        Ok(RejectionOutcome {
            follow_up,
            recontact,
            cancelled_reminders,
            transition,
        })
    }

    fn schedule_recontact(
        &self,
        conn: &Connection,
        lead: &Lead,
        loss_reason: &LossReason,
        request: &RejectionRequest,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        let hour = self.config.reminders.recontact_hour_utc;
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| LeadError::InvalidInput {
            field: "reminders.recontact_hour_utc",
            reason: format!("{hour} is not an hour of the day"),
        })?;

        let mut message = format!(
            "Lost on {} ({}); re-contact chance: {}.",
            now.date_naive(),
            loss_reason.name,
            request.future_possibility
        );
        if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            message.push(' ');
            message.push_str(notes);
        }

        notifications::schedule(
            conn,
            &notifications::NewNotification {
                recipient: request.actor.clone(),
                kind: NotificationKind::Recontact,
                entity: EntityRef::lead(lead.id),
                fire_at: date.and_time(time).and_utc(),
                priority: self.config.reminders.recontact_priority,
                title: format!("Re-contact {}", lead.name),
                message,
            },
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, AuditOrder, store};
    use crate::db::{comments, open_in_memory};
    use crate::engine::test_support::{engine_at, t0};
    use crate::model::{CommentType, Priority};
    use chrono::{Duration, TimeZone};

    fn request(lead_id: LeadId) -> RejectionRequest {
        RejectionRequest {
            lead_id,
            loss_reason_id: Some(LossReasonId(1)),
            notes: Some("Budget frozen until Q3".to_string()),
            future_possibility: FuturePossibility::Yes,
            future_contact_date: NaiveDate::from_ymd_opt(2024, 7, 1),
            actor: "ana".to_string(),
        }
    }

    #[test]
    fn reject_writes_follow_up_recontact_and_lost_entry() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Negotiation, t0()).expect("lead");

        let follow_up = engine.reject(&mut conn, &request(lead.id)).expect("reject");
        assert_eq!(follow_up.loss_reason, "Budget");
        assert_eq!(follow_up.comment_id, None);

        let lead_after = leads::require_lead(&conn, lead.id).expect("lead");
        assert_eq!(lead_after.state, LeadState::Lost);

        let pending = notifications::pending_for_lead(&conn, lead.id).expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, NotificationKind::Recontact);
        assert_eq!(pending[0].priority, Priority::High);
        assert_eq!(
            pending[0].fire_at,
            Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).single().expect("valid")
        );

        let entries = store::query(
            &conn,
            &EntityRef::lead(lead.id),
            &AuditFilter::state_updates(),
            AuditOrder::OldestFirst,
        )
        .expect("entries");
        assert_eq!(entries.len(), 1);
        let after = entries[0].after_payload().expect("after");
        let after = after.as_state_change().expect("state payload");
        assert_eq!(after.reason.as_deref(), Some(REJECTION_REASON));
        assert_eq!(after.loss_reason_id, Some(LossReasonId(1)));
        assert_eq!(after.loss_reason.as_deref(), Some("Budget"));
        assert_eq!(after.automatic, Some(false));
    }

    #[test]
    fn no_recontact_without_date_or_chance() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let a = leads::create_lead(&conn, "Acme", LeadState::Contacted, t0()).expect("a");
        let b = leads::create_lead(&conn, "Globex", LeadState::Contacted, t0()).expect("b");

        let no_date = RejectionRequest {
            future_contact_date: None,
            ..request(a.id)
        };
        engine.reject(&mut conn, &no_date).expect("reject a");

        let no_chance = RejectionRequest {
            future_possibility: FuturePossibility::No,
            ..request(b.id)
        };
        engine.reject(&mut conn, &no_chance).expect("reject b");

        assert!(notifications::pending_for_lead(&conn, a.id).expect("a").is_empty());
        assert!(notifications::pending_for_lead(&conn, b.id).expect("b").is_empty());
    }

    #[test]
    fn cancels_only_the_actors_pending_reminders() {
        let mut conn = open_in_memory().expect("db");
        let (engine, clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Contacted, t0()).expect("lead");
        let note = comments::insert_comment(&conn, lead.id, CommentType::GeneralNote, "ping", "ana", t0())
            .expect("note");
        for recipient in ["ana", "bob"] {
            notifications::schedule(
                &conn,
                &notifications::NewNotification {
                    recipient: recipient.to_string(),
                    kind: NotificationKind::Reminder,
                    entity: EntityRef::comment(note.id),
                    fire_at: t0() + Duration::days(3),
                    priority: Priority::Normal,
                    title: "Follow up".to_string(),
                    message: "ping".to_string(),
                },
                t0(),
            )
            .expect("schedule");
        }

        clock.advance(Duration::hours(2));
        let outcome = {
            let tx = conn.transaction().expect("tx");
            let outcome = engine
                .reject_in(
                    &tx,
                    &RejectionRequest {
                        future_possibility: FuturePossibility::No,
                        ..request(lead.id)
                    },
                    None,
                )
                .expect("reject");
            tx.commit().expect("commit");
            outcome
        };
        assert_eq!(outcome.cancelled_reminders, 1);

        let remaining = notifications::pending_for_lead(&conn, lead.id).expect("pending");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].recipient, "bob");
    }

    #[test]
    fn missing_or_unknown_loss_reason_writes_nothing() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Contacted, t0()).expect("lead");

        let err = engine
            .reject(
                &mut conn,
                &RejectionRequest {
                    loss_reason_id: None,
                    ..request(lead.id)
                },
            )
            .expect_err("missing");
        assert!(matches!(err, LeadError::MissingLossReason(_)));
        assert!(err.is_validation());

        let err = engine
            .reject(
                &mut conn,
                &RejectionRequest {
                    loss_reason_id: Some(LossReasonId(42)),
                    ..request(lead.id)
                },
            )
            .expect_err("unknown");
        assert!(err.is_not_found());

        assert!(follow_ups::list_follow_ups(&conn, lead.id).expect("list").is_empty());
        assert_eq!(
            leads::require_lead(&conn, lead.id).expect("lead").state,
            LeadState::Contacted
        );
    }

    #[test]
    fn won_lead_rejection_rolls_back_follow_up() {
        let mut conn = open_in_memory().expect("db");
        let (engine, _clock) = engine_at(t0());
        let lead = leads::create_lead(&conn, "Acme", LeadState::Won, t0()).expect("lead");

        let err = engine.reject(&mut conn, &request(lead.id)).expect_err("won");
        assert!(matches!(err, LeadError::InvalidTransition { .. }));
        assert!(follow_ups::list_follow_ups(&conn, lead.id).expect("list").is_empty());
        assert!(notifications::pending_for_lead(&conn, lead.id).expect("pending").is_empty());
    }
}
