//! Lead history reconstruction.
//!
//! Replays a lead's state-change audit entries into an ordered list of
//! state-to-state [`Transition`]s with the time spent before each change.
//! Reconstruction is read-only and never fails: malformed entries are skipped
//! with a warning, and any other failure yields an empty list.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, warn};

use crate::audit::store::{self, AuditFilter, AuditOrder};
use crate::audit::{AuditEntry, AuditPayload, StateChangePayload, StateKey};
use crate::db::leads;
use crate::engine::Engine;
use crate::error::Result;
use crate::model::{EntityRef, Lead, LeadId, LeadState};

/// Suffix on the trailing segment's target, e.g. `"Lost (current)"`.
pub const CURRENT_SUFFIX: &str = " (current)";

/// Where a transition's span comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    /// Synthesized from lead creation; no audit entry backs it directly.
    SinceCreation,
    /// Backed by a recorded audit entry.
    Recorded,
    /// From the last recorded change to now.
    UntilNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub total_minutes: i64,
}

impl Elapsed {
    /// Whole minutes from `start` to `end`, clamped at zero.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::from_minutes((end - start).num_minutes().max(0))
    }

    #[must_use]
    pub const fn from_minutes(total_minutes: i64) -> Self {
        Self {
            days: total_minutes / (24 * 60),
            hours: (total_minutes % (24 * 60)) / 60,
            minutes: total_minutes % 60,
            total_minutes,
        }
    }
}

/// One state-to-state step in a lead's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    /// Time spent in `from` before this change.
    pub elapsed: Elapsed,
    pub started_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub automatic: Option<bool>,
    pub segment: Segment,
}

/// Total time spent in one state across a history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDwell {
    pub state: String,
    pub total: Elapsed,
}

impl Engine {
    /// Reconstruct a lead's transitions, oldest first.
    ///
    /// Never fails: an unknown lead or a storage error is logged and yields
    /// an empty list.
    #[must_use]
    pub fn reconstruct(&self, conn: &Connection, lead_id: LeadId) -> Vec<Transition> {
        match self.try_reconstruct(conn, lead_id) {
            Ok(transitions) => transitions,
            Err(err) if err.is_not_found() => {
                warn!(lead = %lead_id, "history requested for unknown lead");
                Vec::new()
            }
            Err(err) => {
                error!(lead = %lead_id, error = %err, code = %err.code(), "history reconstruction failed");
                Vec::new()
            }
        }
    }

    fn try_reconstruct(&self, conn: &Connection, lead_id: LeadId) -> Result<Vec<Transition>> {
        let lead = leads::require_lead(conn, lead_id)?;
        let entries = store::query(
            conn,
            &EntityRef::lead(lead_id),
            &AuditFilter::state_updates(),
            AuditOrder::OldestFirst,
        )?;
        Ok(replay(
            &lead,
            &entries,
            self.clock.now(),
            self.config.history.min_trailing_gap(),
        ))
    }
}

/// Pure replay of `entries` (oldest first) for `lead` as of `now`.
///
/// `min_trailing_gap` is the shortest time since the last change for which a
/// trailing "until now" segment is emitted.
#[must_use]
pub fn replay(
    lead: &Lead,
    entries: &[AuditEntry],
    now: DateTime<Utc>,
    min_trailing_gap: Duration,
) -> Vec<Transition> {
    let changes: Vec<(&AuditEntry, StateChangePayload, StateKey)> = entries
        .iter()
        .filter_map(|entry| readable_change(lead, entry))
        .collect();

    let mut transitions = Vec::new();
    let mut running_key = StateKey::from(LeadState::New);
    let mut running_label = LeadState::New.name().to_string();
    let mut last_change = lead.created_at;

    for (entry, change, key) in changes {
        if key == running_key {
            continue;
        }
        let label = change.state_label();
        transitions.push(Transition {
            from: running_label,
            to: label.clone(),
            elapsed: Elapsed::between(last_change, entry.created_at),
            started_at: last_change,
            changed_at: entry.created_at,
            reason: change.reason,
            actor: change.actor.or_else(|| Some(entry.actor.clone())),
            automatic: change.automatic,
            segment: if transitions.is_empty() {
                Segment::SinceCreation
            } else {
                Segment::Recorded
            },
        });
        running_key = key;
        running_label = label;
        last_change = entry.created_at;
    }

    if transitions.is_empty() {
        return without_history(lead, now);
    }

    if now - last_change >= min_trailing_gap {
        transitions.push(Transition {
            from: running_label,
            to: format!("{}{CURRENT_SUFFIX}", lead.state.name()),
            elapsed: Elapsed::between(last_change, now),
            started_at: last_change,
            changed_at: now,
            reason: None,
            actor: None,
            automatic: None,
            segment: Segment::UntilNow,
        });
    }
    transitions
}

fn readable_change<'a>(
    lead: &Lead,
    entry: &'a AuditEntry,
) -> Option<(&'a AuditEntry, StateChangePayload, StateKey)> {
    match entry.after_payload() {
        Ok(AuditPayload::StateChange(change)) => {
            if let Some(key) = change.state_key() {
                Some((entry, change, key))
            } else {
                warn!(lead = %lead.id, entry = %entry.id, "skipping audit entry without a usable state");
                None
            }
        }
        Ok(AuditPayload::Other(_)) => {
            warn!(lead = %lead.id, entry = %entry.id, "skipping audit entry without a state_id field");
            None
        }
        Err(err) => {
            warn!(lead = %lead.id, entry = %entry.id, error = %err, "skipping unreadable audit entry");
            None
        }
    }
}

fn without_history(lead: &Lead, now: DateTime<Utc>) -> Vec<Transition> {
    if lead.state.is_fresh() {
        return Vec::new();
    }
    vec![Transition {
        from: LeadState::New.name().to_string(),
        to: lead.state.name().to_string(),
        elapsed: Elapsed::between(lead.created_at, now),
        started_at: lead.created_at,
        changed_at: now,
        reason: None,
        actor: None,
        automatic: None,
        segment: Segment::SinceCreation,
    }]
}

/// Total minutes spent in each state, in order of first appearance.
///
/// Each transition's span counts toward its `from` state.
#[must_use]
pub fn time_in_state(transitions: &[Transition]) -> Vec<StateDwell> {
    let mut dwell: Vec<(String, i64)> = Vec::new();
    for transition in transitions {
        let minutes = transition.elapsed.total_minutes;
        match dwell.iter().position(|(state, _)| *state == transition.from) {
            Some(idx) => dwell[idx].1 += minutes,
            None => dwell.push((transition.from.clone(), minutes)),
        }
    }
    dwell
        .into_iter()
        .map(|(state, total)| StateDwell {
            state,
            total: Elapsed::from_minutes(total),
        })
        .collect()
}
