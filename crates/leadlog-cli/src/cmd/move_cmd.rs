//! `leadlog move`: explicit state change outside the comment workflow.

use crate::output::{OutputMode, render};
use crate::project::Project;
use clap::Args;
use leadlog_core::db::leads;
use leadlog_core::engine::TransitionReason;
use leadlog_core::model::{AuditEntryId, LeadId, LeadState};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Lead ID.
    pub lead: LeadId,

    /// Target state (name or key), e.g. "Qualified" or `proposal_sent`.
    pub state: LeadState,

    /// Reason recorded on the audit entry.
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct MoveOutput {
    lead_id: LeadId,
    target: LeadState,
    changed: bool,
    audit_entry: Option<AuditEntryId>,
}

pub fn run_move(
    args: &MoveArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let mut session = project.open()?;
    let actor = session.actor(actor_flag)?;

    let reason = TransitionReason {
        text: args.reason.clone(),
        ..TransitionReason::default()
    };
    let before = leads::require_lead(&session.conn, args.lead)?;
    let entry = session.engine.apply_transition(
        &mut session.conn,
        args.lead,
        Some(args.state),
        &actor,
        reason,
    )?;

    let result = MoveOutput {
        lead_id: args.lead,
        target: args.state,
        changed: before.state != args.state,
        audit_entry: entry.map(|e| e.id),
    };
    render(output, &result, |r, w| {
        if r.changed {
            writeln!(w, "✓ Lead {} moved to {}", r.lead_id, r.target)
        } else {
            writeln!(w, "Lead {} already in {}; nothing to do", r.lead_id, r.target)
        }
    })
}
