//! `leadlog reject`: close a lead as lost without filing a comment.

use crate::output::{OutputMode, pretty_kv, render};
use crate::project::Project;
use chrono::NaiveDate;
use clap::Args;
use leadlog_core::engine::RejectionRequest;
use leadlog_core::model::{FuturePossibility, LeadId, LossReasonId};
use std::io::Write;

#[derive(Args, Debug)]
pub struct RejectArgs {
    /// Lead ID.
    pub lead: LeadId,

    /// Loss reason ID (see `leadlog reasons`).
    #[arg(long, value_name = "ID")]
    pub loss_reason: Option<LossReasonId>,

    /// Free-text notes for the loss follow-up.
    #[arg(long)]
    pub notes: Option<String>,

    /// Whether the lead is worth re-contacting: yes, maybe, or no.
    #[arg(long, value_name = "POSSIBILITY", default_value = "no")]
    pub future: FuturePossibility,

    /// Date (YYYY-MM-DD) to schedule a re-contact notification.
    #[arg(long, value_name = "DATE")]
    pub recontact_on: Option<NaiveDate>,
}

pub fn run_reject(
    args: &RejectArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let mut session = project.open()?;
    let actor = session.actor(actor_flag)?;

    let request = RejectionRequest {
        lead_id: args.lead,
        loss_reason_id: args.loss_reason,
        notes: args.notes.clone(),
        future_possibility: args.future,
        future_contact_date: args.recontact_on,
        actor,
    };
    let follow_up = session.engine.reject(&mut session.conn, &request)?;

    render(output, &follow_up, |f, w| {
        writeln!(w, "✓ Lead {} marked lost", f.lead_id)?;
        pretty_kv(w, "Reason", &f.loss_reason)?;
        pretty_kv(w, "Future", f.future_possibility.as_str())?;
        if let Some(date) = f.recontact_on {
            pretty_kv(w, "Recontact", date.to_string())?;
        }
        Ok(())
    })
}
