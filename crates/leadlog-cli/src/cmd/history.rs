//! `leadlog history`: replay a lead's audit trail into state-to-state spans.

use crate::output::{OutputMode, pretty_section, render_mode, stamp};
use crate::project::Project;
use clap::Args;
use leadlog_core::history::{Elapsed, StateDwell, Transition, time_in_state};
use leadlog_core::model::LeadId;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Lead ID.
    pub lead: LeadId,

    /// Also total the time spent in each state.
    #[arg(long)]
    pub dwell: bool,
}

#[derive(Debug, Serialize)]
struct HistoryOutput {
    lead_id: LeadId,
    transitions: Vec<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dwell: Option<Vec<StateDwell>>,
}

fn span(e: &Elapsed) -> String {
    format!("{}d {}h {}m", e.days, e.hours, e.minutes)
}

pub fn run_history(args: &HistoryArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let session = project.open()?;
    let transitions = session.engine.reconstruct(&session.conn, args.lead);
    let dwell = args.dwell.then(|| time_in_state(&transitions));
    let result = HistoryOutput {
        lead_id: args.lead,
        transitions,
        dwell,
    };

    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(w, "from\tto\tminutes\tchanged_at\tactor\treason")?;
            for t in &r.transitions {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    t.from,
                    t.to,
                    t.elapsed.total_minutes,
                    stamp(t.changed_at),
                    t.actor.as_deref().unwrap_or(""),
                    t.reason.as_deref().unwrap_or("")
                )?;
            }
            Ok(())
        },
        |r, w| {
            if r.transitions.is_empty() {
                return writeln!(w, "No recorded state changes for lead {}.", r.lead_id);
            }
            pretty_section(w, &format!("History for lead {}", r.lead_id))?;
            for t in &r.transitions {
                let who = t.actor.as_deref().unwrap_or("-");
                let auto = if t.automatic == Some(true) { " [auto]" } else { "" };
                writeln!(
                    w,
                    "{:<16} -> {:<26} {:>12}  {}  {who}{auto}",
                    t.from,
                    t.to,
                    span(&t.elapsed),
                    stamp(t.changed_at)
                )?;
                if let Some(ref reason) = t.reason {
                    writeln!(w, "{:<20}{reason}", "")?;
                }
            }
            if let Some(ref dwell) = r.dwell {
                writeln!(w)?;
                pretty_section(w, "Time in state")?;
                for d in dwell {
                    writeln!(w, "{:<16} {}", d.state, span(&d.total))?;
                }
            }
            Ok(())
        },
    )
}
