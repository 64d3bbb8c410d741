//! `leadlog lead`: intake, inspect, and list leads.

use crate::output::{OutputMode, pretty_kv, pretty_section, render, render_mode, stamp};
use crate::project::Project;
use clap::{Args, Subcommand};
use leadlog_core::db::leads::{AllLeads, LeadFilter};
use leadlog_core::db::{comments, follow_ups, leads, notifications};
use leadlog_core::model::{Comment, Lead, LeadId, LeadState, LossFollowUp, Notification};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct LeadArgs {
    #[command(subcommand)]
    pub command: LeadCommand,
}

#[derive(Subcommand, Debug)]
pub enum LeadCommand {
    #[command(
        about = "Register a new lead",
        after_help = "EXAMPLES:\n    leadlog lead add \"Acme Corp\"\n    leadlog lead add \"Globex\" --state contacted"
    )]
    Add(LeadAddArgs),

    #[command(
        about = "Show a lead with its comments, follow-ups, and pending notifications",
        after_help = "EXAMPLES:\n    leadlog lead show 12\n    leadlog lead show 12 --json"
    )]
    Show(LeadShowArgs),

    #[command(
        about = "List leads, newest first",
        after_help = "EXAMPLES:\n    leadlog lead list\n    leadlog lead list --state negotiation --limit 20"
    )]
    List(LeadListArgs),
}

#[derive(Args, Debug)]
pub struct LeadAddArgs {
    /// Display name of the lead.
    pub name: String,

    /// Initial state (name or key). Defaults to New.
    #[arg(long, default_value = "new")]
    pub state: LeadState,
}

#[derive(Args, Debug)]
pub struct LeadShowArgs {
    /// Lead ID.
    pub id: LeadId,
}

#[derive(Args, Debug)]
pub struct LeadListArgs {
    /// Only leads in this state.
    #[arg(long)]
    pub state: Option<LeadState>,

    /// Hide recontact and closed leads.
    #[arg(long)]
    pub active: bool,

    /// Include converted clients.
    #[arg(long)]
    pub clients: bool,

    /// Maximum number of rows.
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct LeadDetail {
    lead: Lead,
    comments: Vec<Comment>,
    follow_ups: Vec<LossFollowUp>,
    pending_notifications: Vec<Notification>,
}

pub fn run_lead(args: &LeadArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    match &args.command {
        LeadCommand::Add(add) => run_lead_add(add, output, project),
        LeadCommand::Show(show) => run_lead_show(show, output, project),
        LeadCommand::List(list) => run_lead_list(list, output, project),
    }
}

fn run_lead_add(args: &LeadAddArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let session = project.open()?;
    let lead = leads::create_lead(&session.conn, &args.name, args.state, session.engine.now())?;
    render(output, &lead, |lead, w| {
        writeln!(w, "✓ Created lead {} ({}) in state {}", lead.id, lead.name, lead.state)
    })
}

fn run_lead_show(args: &LeadShowArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let session = project.open()?;
    let conn = &session.conn;
    let detail = LeadDetail {
        lead: leads::require_lead(conn, args.id)?,
        comments: comments::list_comments(conn, args.id)?,
        follow_ups: follow_ups::list_follow_ups(conn, args.id)?,
        pending_notifications: notifications::pending_for_lead(conn, args.id)?,
    };

    render(output, &detail, |d, w| {
        pretty_section(w, &format!("Lead {}: {}", d.lead.id, d.lead.name))?;
        pretty_kv(w, "State", d.lead.state.name())?;
        pretty_kv(w, "Client", if d.lead.is_client { "yes (frozen)" } else { "no" })?;
        pretty_kv(w, "Created", stamp(d.lead.created_at))?;
        if let Some(modified_at) = d.lead.modified_at {
            let by = d.lead.modified_by.as_deref().unwrap_or("-");
            pretty_kv(w, "Modified", format!("{} by {by}", stamp(modified_at)))?;
        }

        if !d.comments.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Comments")?;
            for c in &d.comments {
                writeln!(w, "{}  {:<16} {:<10} {}", stamp(c.created_at), c.comment_type, c.author, c.body)?;
            }
        }

        if !d.follow_ups.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Loss follow-ups")?;
            for f in &d.follow_ups {
                let recontact = f
                    .recontact_on
                    .map_or_else(|| "-".to_string(), |date| date.to_string());
                writeln!(
                    w,
                    "{}  {:<14} future={:<5} recontact={recontact}  {}",
                    stamp(f.created_at),
                    f.loss_reason,
                    f.future_possibility,
                    f.notes.as_deref().unwrap_or("")
                )?;
            }
        }

        if !d.pending_notifications.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Pending notifications")?;
            for n in &d.pending_notifications {
                writeln!(w, "{}  {:<9} {:<8} {}", stamp(n.fire_at), n.kind, n.priority, n.title)?;
            }
        }
        Ok(())
    })
}

fn run_lead_list(args: &LeadListArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let session = project.open()?;
    let filter = LeadFilter {
        state: args.state,
        active_pipeline_only: args.active,
        include_clients: args.clients,
        limit: args.limit,
    };
    let rows = leads::list_leads(&session.conn, &filter, "", &AllLeads)?;

    render_mode(
        output,
        &rows,
        |rows, w| {
            writeln!(w, "id\tstate\tclient\tname")?;
            for lead in rows {
                writeln!(w, "{}\t{}\t{}\t{}", lead.id, lead.state.as_str(), lead.is_client, lead.name)?;
            }
            Ok(())
        },
        |rows, w| {
            if rows.is_empty() {
                return writeln!(w, "No leads.");
            }
            writeln!(w, "{:>5}  {:<14} {:<7} NAME", "ID", "STATE", "CLIENT")?;
            for lead in rows {
                let client = if lead.is_client { "yes" } else { "" };
                writeln!(w, "{:>5}  {:<14} {:<7} {}", lead.id, lead.state.name(), client, lead.name)?;
            }
            Ok(())
        },
    )
}
