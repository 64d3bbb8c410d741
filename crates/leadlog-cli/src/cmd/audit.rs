//! `leadlog audit`: raw audit trail for one lead.

use crate::output::{OutputMode, render_mode, stamp};
use crate::project::Project;
use clap::Args;
use leadlog_core::audit::{AuditAction, AuditEntry, AuditFilter, AuditOrder, AuditPayload, store};
use leadlog_core::model::{AuditEntryId, EntityRef, LeadId};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Lead ID.
    pub lead: LeadId,

    /// Newest entries first.
    #[arg(long)]
    pub newest_first: bool,

    /// Maximum number of entries.
    #[arg(long)]
    pub limit: Option<u32>,

    /// Only entries recording a state change.
    #[arg(long)]
    pub state_changes: bool,

    /// Only entries written by this actor.
    #[arg(long, value_name = "ACTOR")]
    pub by: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuditRow {
    id: AuditEntryId,
    action: AuditAction,
    actor: String,
    created_at: chrono::DateTime<chrono::Utc>,
    before: Option<Value>,
    after: Value,
    #[serde(skip)]
    raw_after: String,
    #[serde(skip)]
    summary: String,
}

/// Parsed JSON when the stored text is valid, else the raw text as a string.
fn payload_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

impl From<&AuditEntry> for AuditRow {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            actor: entry.actor.clone(),
            created_at: entry.created_at,
            before: entry.before.as_deref().map(payload_value),
            after: payload_value(&entry.after),
            raw_after: entry.after.clone(),
            summary: summary(entry),
        }
    }
}

fn summary(entry: &AuditEntry) -> String {
    match entry.after_payload() {
        Ok(AuditPayload::StateChange(change)) => {
            let reason = change
                .reason
                .as_deref()
                .map_or_else(String::new, |r| format!(" ({r})"));
            format!("state -> {}{reason}", change.state_label())
        }
        Ok(AuditPayload::Other(fields)) => {
            let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
            format!("fields: {}", keys.join(", "))
        }
        Err(err) => format!("unreadable payload: {err}"),
    }
}

pub fn run_audit(args: &AuditArgs, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let session = project.open()?;
    let filter = AuditFilter {
        actor: args.by.clone(),
        state_changes_only: args.state_changes,
        limit: args.limit,
        ..AuditFilter::default()
    };
    let order = if args.newest_first {
        AuditOrder::NewestFirst
    } else {
        AuditOrder::OldestFirst
    };
    let rows: Vec<AuditRow> = store::query(&session.conn, &EntityRef::lead(args.lead), &filter, order)?
        .iter()
        .map(AuditRow::from)
        .collect();

    render_mode(
        output,
        &rows,
        |rows, w| {
            writeln!(w, "id\taction\tactor\tcreated_at\tafter")?;
            for r in rows {
                writeln!(w, "{}\t{}\t{}\t{}\t{}", r.id, r.action, r.actor, stamp(r.created_at), r.raw_after)?;
            }
            Ok(())
        },
        |rows, w| {
            if rows.is_empty() {
                return writeln!(w, "No audit entries for lead {}.", args.lead);
            }
            for r in rows {
                writeln!(
                    w,
                    "#{:<5} {}  {:<6} {:<12} {}",
                    r.id.0,
                    stamp(r.created_at),
                    r.action,
                    r.actor,
                    r.summary
                )?;
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payloads_fall_back_to_text() {
        assert_eq!(payload_value(r#"{"state_id":3}"#)["state_id"], 3);
        assert_eq!(payload_value("{oops"), Value::String("{oops".to_string()));
    }
}
