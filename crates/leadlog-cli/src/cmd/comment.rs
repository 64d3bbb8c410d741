//! `leadlog comment`: file a typed comment and run its workflow.

use crate::output::{OutputMode, render, stamp};
use crate::project::Project;
use chrono::NaiveDate;
use clap::Args;
use leadlog_core::LeadError;
use leadlog_core::engine::{CommentRequest, RejectionDetails, ReminderRequest};
use leadlog_core::model::{CommentType, FuturePossibility, LeadId, LossReasonId};
use std::io::Write;

const MAX_COMMENT_BODY_CHARS: usize = 8_192;

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Lead ID.
    pub lead: LeadId,

    /// Comment type (name, key, or numeric id), e.g. "Initial contact".
    #[arg(value_name = "TYPE")]
    pub comment_type: String,

    /// Comment body.
    pub text: String,

    /// Schedule a follow-up reminder; DAYS defaults to the type's default.
    #[arg(long, value_name = "DAYS", num_args = 0..=1)]
    pub remind: Option<Option<u32>>,

    /// Record the comment without moving the lead.
    #[arg(long)]
    pub no_transition: bool,

    /// Loss reason ID (rejection comments).
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

fn validate_comment_body(body: &str) -> Result<(), LeadError> {
    let reason = if body.trim().is_empty() {
        "comment body must not be empty".to_string()
    } else if body.chars().count() > MAX_COMMENT_BODY_CHARS {
        format!("comment body must be <= {MAX_COMMENT_BODY_CHARS} characters")
    } else if body.chars().any(|ch| ch.is_control() && ch != '\n' && ch != '\t') {
        "comment body must not contain control characters".to_string()
    } else {
        return Ok(());
    };
    Err(LeadError::InvalidInput {
        field: "text",
        reason,
    })
}

pub fn run_comment(
    args: &CommentArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let comment_type: CommentType = args
        .comment_type
        .parse()
        .map_err(|_| LeadError::CommentTypeNotFound(args.comment_type.clone()))?;
    validate_comment_body(&args.text)?;

    let mut session = project.open()?;
    let actor = session.actor(actor_flag)?;

    let rejection = args.loss_reason.is_some() || args.notes.is_some() || args.recontact_on.is_some();
    let request = CommentRequest {
        reminder: args.remind.map(|days| ReminderRequest { days }),
        auto_transition: !args.no_transition,
        rejection: rejection.then(|| RejectionDetails {
            loss_reason_id: args.loss_reason,
            notes: args.notes.clone(),
            future_possibility: args.future,
            future_contact_date: args.recontact_on,
        }),
        ..CommentRequest::new(args.lead, comment_type, &args.text, &actor)
    };

    let outcome = session.engine.create_comment(&mut session.conn, &request)?;

    render(output, &outcome, |o, w| {
        writeln!(
            w,
            "✓ Comment {} ({}) filed on lead {}",
            o.comment.id, o.comment.comment_type, o.comment.lead_id
        )?;
        if let Some(ref t) = o.transition {
            let note = if t.audit.is_some() { "" } else { " (audit deduplicated)" };
            writeln!(w, "  state: {} -> {}{note}", t.from, t.to)?;
        }
        if let Some(ref f) = o.follow_up {
            writeln!(w, "  loss recorded: {}", f.loss_reason)?;
        }
        if let Some(ref r) = o.reminder {
            writeln!(w, "  reminder: {} for {}", stamp(r.fire_at), r.recipient)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_validation() {
        assert!(validate_comment_body("Called, left voicemail").is_ok());
        assert!(validate_comment_body("line one\nline two").is_ok());
        assert!(validate_comment_body("   ").is_err());
        assert!(validate_comment_body("bell\u{7}").is_err());
        let long = "x".repeat(MAX_COMMENT_BODY_CHARS + 1);
        let err = validate_comment_body(&long).expect_err("too long");
        assert_eq!(err.code().code(), "E3004");
    }
}
