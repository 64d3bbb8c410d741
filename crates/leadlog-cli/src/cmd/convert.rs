//! `leadlog convert`: close a lead as won and freeze it as a client.

use crate::output::{OutputMode, render};
use crate::project::Project;
use clap::Args;
use leadlog_core::model::LeadId;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Lead ID.
    pub lead: LeadId,
}

pub fn run_convert(
    args: &ConvertArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project: &Project,
) -> anyhow::Result<()> {
    let mut session = project.open()?;
    let actor = session.actor(actor_flag)?;
    let lead = session
        .engine
        .convert_to_client(&mut session.conn, args.lead, &actor)?;

    render(output, &lead, |lead, w| {
        writeln!(w, "✓ Lead {} ({}) converted to client; further edits are refused", lead.id, lead.name)
    })
}
