//! `leadlog reasons`: the loss-reason catalog used by rejections.

use crate::output::{OutputMode, render_mode};
use crate::project::Project;
use leadlog_core::db::follow_ups;
use std::io::Write;

pub fn run_reasons(output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let session = project.open()?;
    let reasons = follow_ups::list_loss_reasons(&session.conn)?;
    render_mode(
        output,
        &reasons,
        |reasons, w| {
            for r in reasons {
                writeln!(w, "{}\t{}", r.id, r.name)?;
            }
            Ok(())
        },
        |reasons, w| {
            writeln!(w, "{:>3}  LOSS REASON", "ID")?;
            for r in reasons {
                writeln!(w, "{:>3}  {}", r.id.0, r.name)?;
            }
            Ok(())
        },
    )
}
