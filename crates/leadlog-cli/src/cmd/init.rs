use crate::output::{OutputMode, pretty_kv, render};
use crate::project::Project;
use anyhow::{Context as _, Result};
use clap::Args;
use leadlog_core::config::{EngineConfig, PROJECT_DIR};
use leadlog_core::db::{self, migrations};
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `.leadlog/config.toml` with defaults.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    database: String,
    config: String,
    schema_version: u32,
    wrote_config: bool,
}

/// Execute `leadlog init`. Creates the project skeleton:
///
/// ```text
/// .leadlog/
///   leadlog.db    (migrated schema with seeded states and loss reasons)
///   config.toml   (engine defaults)
/// ```
///
/// Re-running is safe: the database is migrated in place and an existing
/// config is left alone unless `--force` is set.
///
/// # Errors
///
/// Returns an error if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project: &Project) -> Result<()> {
    let project_dir = project.root.join(PROJECT_DIR);
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("Failed to create {}", project_dir.display()))?;

    let config_path = project_dir.join("config.toml");
    let wrote_config = args.force || !config_path.exists();
    if wrote_config {
        let body = toml::to_string_pretty(&EngineConfig::default())
            .context("Failed to encode default config")?;
        std::fs::write(&config_path, body)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    }

    let conn = db::open_database(&project.db_path)?;
    let schema_version = migrations::current_schema_version(&conn)?;

    let result = InitOutput {
        ok: true,
        database: project.db_path.display().to_string(),
        config: config_path.display().to_string(),
        schema_version,
        wrote_config,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Initialized lead database.")?;
        pretty_kv(w, "Database", &r.database)?;
        pretty_kv(w, "Config", &r.config)?;
        pretty_kv(w, "Schema", r.schema_version.to_string())?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  export LEADLOG_ACTOR=your-name")?;
        writeln!(w, "  leadlog lead add \"Acme Corp\"")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_keeps_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        let project = Project::locate(dir.path(), None);

        run_init(&InitArgs { force: false }, OutputMode::Json, &project).expect("first init");
        let config_path = dir.path().join(PROJECT_DIR).join("config.toml");
        std::fs::write(&config_path, "[dedup]\nwindow_secs = 30\n").expect("edit config");

        run_init(&InitArgs { force: false }, OutputMode::Json, &project).expect("second init");
        let kept = std::fs::read_to_string(&config_path).expect("read config");
        assert!(kept.contains("window_secs = 30"));

        run_init(&InitArgs { force: true }, OutputMode::Json, &project).expect("forced init");
        let reset = std::fs::read_to_string(&config_path).expect("read config");
        assert!(reset.contains("window_secs = 300"));
        assert!(project.db_path.exists());
    }
}
