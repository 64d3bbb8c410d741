#![forbid(unsafe_code)]

mod actor;
mod cmd;
mod output;
mod project;

use clap::{CommandFactory, Parser, Subcommand};
use leadlog_core::config;
use output::{CliError, OutputMode, render_error};
use project::Project;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "leadlog: lead lifecycle audit and transition engine",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides FORMAT and the user config).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Actor recorded on audit entries (else LEADLOG_ACTOR, else user config).
    #[arg(long, global = true)]
    actor: Option<String>,

    /// Lead database path (else `.leadlog/leadlog.db` found from the cwd upward).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags, env, and user config.
    fn output_mode(&self, project: &Project) -> OutputMode {
        if let Some(mode) = self.format {
            return mode;
        }
        if self.json {
            return OutputMode::Json;
        }
        config::resolve_config(&project.root, false)
            .map_or(OutputMode::Pretty, |cfg| OutputMode::from_resolved(&cfg.resolved_output))
    }

    fn actor_flag(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create the lead database and default config",
        after_help = "EXAMPLES:\n    leadlog init\n    leadlog init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(next_help_heading = "Leads", about = "Add, show, and list leads")]
    Lead(cmd::lead::LeadArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "File a typed comment and run its workflow",
        long_about = "File a comment on a lead. The comment type decides the follow-on work: \
                      moving the lead, scheduling a reminder, or running the rejection workflow.",
        after_help = "EXAMPLES:\n    leadlog comment 12 \"Initial contact\" \"Intro call went well\" --remind\n\n    leadlog comment 12 \"Lead rejection\" \"No budget\" --loss-reason 1 --future maybe --recontact-on 2025-01-15"
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Mark a lead lost and record why",
        after_help = "EXAMPLES:\n    leadlog reject 12 --loss-reason 4 --notes \"Went with a competitor\""
    )]
    Reject(cmd::reject::RejectArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Move a lead to a state explicitly",
        after_help = "EXAMPLES:\n    leadlog move 12 qualified --reason \"budget confirmed\""
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Convert a lead to a client (closes it as won and freezes it)",
        after_help = "EXAMPLES:\n    leadlog convert 12"
    )]
    Convert(cmd::convert::ConvertArgs),

    #[command(
        next_help_heading = "Read",
        about = "Replay a lead's state history",
        after_help = "EXAMPLES:\n    leadlog history 12\n    leadlog history 12 --dwell --json"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show a lead's raw audit trail",
        after_help = "EXAMPLES:\n    leadlog audit 12 --newest-first --limit 10"
    )]
    Audit(cmd::audit::AuditArgs),

    #[command(next_help_heading = "Read", about = "List loss reasons")]
    Reasons,

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    leadlog completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LEADLOG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "leadlog=debug,info"
        } else {
            "leadlog=warn,warn"
        })
    });

    let format = env::var("LEADLOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode, project: &Project) -> anyhow::Result<()> {
    let actor = cli.actor_flag();
    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, project),
        Commands::Lead(ref args) => cmd::lead::run_lead(args, output, project),
        Commands::Comment(ref args) => cmd::comment::run_comment(args, actor, output, project),
        Commands::Reject(ref args) => cmd::reject::run_reject(args, actor, output, project),
        Commands::Move(ref args) => cmd::move_cmd::run_move(args, actor, output, project),
        Commands::Convert(ref args) => cmd::convert::run_convert(args, actor, output, project),
        Commands::History(ref args) => cmd::history::run_history(args, output, project),
        Commands::Audit(ref args) => cmd::audit::run_audit(args, output, project),
        Commands::Reasons => cmd::reasons::run_reasons(output, project),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("error: cannot read current directory: {err}");
            return ExitCode::FAILURE;
        }
    };
    let project = Project::locate(&cwd, cli.db.as_deref());
    let output = cli.output_mode(&project);
    debug!(root = %project.root.display(), db = %project.db_path.display(), "resolved project");

    match run(cli, output, &project) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if render_error(output, &CliError::from_anyhow(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
