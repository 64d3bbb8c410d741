//! Actor identity resolution for CLI commands.
//!
//! The resolution chain: `--actor` flag > `LEADLOG_ACTOR` env > user config
//! `actor` > `USER` env (TTY only). Mutating commands require an actor; read-only
//! commands work without one.

use crate::output::CliFailure;
use std::env;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

/// Real environment reader.
struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_actor_with(
    cli_flag: Option<&str>,
    config_actor: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(actor) = cli_flag.map(str::trim).filter(|a| !a.is_empty()) {
        return Some(actor.to_string());
    }

    if let Some(val) = env.get("LEADLOG_ACTOR") {
        return Some(val.trim().to_string());
    }

    if let Some(actor) = config_actor.map(str::trim).filter(|a| !a.is_empty()) {
        return Some(actor.to_string());
    }

    if env.is_tty() {
        return env.get("USER");
    }

    None
}

/// Resolve the actor recorded on audit entries, or fail for mutating commands.
///
/// # Errors
///
/// Returns a [`CliFailure`] with code `missing_actor` if nothing resolves.
pub fn require_actor(cli_flag: Option<&str>, config_actor: Option<&str>) -> Result<String, CliFailure> {
    resolve_actor_with(cli_flag, config_actor, &RealEnv).ok_or_else(|| CliFailure {
        message: "an actor is required for this command".to_string(),
        suggestion: Some("Pass --actor, set LEADLOG_ACTOR, or add `actor` to the user config."),
        code: "missing_actor",
    })
}
