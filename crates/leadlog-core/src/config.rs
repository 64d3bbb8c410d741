use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::model::Priority;

/// Directory (relative to the project root) holding the database and config.
pub const PROJECT_DIR: &str = ".leadlog";

/// Engine tuning loaded from `.leadlog/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// How far back an identical state-change entry suppresses a new one.
    #[serde(default = "default_dedup_window_secs")]
    pub window_secs: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: default_dedup_window_secs(),
        }
    }
}

impl DedupConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(i64::from(self.window_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Minimum gap between the last change and now before a trailing
    /// "(current)" segment is emitted.
    #[serde(default = "default_min_trailing_gap_secs")]
    pub min_trailing_gap_secs: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_trailing_gap_secs: default_min_trailing_gap_secs(),
        }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn min_trailing_gap(&self) -> Duration {
        Duration::seconds(i64::from(self.min_trailing_gap_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default)]
    pub default_priority: Priority,
    #[serde(default = "default_recontact_priority")]
    pub recontact_priority: Priority,
    /// Hour of day (UTC) re-contact notifications fire on their date.
    #[serde(default = "default_recontact_hour_utc")]
    pub recontact_hour_utc: u32,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            default_priority: Priority::default(),
            recontact_priority: default_recontact_priority(),
            recontact_hour_utc: default_recontact_hour_utc(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Actor recorded on audit entries when no `--actor` flag or env is set.
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub engine: EngineConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.leadlog/config.toml` under `project_root`, falling back to defaults
/// when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_engine_config(project_root: &Path) -> Result<EngineConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("leadlog/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project, user, and environment settings.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or malformed.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let engine = load_engine_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        engine,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_dedup_window_secs() -> u32 {
    300
}

const fn default_min_trailing_gap_secs() -> u32 {
    60
}

const fn default_recontact_priority() -> Priority {
    Priority::High
}

const fn default_recontact_hour_utc() -> u32 {
    9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_engine_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.dedup.window_secs, 300);
        assert_eq!(cfg.dedup.window(), Duration::minutes(5));
        assert_eq!(cfg.history.min_trailing_gap(), Duration::minutes(1));
        assert_eq!(cfg.reminders.default_priority, Priority::Normal);
        assert_eq!(cfg.reminders.recontact_priority, Priority::High);
        assert_eq!(cfg.reminders.recontact_hour_utc, 9);
    }

    #[test]
    fn partial_project_config_keeps_other_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let dir = root.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).expect("create project dir");
        std::fs::write(
            dir.join("config.toml"),
            "[dedup]\nwindow_secs = 30\n\n[reminders]\nrecontact_priority = \"urgent\"\n",
        )
        .expect("write config");

        let cfg = load_engine_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.dedup.window_secs, 30);
        assert_eq!(cfg.history.min_trailing_gap_secs, 60);
        assert_eq!(cfg.reminders.recontact_priority, Priority::Urgent);
        assert_eq!(cfg.reminders.default_priority, Priority::Normal);
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = tempfile::tempdir().expect("temp dir");
        let dir = root.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).expect("create project dir");
        std::fs::write(dir.join("config.toml"), "[dedup\nwindow_secs = ").expect("write config");

        let err = load_engine_config(root.path()).expect_err("parse must fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn legacy_aliases_are_normalized() {
        assert_eq!(resolve_output(false, Some("table"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("human"), Some("table")), "text");
    }

    #[test]
    fn user_config_parses_actor() {
        let cfg: UserConfig =
            toml::from_str("output = \"json\"\nactor = \"maria\"\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.actor.as_deref(), Some("maria"));
    }
}
