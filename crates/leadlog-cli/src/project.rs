//! Locating the lead database and assembling an engine for one command.

use crate::actor;
use crate::output::CliFailure;
use anyhow::Context as _;
use leadlog_core::Engine;
use leadlog_core::ErrorCode;
use leadlog_core::config::{self, PROJECT_DIR, UserConfig};
use leadlog_core::db::{self, DATABASE_FILE};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a command reads config from and which database it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub root: PathBuf,
    pub db_path: PathBuf,
}

impl Project {
    /// `--db` wins; otherwise walk up from `cwd` looking for `.leadlog/`.
    /// Falls back to `cwd` so `init` has somewhere to write.
    pub fn locate(cwd: &Path, db_flag: Option<&Path>) -> Self {
        if let Some(db_path) = db_flag {
            return Self {
                root: cwd.to_path_buf(),
                db_path: db_path.to_path_buf(),
            };
        }
        let root = find_project_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
        let db_path = root.join(PROJECT_DIR).join(DATABASE_FILE);
        Self { root, db_path }
    }

    /// Open the database and build an engine from the project config.
    ///
    /// # Errors
    ///
    /// Fails with `E1001` if the database does not exist yet, `E1002` if the
    /// project config does not parse, or with the underlying open/migrate error.
    pub fn open(&self) -> anyhow::Result<Session> {
        let conn = db::try_open_database(&self.db_path)?.ok_or_else(|| CliFailure {
            message: format!("lead database not found at {}", self.db_path.display()),
            suggestion: ErrorCode::NotInitialized.hint(),
            code: ErrorCode::NotInitialized.code(),
        })?;

        let engine_config = config::load_engine_config(&self.root).map_err(|err| CliFailure {
            message: format!("{err:#}"),
            suggestion: ErrorCode::ConfigParseError.hint(),
            code: ErrorCode::ConfigParseError.code(),
        })?;
        let user = config::load_user_config().context("load user config")?;

        debug!(db = %self.db_path.display(), "opened lead database");
        Ok(Session {
            conn,
            engine: Engine::with_system_clock(engine_config),
            user,
        })
    }
}

/// An open database plus the engine and user settings for one command.
pub struct Session {
    pub conn: Connection,
    pub engine: Engine,
    pub user: UserConfig,
}

impl Session {
    /// Actor for mutating commands.
    ///
    /// # Errors
    ///
    /// Returns `missing_actor` if no identity resolves.
    pub fn actor(&self, actor_flag: Option<&str>) -> Result<String, CliFailure> {
        actor::require_actor(actor_flag, self.user.actor.as_deref())
    }
}

fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_up_to_the_project_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(PROJECT_DIR)).expect("project dir");
        let nested = dir.path().join("deals").join("q3");
        std::fs::create_dir_all(&nested).expect("nested dir");

        let project = Project::locate(&nested, None);
        assert_eq!(project.root, dir.path());
        assert_eq!(
            project.db_path,
            dir.path().join(PROJECT_DIR).join(DATABASE_FILE)
        );
    }

    #[test]
    fn db_flag_overrides_discovery() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = dir.path().join("elsewhere.db");
        let project = Project::locate(dir.path(), Some(&db));
        assert_eq!(project.db_path, db);
    }

    #[test]
    fn opening_a_missing_database_is_not_initialized() {
        let dir = tempfile::tempdir().expect("temp dir");
        let project = Project::locate(dir.path(), None);
        let err = project.open().err().expect("missing db");
        let failure = err.downcast_ref::<CliFailure>().expect("cli failure");
        assert_eq!(failure.code, "E1001");
    }
}
