//! The lead lifecycle engine.
//!
//! [`Engine`] bundles the configuration, clock, dedup guard, and transition
//! table that every write path needs. Public operations take a
//! `&mut Connection` and run inside one SQLite transaction; the `*_in`
//! variants take a `&Connection` (usually a `Transaction`) so workflows can
//! compose them inside a single unit of work.

pub mod dispatch;
pub mod rejection;
pub mod state_machine;

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::dedup::DedupGuard;
use crate::transition::{TableError, TransitionTable};

pub use dispatch::{ActionTaken, CommentOutcome, CommentRequest, RejectionDetails, ReminderRequest};
pub use rejection::{RejectionOutcome, RejectionRequest};
pub use state_machine::{AppliedTransition, TransitionReason};

pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) dedup: DedupGuard,
    pub(crate) table: TransitionTable,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let dedup = DedupGuard::from_config(&config.dedup);
        Self {
            config,
            clock,
            dedup,
            table: TransitionTable::standard(),
        }
    }

    #[must_use]
    pub fn with_system_clock(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    /// Swap in a custom transition table.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] if the table fails its self-check.
    pub fn with_table(mut self, table: TransitionTable) -> Result<Self, TableError> {
        table.validate()?;
        self.table = table;
        Ok(self)
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn table(&self) -> &TransitionTable {
        &self.table
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Engine;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).single().expect("valid t0")
    }

    pub fn engine_at(start: DateTime<Utc>) -> (Engine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let engine = Engine::new(EngineConfig::default(), clock.clone());
        (engine, clock)
    }
}
