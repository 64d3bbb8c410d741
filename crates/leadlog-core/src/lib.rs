//! leadlog-core library.
//!
//! The lead lifecycle engine: an append-only audit store, a duplicate guard
//! in front of it, the comment-type transition table, the lead state machine
//! with its comment and rejection workflows, and the history reconstructor
//! that replays the audit log into state-to-state transitions.

pub mod audit;
pub mod clock;
pub mod config;
pub mod db;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod transition;

pub use engine::Engine;
pub use error::{ErrorCode, ErrorKind, LeadError};

/// # Conventions
///
/// - **Errors**: library operations return [`error::Result`]; bootstrap code
///   (opening databases, loading config) uses `anyhow::Result`.
/// - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
pub fn init() {
    tracing::info!("leadlog-core initialized");
}
