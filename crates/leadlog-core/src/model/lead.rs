use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{LeadId, LeadState};

/// A prospect record as the engine sees it.
///
/// Only the fields the lifecycle engine reads or writes are modelled; the
/// rest of the CRM row (contact data, addresses, owners) lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub state: LeadState,
    /// Once set the lead is frozen: no comments, moves, or audit writes.
    pub is_client: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

impl Lead {
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.is_client
    }
}
