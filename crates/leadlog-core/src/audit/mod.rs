//! Append-only audit log.
//!
//! Every state-affecting write records an entry keyed by an [`EntityRef`].
//! Entries store their payloads as raw JSON text; see [`payload`] for the
//! typed view and [`store`] for reads and writes.

pub mod payload;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::{AuditEntryId, EntityRef, ParseEnumError};

pub use payload::{AuditPayload, PayloadError, StateChangePayload, StateKey, UNKNOWN_STATE};
pub use store::{AuditFilter, AuditOrder};

/// Kind of change an entry records. This engine only writes `Update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ParseEnumError {
                expected: "audit action",
                got: s.to_string(),
            }),
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub entity: EntityRef,
    pub action: AuditAction,
    pub actor: String,
    /// Raw "before" payload text, if one was recorded.
    pub before: Option<String>,
    /// Raw "after" payload text.
    pub after: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Parse the "after" payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the stored text cannot be read.
    pub fn after_payload(&self) -> Result<AuditPayload, PayloadError> {
        AuditPayload::parse(&self.after)
    }

    /// Parse the "before" payload, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the stored text cannot be read.
    pub fn before_payload(&self) -> Result<Option<AuditPayload>, PayloadError> {
        self.before.as_deref().map(AuditPayload::parse).transpose()
    }
}

/// An entry about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub entity: EntityRef,
    pub action: AuditAction,
    pub actor: String,
    pub before: Option<String>,
    pub after: String,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    /// Build an `UPDATE` entry from typed payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if either payload fails to serialize.
    pub fn update(
        entity: EntityRef,
        actor: &str,
        before: Option<&AuditPayload>,
        after: &AuditPayload,
        created_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            entity,
            action: AuditAction::Update,
            actor: actor.to_string(),
            before: before.map(AuditPayload::to_json).transpose()?,
            after: after.to_json()?,
            created_at,
        })
    }

    /// The stored form of this entry once it has been assigned `id`.
    #[must_use]
    pub fn into_stored(self, id: AuditEntryId) -> AuditEntry {
        AuditEntry {
            id,
            entity: self.entity,
            action: self.action,
            actor: self.actor,
            before: self.before,
            after: self.after,
            created_at: self.created_at,
        }
    }
}
