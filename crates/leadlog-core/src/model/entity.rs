//! Typed references into the generic audit store.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{CommentId, LeadId, ParseEnumError};

/// Record families the audit store and notifications can point at.
///
/// The string form is the table name stored in `audit_entries.entity_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Leads,
    Comments,
    LossFollowUps,
    Notifications,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Comments => "comments",
            Self::LossFollowUps => "loss_follow_ups",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leads" => Ok(Self::Leads),
            "comments" => Ok(Self::Comments),
            "loss_follow_ups" => Ok(Self::LossFollowUps),
            "notifications" => Ok(Self::Notifications),
            _ => Err(ParseEnumError {
                expected: "entity kind",
                got: s.to_string(),
            }),
        }
    }
}

/// `{kind, id}` pair identifying one record anywhere in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    #[must_use]
    pub const fn lead(id: LeadId) -> Self {
        Self {
            kind: EntityKind::Leads,
            id: id.0,
        }
    }

    #[must_use]
    pub const fn comment(id: CommentId) -> Self {
        Self {
            kind: EntityKind::Comments,
            id: id.0,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
