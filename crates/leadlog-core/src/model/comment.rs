use chrono::{DateTime, Utc};
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{CommentId, LeadId, ParseEnumError};

/// Category an agent picks when filing a comment on a lead.
///
/// What each type implies (target state, reminder policy) lives in
/// [`crate::transition::TransitionTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    GeneralNote,
    InitialContact,
    LeadFollowUp,
    Negotiation,
    ProposalSent,
    TemporaryPause,
    LeadRejection,
    CallScheduled,
}

impl CommentType {
    pub const ALL: [Self; 8] = [
        Self::GeneralNote,
        Self::InitialContact,
        Self::LeadFollowUp,
        Self::Negotiation,
        Self::ProposalSent,
        Self::TemporaryPause,
        Self::LeadRejection,
        Self::CallScheduled,
    ];

    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::GeneralNote => 1,
            Self::InitialContact => 2,
            Self::LeadFollowUp => 3,
            Self::Negotiation => 4,
            Self::ProposalSent => 5,
            Self::TemporaryPause => 6,
            Self::LeadRejection => 7,
            Self::CallScheduled => 8,
        }
    }

    #[must_use]
    pub const fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::GeneralNote),
            2 => Some(Self::InitialContact),
            3 => Some(Self::LeadFollowUp),
            4 => Some(Self::Negotiation),
            5 => Some(Self::ProposalSent),
            6 => Some(Self::TemporaryPause),
            7 => Some(Self::LeadRejection),
            8 => Some(Self::CallScheduled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GeneralNote => "general_note",
            Self::InitialContact => "initial_contact",
            Self::LeadFollowUp => "lead_follow_up",
            Self::Negotiation => "negotiation",
            Self::ProposalSent => "proposal_sent",
            Self::TemporaryPause => "temporary_pause",
            Self::LeadRejection => "lead_rejection",
            Self::CallScheduled => "call_scheduled",
        }
    }

    /// Display name shown to agents and used as the automatic transition reason.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GeneralNote => "General note",
            Self::InitialContact => "Initial contact",
            Self::LeadFollowUp => "Lead follow-up",
            Self::Negotiation => "Negotiation",
            Self::ProposalSent => "Proposal sent",
            Self::TemporaryPause => "Temporary pause",
            Self::LeadRejection => "Lead rejection",
            Self::CallScheduled => "Call scheduled",
        }
    }
}

impl fmt::Display for CommentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        if let Ok(id) = needle.parse::<i64>() {
            if let Some(kind) = Self::from_id(id) {
                return Ok(kind);
            }
        }
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(needle)
                    || kind.name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| ParseEnumError {
                expected: "comment type",
                got: s.to_string(),
            })
    }
}

impl ToSql for CommentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.id()))
    }
}

impl FromSql for CommentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let id = i64::column_result(value)?;
        Self::from_id(id).ok_or(FromSqlError::OutOfRange(id))
    }
}

/// An agent-authored note on a lead. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub lead_id: LeadId,
    pub comment_type: CommentType,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::CommentType;

    #[test]
    fn parse_by_name_key_or_id() {
        assert_eq!("Initial contact".parse::<CommentType>(), Ok(CommentType::InitialContact));
        assert_eq!("lead_rejection".parse::<CommentType>(), Ok(CommentType::LeadRejection));
        assert_eq!("LEAD FOLLOW-UP".parse::<CommentType>(), Ok(CommentType::LeadFollowUp));
        assert_eq!("6".parse::<CommentType>(), Ok(CommentType::TemporaryPause));
        assert!("Invoice sent".parse::<CommentType>().is_err());
        assert!("42".parse::<CommentType>().is_err());
    }

    #[test]
    fn ids_round_trip() {
        for kind in CommentType::ALL {
            assert_eq!(CommentType::from_id(kind.id()), Some(kind));
        }
    }
}
