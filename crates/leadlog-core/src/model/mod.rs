//! Typed domain records for the lead lifecycle engine.

pub mod comment;
pub mod entity;
pub mod follow_up;
pub mod lead;
pub mod notification;
pub mod state;

pub use comment::{Comment, CommentType};
pub use entity::{EntityKind, EntityRef};
pub use follow_up::{FuturePossibility, LossFollowUp, LossReason};
pub use lead::Lead;
pub use notification::{Notification, NotificationKind, Priority};
pub use state::{LeadState, StateCategory};

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self).map_err(|_| ParseEnumError {
                    expected: stringify!($name),
                    got: s.to_string(),
                })
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

row_id!(
    /// Row id of a lead.
    LeadId
);
row_id!(
    /// Row id of a comment.
    CommentId
);
row_id!(
    /// Row id of an audit entry.
    AuditEntryId
);
row_id!(
    /// Row id of a scheduled notification.
    NotificationId
);
row_id!(
    /// Row id of a loss follow-up record.
    FollowUpId
);
row_id!(
    /// Row id of a loss reason in the seeded catalog.
    LossReasonId
);

#[cfg(test)]
mod tests {
    use super::{LeadId, LossReasonId};

    #[test]
    fn row_ids_parse_and_display() {
        let id: LeadId = " 42 ".parse().expect("parse lead id");
        assert_eq!(id, LeadId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<LossReasonId>().is_err());
    }

    #[test]
    fn row_ids_serialize_transparently() {
        let json = serde_json::to_string(&LeadId(7)).expect("serialize");
        assert_eq!(json, "7");
    }
}
