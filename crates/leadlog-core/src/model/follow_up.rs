use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{CommentId, FollowUpId, LeadId, LossReasonId, ParseEnumError};

/// Entry in the seeded loss-reason catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LossReason {
    pub id: LossReasonId,
    pub name: String,
}

/// Agent's estimate of whether a lost lead is worth re-contacting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuturePossibility {
    #[default]
    No,
    Maybe,
    Yes,
}

impl FuturePossibility {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Maybe => "maybe",
            Self::Yes => "yes",
        }
    }

    /// `maybe` and `yes` both warrant a re-contact prompt.
    #[must_use]
    pub const fn indicates_recontact(self) -> bool {
        matches!(self, Self::Maybe | Self::Yes)
    }
}

impl fmt::Display for FuturePossibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuturePossibility {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" | "none" => Ok(Self::No),
            "maybe" | "possible" => Ok(Self::Maybe),
            "yes" | "likely" => Ok(Self::Yes),
            _ => Err(ParseEnumError {
                expected: "future possibility",
                got: s.to_string(),
            }),
        }
    }
}

/// Record of one rejection event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LossFollowUp {
    pub id: FollowUpId,
    pub lead_id: LeadId,
    pub loss_reason_id: LossReasonId,
    pub loss_reason: String,
    pub notes: Option<String>,
    pub future_possibility: FuturePossibility,
    pub recontact_on: Option<NaiveDate>,
    pub comment_id: Option<CommentId>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}
