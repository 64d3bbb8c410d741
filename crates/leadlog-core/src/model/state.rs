use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;

/// Pipeline bucket a state belongs to.
///
/// Everything except [`StateCategory::Ordinary`] is excluded from the active
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    Ordinary,
    Recontact,
    FinalNegative,
    FinalPositive,
}

impl StateCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::Recontact => "recontact",
            Self::FinalNegative => "final_negative",
            Self::FinalPositive => "final_positive",
        }
    }

    #[must_use]
    pub const fn is_active_pipeline(self) -> bool {
        matches!(self, Self::Ordinary)
    }
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification state of a lead.
///
/// Numeric ids are stable: they are persisted in `leads.state_id` and inside
/// audit payloads, so existing ids must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadState {
    New,
    Pending,
    Contacted,
    Qualified,
    Negotiation,
    ProposalSent,
    OnHold,
    Recontact,
    Lost,
    Won,
}

impl LeadState {
    /// All states in catalog order.
    pub const ALL: [Self; 10] = [
        Self::New,
        Self::Pending,
        Self::Contacted,
        Self::Qualified,
        Self::Negotiation,
        Self::ProposalSent,
        Self::OnHold,
        Self::Recontact,
        Self::Lost,
        Self::Won,
    ];

    #[must_use]
    pub const fn id(self) -> i64 {
        match self {
            Self::New => 1,
            Self::Pending => 2,
            Self::Contacted => 3,
            Self::Qualified => 4,
            Self::Negotiation => 5,
            Self::ProposalSent => 6,
            Self::OnHold => 7,
            Self::Recontact => 8,
            Self::Lost => 9,
            Self::Won => 10,
        }
    }

    #[must_use]
    pub const fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::New),
            2 => Some(Self::Pending),
            3 => Some(Self::Contacted),
            4 => Some(Self::Qualified),
            5 => Some(Self::Negotiation),
            6 => Some(Self::ProposalSent),
            7 => Some(Self::OnHold),
            8 => Some(Self::Recontact),
            9 => Some(Self::Lost),
            10 => Some(Self::Won),
            _ => None,
        }
    }

    /// Machine key, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Negotiation => "negotiation",
            Self::ProposalSent => "proposal_sent",
            Self::OnHold => "on_hold",
            Self::Recontact => "recontact",
            Self::Lost => "lost",
            Self::Won => "won",
        }
    }

    /// Human-readable name, as embedded in audit payloads.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Pending => "Pending",
            Self::Contacted => "Contacted",
            Self::Qualified => "Qualified",
            Self::Negotiation => "Negotiation",
            Self::ProposalSent => "Proposal Sent",
            Self::OnHold => "On Hold",
            Self::Recontact => "Recontact",
            Self::Lost => "Lost",
            Self::Won => "Won",
        }
    }

    #[must_use]
    pub const fn category(self) -> StateCategory {
        match self {
            Self::Recontact => StateCategory::Recontact,
            Self::Lost => StateCategory::FinalNegative,
            Self::Won => StateCategory::FinalPositive,
            _ => StateCategory::Ordinary,
        }
    }

    /// Whether a lead in this state has not been worked yet.
    #[must_use]
    pub const fn is_fresh(self) -> bool {
        matches!(self, Self::New | Self::Pending)
    }

    /// Validate whether a move from `self` to `target` is allowed.
    ///
    /// Identity (no-op), leaving a `final_positive` state, and jumping from
    /// one final category straight to the other are refused. `Lost` leads may
    /// still be reopened into the pipeline or `Recontact`.
    ///
    /// # Errors
    ///
    /// Returns the reason the move is refused.
    pub const fn can_transition_to(self, target: Self) -> Result<(), &'static str> {
        if self.id() == target.id() {
            return Err("no-op transition");
        }
        match (self.category(), target.category()) {
            (StateCategory::FinalPositive, _) => Err("won leads cannot re-enter the pipeline"),
            (StateCategory::FinalNegative, StateCategory::FinalPositive) => {
                Err("lost leads must be reopened before they can be won")
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LeadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LeadState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|state| {
                state.as_str().eq_ignore_ascii_case(needle)
                    || state.name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| ParseEnumError {
                expected: "lead state",
                got: s.to_string(),
            })
    }
}

impl ToSql for LeadState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.id()))
    }
}

impl FromSql for LeadState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let id = i64::column_result(value)?;
        Self::from_id(id).ok_or(FromSqlError::OutOfRange(id))
    }
}

#[cfg(test)]
mod tests {
    use super::{LeadState, StateCategory};
    use std::collections::HashSet;

    #[test]
    fn ids_round_trip_and_are_unique() {
        let mut seen = HashSet::new();
        for state in LeadState::ALL {
            assert!(seen.insert(state.id()), "duplicate id for {state}");
            assert_eq!(LeadState::from_id(state.id()), Some(state));
        }
        assert_eq!(LeadState::from_id(0), None);
        assert_eq!(LeadState::from_id(999), None);
    }

    #[test]
    fn parse_accepts_key_and_display_name() {
        assert_eq!("proposal_sent".parse::<LeadState>(), Ok(LeadState::ProposalSent));
        assert_eq!("Proposal Sent".parse::<LeadState>(), Ok(LeadState::ProposalSent));
        assert_eq!("ON HOLD".parse::<LeadState>(), Ok(LeadState::OnHold));
        assert!("archived".parse::<LeadState>().is_err());
    }

    #[test]
    fn categories_filter_active_pipeline() {
        let active: Vec<_> = LeadState::ALL
            .into_iter()
            .filter(|s| s.category().is_active_pipeline())
            .collect();
        assert!(!active.contains(&LeadState::Lost));
        assert!(!active.contains(&LeadState::Won));
        assert!(!active.contains(&LeadState::Recontact));
        assert!(active.contains(&LeadState::Negotiation));
        assert_eq!(LeadState::Lost.category(), StateCategory::FinalNegative);
    }

    #[test]
    fn final_states_do_not_cross() {
        assert!(LeadState::Won.can_transition_to(LeadState::Lost).is_err());
        assert!(LeadState::Won.can_transition_to(LeadState::Negotiation).is_err());
        assert!(LeadState::Lost.can_transition_to(LeadState::Won).is_err());
        assert!(LeadState::Lost.can_transition_to(LeadState::Recontact).is_ok());
        assert!(LeadState::Lost.can_transition_to(LeadState::Contacted).is_ok());
        assert!(LeadState::Negotiation.can_transition_to(LeadState::Won).is_ok());
        assert!(LeadState::Negotiation.can_transition_to(LeadState::Lost).is_ok());
    }

    #[test]
    fn fresh_states() {
        assert!(LeadState::New.is_fresh());
        assert!(LeadState::Pending.is_fresh());
        assert!(!LeadState::Contacted.is_fresh());
    }

    #[test]
    fn transition_rules() {
        assert!(LeadState::New.can_transition_to(LeadState::New).is_err());
        assert!(LeadState::Won.can_transition_to(LeadState::Contacted).is_err());
        assert!(LeadState::Lost.can_transition_to(LeadState::Contacted).is_ok());
        assert!(LeadState::Negotiation.can_transition_to(LeadState::Won).is_ok());
    }
}
