//! Comment-type workflow table.
//!
//! Maps each [`CommentType`] to what filing it implies: the lead state it
//! moves the lead into (if any), whether a follow-up reminder may be
//! attached, and whether it starts the rejection workflow.

use std::collections::HashSet;

use crate::error::{LeadError, Result};
use crate::model::{CommentType, LeadState, StateCategory};

/// What a comment type does when filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowDescriptor {
    pub triggers_state: Option<LeadState>,
    pub allows_reminder: bool,
    pub is_rejection: bool,
    /// Reminder offset used when the caller does not pick one.
    pub default_reminder_days: Option<u32>,
}

impl WorkflowDescriptor {
    /// Plain note: no transition, reminder allowed after three days.
    pub const NOTE: Self = Self {
        triggers_state: None,
        allows_reminder: true,
        is_rejection: false,
        default_reminder_days: Some(3),
    };

    const fn moves_to(state: LeadState, reminder_days: u32) -> Self {
        Self {
            triggers_state: Some(state),
            allows_reminder: true,
            is_rejection: false,
            default_reminder_days: Some(reminder_days),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub comment_type: CommentType,
    pub workflow: WorkflowDescriptor,
}

const STANDARD_RULES: [TransitionRule; 8] = [
    TransitionRule {
        comment_type: CommentType::GeneralNote,
        workflow: WorkflowDescriptor::NOTE,
    },
    TransitionRule {
        comment_type: CommentType::InitialContact,
        workflow: WorkflowDescriptor::moves_to(LeadState::Contacted, 2),
    },
    TransitionRule {
        comment_type: CommentType::LeadFollowUp,
        workflow: WorkflowDescriptor::moves_to(LeadState::Qualified, 3),
    },
    TransitionRule {
        comment_type: CommentType::Negotiation,
        workflow: WorkflowDescriptor::moves_to(LeadState::Negotiation, 5),
    },
    TransitionRule {
        comment_type: CommentType::ProposalSent,
        workflow: WorkflowDescriptor::moves_to(LeadState::ProposalSent, 7),
    },
    TransitionRule {
        comment_type: CommentType::TemporaryPause,
        workflow: WorkflowDescriptor::moves_to(LeadState::OnHold, 30),
    },
    TransitionRule {
        comment_type: CommentType::LeadRejection,
        workflow: WorkflowDescriptor {
            triggers_state: Some(LeadState::Lost),
            allows_reminder: false,
            is_rejection: true,
            default_reminder_days: None,
        },
    },
    TransitionRule {
        comment_type: CommentType::CallScheduled,
        workflow: WorkflowDescriptor {
            default_reminder_days: Some(1),
            ..WorkflowDescriptor::NOTE
        },
    },
];

/// Problems found by [`TransitionTable::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("comment type '{0}' has more than one rule")]
    DuplicateRule(CommentType),
    #[error("expected exactly one rejection type, found {0}")]
    RejectionCount(usize),
    #[error("rejection type '{comment_type}' must target Lost, not {target:?}")]
    RejectionTarget {
        comment_type: CommentType,
        target: Option<LeadState>,
    },
    #[error("comment type '{comment_type}' targets final state {target}")]
    TargetsFinalPositive {
        comment_type: CommentType,
        target: LeadState,
    },
}

/// Lookup table from comment type to workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    rules: Vec<TransitionRule>,
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransitionTable {
    /// The built-in table.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES.to_vec(),
        }
    }

    /// Build a table from explicit rules. Call [`Self::validate`] before use.
    #[must_use]
    pub const fn from_rules(rules: Vec<TransitionRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Target state for `comment_type`, if filing it moves the lead.
    #[must_use]
    pub fn resolve(&self, comment_type: CommentType) -> Option<LeadState> {
        self.describe(comment_type).triggers_state
    }

    /// Resolve by comment-type name, key, or numeric id.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::CommentTypeNotFound`] if `name` is not a known
    /// comment type. Known types without a transition resolve to `Ok(None)`.
    pub fn resolve_name(&self, name: &str) -> Result<Option<LeadState>> {
        let comment_type = name
            .parse::<CommentType>()
            .map_err(|_| LeadError::CommentTypeNotFound(name.to_string()))?;
        Ok(self.resolve(comment_type))
    }

    /// Workflow for `comment_type`. Types without a rule behave as plain notes.
    #[must_use]
    pub fn describe(&self, comment_type: CommentType) -> WorkflowDescriptor {
        self.rules
            .iter()
            .find(|rule| rule.comment_type == comment_type)
            .map_or(WorkflowDescriptor::NOTE, |rule| rule.workflow)
    }

    /// Self-check the table.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> std::result::Result<(), TableError> {
        let mut seen = HashSet::new();
        let mut rejections = Vec::new();

        for rule in &self.rules {
            if !seen.insert(rule.comment_type) {
                return Err(TableError::DuplicateRule(rule.comment_type));
            }
            if let Some(target) = rule.workflow.triggers_state {
                if target.category() == StateCategory::FinalPositive {
                    return Err(TableError::TargetsFinalPositive {
                        comment_type: rule.comment_type,
                        target,
                    });
                }
            }
            if rule.workflow.is_rejection {
                rejections.push(rule);
            }
        }

        let [rejection] = rejections.as_slice() else {
            return Err(TableError::RejectionCount(rejections.len()));
        };
        if rejection.workflow.triggers_state != Some(LeadState::Lost) {
            return Err(TableError::RejectionTarget {
                comment_type: rejection.comment_type,
                target: rejection.workflow.triggers_state,
            });
        }
        Ok(())
    }
}
