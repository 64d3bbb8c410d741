use std::fmt;

use crate::model::{CommentId, LeadId, LeadState, LossReasonId};

/// Machine-readable error codes for callers that map failures to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    LeadNotFound,
    CommentTypeNotFound,
    LossReasonNotFound,
    CommentNotFound,
    LeadFrozen,
    MissingLossReason,
    InvalidStateTransition,
    InvalidInput,
    StorageFailure,
    PayloadEncodeFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::LeadNotFound => "E2001",
            Self::CommentTypeNotFound => "E2002",
            Self::LossReasonNotFound => "E2003",
            Self::CommentNotFound => "E2004",
            Self::LeadFrozen => "E3001",
            Self::MissingLossReason => "E3002",
            Self::InvalidStateTransition => "E3003",
            Self::InvalidInput => "E3004",
            Self::StorageFailure => "E5001",
            Self::PayloadEncodeFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Lead database not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::LeadNotFound => "Lead not found",
            Self::CommentTypeNotFound => "Comment type not found",
            Self::LossReasonNotFound => "Loss reason not found",
            Self::CommentNotFound => "Comment not found",
            Self::LeadFrozen => "Lead is a client and can no longer be edited",
            Self::MissingLossReason => "Rejection requires a loss reason",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::InvalidInput => "Invalid input",
            Self::StorageFailure => "Storage failure",
            Self::PayloadEncodeFailed => "Audit payload encoding failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `leadlog init` to create the lead database."),
            Self::ConfigParseError => Some("Fix syntax in .leadlog/config.toml and retry."),
            Self::LeadNotFound => Some("Check the lead ID with `leadlog lead list`."),
            Self::CommentTypeNotFound => Some("Use one of the documented comment types."),
            Self::LossReasonNotFound => Some("Use one of the seeded loss reason IDs."),
            Self::CommentNotFound => None,
            Self::LeadFrozen => Some("Converted clients are read-only; open a new lead instead."),
            Self::MissingLossReason => Some("Pass a loss reason when rejecting a lead."),
            Self::InvalidStateTransition => {
                Some("Won leads cannot move back into the pipeline.")
            }
            Self::InvalidInput => None,
            Self::StorageFailure => Some("Retry once. Check disk space and file permissions."),
            Self::PayloadEncodeFailed => Some("Retry once. If persistent, report a bug with logs."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Coarse classification callers use to pick a response shape
/// (422-style validation vs 404-style not found vs 5xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Storage,
    Internal,
}

/// Errors surfaced by the engine's write operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("lead {0} not found")]
    LeadNotFound(LeadId),

    #[error("unknown comment type '{0}'")]
    CommentTypeNotFound(String),

    #[error("loss reason {0} not found")]
    LossReasonNotFound(LossReasonId),

    #[error("comment {0} not found")]
    CommentNotFound(CommentId),

    #[error("lead {0} is a client and is frozen")]
    LeadFrozen(LeadId),

    #[error("rejecting lead {0} requires a loss reason")]
    MissingLossReason(LeadId),

    #[error("lead {lead} cannot move from {from} to {to}: {reason}")]
    InvalidTransition {
        lead: LeadId,
        from: LeadState,
        to: LeadState,
        reason: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error("failed to encode audit payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl LeadError {
    /// Machine code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::LeadNotFound(_) => ErrorCode::LeadNotFound,
            Self::CommentTypeNotFound(_) => ErrorCode::CommentTypeNotFound,
            Self::LossReasonNotFound(_) => ErrorCode::LossReasonNotFound,
            Self::CommentNotFound(_) => ErrorCode::CommentNotFound,
            Self::LeadFrozen(_) => ErrorCode::LeadFrozen,
            Self::MissingLossReason(_) => ErrorCode::MissingLossReason,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::Storage(_) => ErrorCode::StorageFailure,
            Self::Payload(_) => ErrorCode::PayloadEncodeFailed,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::LeadNotFound(_)
            | Self::CommentTypeNotFound(_)
            | Self::LossReasonNotFound(_)
            | Self::CommentNotFound(_) => ErrorKind::NotFound,
            Self::LeadFrozen(_)
            | Self::MissingLossReason(_)
            | Self::InvalidTransition { .. }
            | Self::InvalidInput { .. } => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Payload(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

pub type Result<T, E = LeadError> = std::result::Result<T, E>;
