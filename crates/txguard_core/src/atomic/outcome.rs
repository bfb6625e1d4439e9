//! Classified outcome of one atomic operation.

use super::failure::BoundaryError;
use crate::storage::ConstraintKind;

/// Tagged result of executing an atomic operation.
///
/// Immutable once created: the classifier builds it, the reporter reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// All steps succeeded and the unit of work committed.
    Success(T),
    /// A business rule was violated.
    Conflict {
        message: String,
        rule: Option<String>,
    },
    /// Input had the wrong type, format or range.
    Malformed { detail: String },
    /// A storage constraint rejected the mutation.
    IntegrityViolation {
        constraint: ConstraintKind,
        diagnostic: String,
    },
    /// Storage outage, timeout or unexpected defect.
    InfrastructureError { diagnostic: String },
    /// Failure classified by an inner boundary, passed through as-is.
    Propagated(BoundaryError),
}

/// Outcome discriminant, used for logging and severity selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Conflict,
    Malformed,
    IntegrityViolation,
    InfrastructureError,
    Propagated,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Conflict => "conflict",
            Self::Malformed => "malformed",
            Self::IntegrityViolation => "integrity_violation",
            Self::InfrastructureError => "infrastructure_error",
            Self::Propagated => "propagated",
        }
    }

    /// Severity for the rollback/report record. `None` means do not re-log.
    pub fn severity(self) -> Option<log::Level> {
        match self {
            Self::Success => Some(log::Level::Debug),
            Self::Conflict | Self::Malformed | Self::IntegrityViolation => {
                Some(log::Level::Warn)
            }
            Self::InfrastructureError => Some(log::Level::Error),
            Self::Propagated => None,
        }
    }
}

impl<T> Outcome<T> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::Conflict { .. } => OutcomeKind::Conflict,
            Self::Malformed { .. } => OutcomeKind::Malformed,
            Self::IntegrityViolation { .. } => OutcomeKind::IntegrityViolation,
            Self::InfrastructureError { .. } => OutcomeKind::InfrastructureError,
            Self::Propagated(_) => OutcomeKind::Propagated,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the committed value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Maps the success value, keeping failure variants untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Conflict { message, rule } => Outcome::Conflict { message, rule },
            Self::Malformed { detail } => Outcome::Malformed { detail },
            Self::IntegrityViolation {
                constraint,
                diagnostic,
            } => Outcome::IntegrityViolation {
                constraint,
                diagnostic,
            },
            Self::InfrastructureError { diagnostic } => {
                Outcome::InfrastructureError { diagnostic }
            }
            Self::Propagated(err) => Outcome::Propagated(err),
        }
    }
}
