//! Failures raised by operation steps.

use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Business-rule violation detected in application logic.
///
/// Distinct from storage-level constraint failures: a service raises this when
/// it has already checked the conflicting state itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessConflict {
    message: String,
    rule: Option<String>,
}

impl BusinessConflict {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rule: None,
        }
    }

    /// Names the violated rule, surfaced to callers as conflict detail.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }
}

impl Display for BusinessConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for BusinessConflict {}

/// Failure that already carries its caller-facing status.
///
/// This is also the failure shape handed to the request layer by wrapped
/// entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryError {
    pub status_code: u16,
    pub message: String,
    pub detail: Option<String>,
}

impl BoundaryError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl Display for BoundaryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status_code, self.message)
    }
}

impl Error for BoundaryError {}

/// Everything a step can fail with.
#[derive(Debug)]
pub enum OperationFailure {
    /// Caller-raised business conflict.
    Conflict(BusinessConflict),
    /// Persistence-layer failure with structural kind.
    Storage(StorageError),
    /// Already-classified boundary failure, passed through untouched.
    Boundary(BoundaryError),
    /// The atomic operation exceeded its configured time limit.
    TimedOut { limit: Duration },
    /// Unexpected defect.
    Unexpected(Box<dyn Error + Send + Sync + 'static>),
}

impl OperationFailure {
    pub fn unexpected(err: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        Self::Unexpected(err.into())
    }
}

impl Display for OperationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conflict(err) => write!(f, "business conflict: {err}"),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
            Self::Boundary(err) => write!(f, "boundary failure: {err}"),
            Self::TimedOut { limit } => {
                write!(f, "atomic operation timed out after {}ms", limit.as_millis())
            }
            Self::Unexpected(err) => write!(f, "unexpected failure: {err}"),
        }
    }
}

impl Error for OperationFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conflict(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Boundary(err) => Some(err),
            Self::TimedOut { .. } => None,
            Self::Unexpected(err) => Some(err.as_ref()),
        }
    }
}

impl From<BusinessConflict> for OperationFailure {
    fn from(value: BusinessConflict) -> Self {
        Self::Conflict(value)
    }
}

impl From<StorageError> for OperationFailure {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for OperationFailure {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(StorageError::from(value))
    }
}

impl From<BoundaryError> for OperationFailure {
    fn from(value: BoundaryError) -> Self {
        Self::Boundary(value)
    }
}
