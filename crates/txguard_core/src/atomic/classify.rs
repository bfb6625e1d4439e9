//! Failure classification.
//!
//! # Invariants
//! - Classification is a pure function of the failure's structural kind.
//! - Message text is carried as detail, never inspected for decisions.

use super::failure::OperationFailure;
use super::outcome::Outcome;
use crate::storage::StorageErrorKind;
use std::error::Error;

/// Maps a raised failure to its caller-facing outcome.
///
/// Precedence: business conflict, storage constraint, storage malformed value,
/// other storage failure, boundary pass-through, anything else.
pub fn classify<T>(failure: OperationFailure) -> Outcome<T> {
    match failure {
        OperationFailure::Conflict(conflict) => Outcome::Conflict {
            message: conflict.message().to_string(),
            rule: conflict.rule().map(str::to_string),
        },
        OperationFailure::Storage(err) => match err.kind() {
            StorageErrorKind::Constraint(constraint) => Outcome::IntegrityViolation {
                constraint,
                diagnostic: err.to_string(),
            },
            StorageErrorKind::MalformedValue => Outcome::Malformed {
                detail: err.to_string(),
            },
            StorageErrorKind::Operational => Outcome::InfrastructureError {
                diagnostic: diagnostic_chain(&err),
            },
        },
        OperationFailure::Boundary(err) => Outcome::Propagated(err),
        other @ (OperationFailure::TimedOut { .. } | OperationFailure::Unexpected(_)) => {
            Outcome::InfrastructureError {
                diagnostic: diagnostic_chain(&other),
            }
        }
    }
}

/// Renders an error together with its source chain.
fn diagnostic_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !rendered.ends_with(cause_text.as_str()) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}
