//! Outcome reporting for the request-handling layer.
//!
//! # Invariants
//! - Reporting is a pure mapping; the same outcome always yields the same
//!   status code and message.
//! - Integrity and infrastructure messages are generic. Their diagnostics
//!   only reach the log.

use super::failure::BoundaryError;
use super::log_record::{LogRecord, Phase};
use super::outcome::Outcome;
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "OK";
pub const INTEGRITY_MESSAGE: &str = "Operation violates database constraints";
pub const MALFORMED_MESSAGE: &str = "Invalid data provided";
pub const INFRASTRUCTURE_MESSAGE: &str = "Database operation failed";

/// Caller-facing `{status_code, message, detail}` triple plus success value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerResponse<V> {
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<V>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl<V> CallerResponse<V> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Drops the value and keeps the boundary-facing failure shape.
    pub fn into_boundary_error(self) -> BoundaryError {
        BoundaryError {
            status_code: self.status_code,
            message: self.message,
            detail: self.detail,
        }
    }
}

/// Maps `outcome` to the caller response and logs it.
pub fn report<T>(outcome: &Outcome<T>) -> CallerResponse<&T> {
    build_report(outcome, None)
}

/// Same as [`report`], tagging the log record with the request id.
pub fn report_for<'o, T>(request_id: &str, outcome: &'o Outcome<T>) -> CallerResponse<&'o T> {
    build_report(outcome, Some(request_id))
}

fn build_report<'o, T>(outcome: &'o Outcome<T>, request_id: Option<&str>) -> CallerResponse<&'o T> {
    let response = match outcome {
        Outcome::Success(value) => CallerResponse {
            status_code: 200,
            message: SUCCESS_MESSAGE.to_string(),
            value: Some(value),
            detail: None,
        },
        Outcome::Conflict { message, rule } => CallerResponse {
            status_code: 409,
            message: message.clone(),
            value: None,
            detail: rule.clone(),
        },
        Outcome::IntegrityViolation { .. } => CallerResponse {
            status_code: 409,
            message: INTEGRITY_MESSAGE.to_string(),
            value: None,
            detail: None,
        },
        Outcome::Malformed { detail } => CallerResponse {
            status_code: 400,
            message: MALFORMED_MESSAGE.to_string(),
            value: None,
            detail: Some(detail.clone()),
        },
        Outcome::InfrastructureError { .. } => CallerResponse {
            status_code: 500,
            message: INFRASTRUCTURE_MESSAGE.to_string(),
            value: None,
            detail: None,
        },
        Outcome::Propagated(err) => CallerResponse {
            status_code: err.status_code,
            message: err.message.clone(),
            value: None,
            detail: err.detail.clone(),
        },
    };

    emit_report_record(outcome, response.status_code, request_id);
    response
}

fn emit_report_record<T>(outcome: &Outcome<T>, status_code: u16, request_id: Option<&str>) {
    let kind = outcome.kind();
    let Some(severity) = kind.severity() else {
        return;
    };
    let phase = if outcome.is_success() {
        Phase::Commit
    } else {
        Phase::Rollback
    };
    let diagnostic = match outcome {
        Outcome::IntegrityViolation {
            constraint,
            diagnostic,
        } => format!(
            "status_code={status_code} constraint={} {diagnostic}",
            constraint.as_str()
        ),
        Outcome::InfrastructureError { diagnostic } => {
            format!("status_code={status_code} {diagnostic}")
        }
        _ => format!("status_code={status_code}"),
    };
    let mut record = LogRecord::new(phase, severity).outcome(kind).detail(diagnostic);
    if let Some(request_id) = request_id {
        record = record.request(request_id);
    }
    record.emit();
}
