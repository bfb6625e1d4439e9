use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::{Lazy, OnceCell};
use std::path::Path;
use std::sync::{Arc, Mutex};
use txguard_core::atomic::{
    report_for, AtomicExecutor, BoundaryError, BusinessConflict, OperationFailure, Outcome,
    RequestContext,
};
use txguard_core::storage::{SqliteHandle, SqliteResource};

#[derive(Debug, Clone)]
struct Captured {
    target: String,
    level: Level,
    message: String,
}

/// Keeps every record in memory; tests filter by their own request id.
#[derive(Default)]
struct CapturingLogger {
    records: Mutex<Vec<Captured>>,
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records.lock().unwrap().push(Captured {
            target: record.target().to_string(),
            level: record.level(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {}
}

static CAPTURE: Lazy<CapturingLogger> = Lazy::new(CapturingLogger::default);
static INSTALLED: OnceCell<()> = OnceCell::new();

fn capture() -> &'static CapturingLogger {
    INSTALLED.get_or_init(|| {
        log::set_logger(&*CAPTURE).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    &CAPTURE
}

fn records_for(request_id: &str) -> Vec<Captured> {
    let needle = format!("request_id={request_id}");
    capture()
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|record| record.message.contains(&needle))
        .cloned()
        .collect()
}

fn rollback_records_for(request_id: &str) -> Vec<Captured> {
    records_for(request_id)
        .into_iter()
        .filter(|record| record.message.contains("phase=rollback"))
        .collect()
}

fn context(path: &Path, request_id: &str) -> RequestContext<SqliteResource> {
    RequestContext::new(request_id, Arc::new(SqliteResource::open(path).unwrap()))
}

#[tokio::test]
async fn business_conflict_is_logged_as_warning() {
    capture();
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir.path().join("txguard.db"), "req-log-conflict");

    let outcome = AtomicExecutor::new()
        .execute_one(&ctx, |_tx: &SqliteHandle| {
            Box::pin(async move {
                Err::<(), _>(OperationFailure::from(BusinessConflict::new(
                    "organization name already taken",
                )))
            })
        })
        .await;
    assert!(matches!(outcome, Outcome::Conflict { .. }));

    let rollbacks = rollback_records_for("req-log-conflict");
    assert_eq!(rollbacks.len(), 1, "records: {rollbacks:?}");
    let record = &rollbacks[0];
    assert_eq!(record.target, "txguard::atomic");
    assert_eq!(record.level, Level::Warn);
    assert!(record.message.contains("outcome=conflict"));
    assert!(record.message.contains("organization name already taken"));
}

#[tokio::test]
async fn unexpected_failure_is_logged_as_error() {
    capture();
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir.path().join("txguard.db"), "req-log-unexpected");

    let outcome = AtomicExecutor::new()
        .execute_one(&ctx, |_tx: &SqliteHandle| {
            Box::pin(async move {
                Err::<(), _>(OperationFailure::unexpected("cache node unreachable"))
            })
        })
        .await;
    assert!(matches!(outcome, Outcome::InfrastructureError { .. }));

    let rollbacks = rollback_records_for("req-log-unexpected");
    assert_eq!(rollbacks.len(), 1, "records: {rollbacks:?}");
    let record = &rollbacks[0];
    assert_eq!(record.target, "txguard::atomic");
    assert_eq!(record.level, Level::Error);
    assert!(record.message.contains("outcome=infrastructure_error"));
    assert!(record.message.contains("cache node unreachable"));
}

#[test]
fn reporting_a_propagated_failure_emits_no_record() {
    capture();
    let outcome = Outcome::<()>::Propagated(BoundaryError::not_found("organization not found"));

    let response = report_for("req-log-propagated", &outcome);

    assert_eq!(response.status_code, 404);
    assert!(records_for("req-log-propagated").is_empty());
}

#[test]
fn reporting_a_conflict_emits_one_warning() {
    capture();
    let outcome = Outcome::<()>::Conflict {
        message: "member already exists".to_string(),
        rule: None,
    };

    let response = report_for("req-log-report-conflict", &outcome);

    assert_eq!(response.status_code, 409);
    let records = records_for("req-log-report-conflict");
    assert_eq!(records.len(), 1, "records: {records:?}");
    assert_eq!(records[0].target, "txguard::atomic");
    assert_eq!(records[0].level, Level::Warn);
    assert!(records[0].message.contains("outcome=conflict"));
}
