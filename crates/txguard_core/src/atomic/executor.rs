//! Atomic operation executor.
//!
//! # Responsibility
//! - Run an ordered list of steps inside one scoped transaction.
//! - Classify the first failure exactly once and log it by outcome kind.
//!
//! # Invariants
//! - Steps run strictly in order; the first failure stops the list.
//! - Success commits exactly once; every failure rolls back everything.
//! - One unresolved atomic operation per request context (nesting panics).

use super::classify::classify;
use super::context::RequestContext;
use super::failure::OperationFailure;
use super::guard::ScopedTransaction;
use super::log_record::{LogRecord, Phase};
use super::outcome::{Outcome, OutcomeKind};
use super::step::{step, Step, StepFuture};
use super::wrapper::Atomic;
use crate::config::EngineConfig;
use crate::storage::{HandleId, TransactionalResource};
use log::{debug, warn, Level};
use std::future::Future;
use std::time::{Duration, Instant};

/// Executes atomic operations with an optional time limit.
#[derive(Debug, Clone, Default)]
pub struct AtomicExecutor {
    timeout: Option<Duration>,
}

impl AtomicExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            timeout: config.atomic_timeout(),
        }
    }

    /// Bounds the total execution time of each operation: begin, every step
    /// and commit share one deadline.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Wraps `handler` so every call runs as one atomic operation.
    pub fn wrap<F>(&self, handler: F) -> Atomic<F> {
        Atomic::new(handler, self.clone())
    }

    /// Runs `steps` in order inside one transaction.
    ///
    /// Returns the last step's value as `Success` after commit, or the
    /// classified first failure after rollback. An empty step list is a
    /// server-side defect and yields `InfrastructureError` without opening a
    /// transaction.
    ///
    /// # Panics
    /// Panics when `ctx` already has an unresolved atomic operation.
    pub async fn execute_atomic<R, T>(
        &self,
        ctx: &RequestContext<R>,
        steps: Vec<Step<'_, R::Handle, T>>,
    ) -> Outcome<T>
    where
        R: TransactionalResource,
        T: Send + 'static,
    {
        let _scope = ctx.enter_atomic();
        let started_at = Instant::now();

        if steps.is_empty() {
            return fail(
                ctx,
                None,
                started_at,
                OperationFailure::unexpected("atomic operation requires at least one step"),
            );
        }

        LogRecord::new(Phase::Start, Level::Debug)
            .request(ctx.request_id())
            .detail(format!("steps={}", steps.len()))
            .emit();

        let deadline = self.timeout.map(Deadline::starting_now);

        let begin = ScopedTransaction::begin(ctx.resource(), ctx.request_id());
        let guard = match within(deadline, begin).await {
            Ok(Ok(guard)) => guard,
            Ok(Err(err)) => return fail(ctx, None, started_at, err.into()),
            Err(timed_out) => return fail(ctx, None, started_at, timed_out),
        };
        let handle_id = guard.id();

        let run = run_steps(guard.handle(), steps, ctx.request_id());
        let result = within(deadline, run).await.and_then(|result| result);

        match result {
            // Expiry drops the commit future and with it the guard, which
            // rolls back whatever the engine has not committed yet.
            Ok(value) => match within(deadline, guard.commit()).await {
                Ok(Ok(())) => {
                    LogRecord::new(Phase::Commit, Level::Debug)
                        .request(ctx.request_id())
                        .outcome(OutcomeKind::Success)
                        .handle(handle_id)
                        .duration_ms(started_at.elapsed().as_millis())
                        .emit();
                    Outcome::Success(value)
                }
                Ok(Err(err)) => fail(ctx, Some(handle_id), started_at, err.into()),
                Err(timed_out) => fail(ctx, Some(handle_id), started_at, timed_out),
            },
            Err(failure) => {
                if let Err(err) = guard.rollback().await {
                    warn!(
                        "event=tx_rollback module=atomic status=error request_id={} handle={} error={}",
                        ctx.request_id(),
                        handle_id,
                        err
                    );
                }
                fail(ctx, Some(handle_id), started_at, failure)
            }
        }
    }

    /// Runs a single unit of work atomically.
    pub async fn execute_one<R, T, F>(&self, ctx: &RequestContext<R>, body: F) -> Outcome<T>
    where
        R: TransactionalResource,
        T: Send + 'static,
        F: for<'a> FnOnce(&'a R::Handle) -> StepFuture<'a, T> + Send,
    {
        self.execute_atomic(ctx, vec![step::<R::Handle, T, _>(move |tx, _| body(tx))])
            .await
    }
}

/// Time limit of one atomic operation, fixed when the operation starts.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    limit: Duration,
    at: tokio::time::Instant,
}

impl Deadline {
    fn starting_now(limit: Duration) -> Self {
        Self {
            limit,
            at: tokio::time::Instant::now() + limit,
        }
    }
}

/// Awaits `future`, giving up once `deadline` has passed.
async fn within<F: Future>(
    deadline: Option<Deadline>,
    future: F,
) -> Result<F::Output, OperationFailure> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, future)
            .await
            .map_err(|_| OperationFailure::TimedOut {
                limit: deadline.limit,
            }),
        None => Ok(future.await),
    }
}

async fn run_steps<H, T>(
    handle: &H,
    steps: Vec<Step<'_, H, T>>,
    request_id: &str,
) -> Result<T, OperationFailure> {
    let total = steps.len();
    let mut previous = None;
    for (index, step) in steps.into_iter().enumerate() {
        match step(handle, previous.take()).await {
            Ok(value) => previous = Some(value),
            Err(failure) => {
                debug!(
                    "event=atomic_step module=atomic status=error request_id={} step={}/{}",
                    request_id,
                    index + 1,
                    total
                );
                return Err(failure);
            }
        }
    }
    previous.ok_or_else(|| OperationFailure::unexpected("atomic operation produced no value"))
}

/// Classifies `failure` and emits the rollback record for it.
fn fail<R, T>(
    ctx: &RequestContext<R>,
    handle: Option<HandleId>,
    started_at: Instant,
    failure: OperationFailure,
) -> Outcome<T> {
    let outcome = classify(failure);
    let kind = outcome.kind();
    let mut record = LogRecord::new(Phase::Rollback, kind.severity().unwrap_or(Level::Debug))
        .request(ctx.request_id())
        .outcome(kind)
        .duration_ms(started_at.elapsed().as_millis());
    if let Some(handle) = handle {
        record = record.handle(handle);
    }
    if let Some(detail) = failure_detail(&outcome) {
        record = record.detail(detail);
    }
    record.emit();
    outcome
}

fn failure_detail<T>(outcome: &Outcome<T>) -> Option<String> {
    match outcome {
        Outcome::Success(_) | Outcome::Propagated(_) => None,
        Outcome::Conflict { message, .. } => Some(message.clone()),
        Outcome::Malformed { detail } => Some(detail.clone()),
        Outcome::IntegrityViolation {
            constraint,
            diagnostic,
        } => Some(format!("constraint={} {diagnostic}", constraint.as_str())),
        Outcome::InfrastructureError { diagnostic } => Some(diagnostic.clone()),
    }
}
