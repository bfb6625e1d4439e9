//! Declarative atomic wrapper for entry points.

use super::context::RequestContext;
use super::executor::AtomicExecutor;
use super::failure::BoundaryError;
use super::outcome::Outcome;
use super::report::report_for;
use super::step::{step, StepFuture};
use crate::storage::TransactionalResource;

/// Entry point adapter that runs each call as one atomic operation.
///
/// The handler keeps its argument and value types. Failures reach the request
/// layer as [`BoundaryError`]. A `Propagated` failure is handed back exactly
/// as the handler raised it.
#[derive(Debug, Clone)]
pub struct Atomic<F> {
    handler: F,
    executor: AtomicExecutor,
}

/// Wraps `handler` with the default executor (no time limit).
pub fn atomic<F>(handler: F) -> Atomic<F> {
    Atomic::new(handler, AtomicExecutor::default())
}

impl<F> Atomic<F> {
    pub(crate) fn new(handler: F, executor: AtomicExecutor) -> Self {
        Self { handler, executor }
    }

    pub fn executor(&self) -> &AtomicExecutor {
        &self.executor
    }

    /// Invokes the wrapped handler with the resource resolved from `ctx`.
    ///
    /// # Errors
    /// Returns the boundary failure for every non-success outcome.
    pub async fn call<R, A, T>(&self, ctx: &RequestContext<R>, args: A) -> Result<T, BoundaryError>
    where
        R: TransactionalResource,
        F: for<'a> Fn(&'a R::Handle, A) -> StepFuture<'a, T> + Sync,
        A: Send,
        T: Send + 'static,
    {
        let handler = &self.handler;
        let outcome = self
            .executor
            .execute_atomic(
                ctx,
                vec![step::<R::Handle, T, _>(move |tx, _| handler(tx, args))],
            )
            .await;

        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Propagated(err) => Err(err),
            failed => Err(report_for(ctx.request_id(), &failed).into_boundary_error()),
        }
    }
}
