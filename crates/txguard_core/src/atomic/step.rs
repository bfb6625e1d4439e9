//! Operation step shapes.

use super::failure::OperationFailure;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by a step; borrows the handle for `'a` only.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OperationFailure>> + Send + 'a>>;

/// One ordered unit of caller logic.
///
/// Receives the open handle and the value returned by the previous step
/// (`None` for the first step).
pub type Step<'s, H, T> =
    Box<dyn for<'a> FnOnce(&'a H, Option<T>) -> StepFuture<'a, T> + Send + 's>;

/// Boxes a closure as a [`Step`].
///
/// Going through this function lets the compiler infer the higher-ranked
/// closure signature, so callers can write `step(|tx, prev| Box::pin(async move { .. }))`.
pub fn step<'s, H, T, F>(f: F) -> Step<'s, H, T>
where
    F: for<'a> FnOnce(&'a H, Option<T>) -> StepFuture<'a, T> + Send + 's,
{
    Box::new(f)
}
