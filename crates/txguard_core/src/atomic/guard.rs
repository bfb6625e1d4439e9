//! Scoped transaction guard.
//!
//! # Responsibility
//! - Own one transactional handle from `begin` until it is resolved.
//! - Decide commit or rollback in exactly one place per exit path.
//!
//! # Invariants
//! - `commit`/`rollback` consume the guard, so a handle cannot be resolved
//!   twice through it.
//! - Dropping an unresolved guard (failure unwinding or a cancelled future)
//!   rolls back before the handle is released. `Drop` never blocks on
//!   in-flight work: a busy engine finishes the rollback in the background.
//! - Only a handle that is still active is reported as rolled back on drop.
//!   A commit cancelled after it completed is logged as a plain release.

use super::failure::OperationFailure;
use super::log_record::{LogRecord, Phase};
use super::step::StepFuture;
use crate::storage::{HandleId, StorageResult, TransactionHandle, TransactionalResource};
use log::{debug, warn, Level};

/// Exclusive owner of one active transactional handle.
pub struct ScopedTransaction<H: TransactionHandle> {
    handle: H,
    request_id: String,
    resolved: bool,
}

impl<H: TransactionHandle> ScopedTransaction<H> {
    /// Begins a new unit of work against `resource`.
    pub async fn begin<R>(resource: &R, request_id: &str) -> StorageResult<Self>
    where
        R: TransactionalResource<Handle = H>,
    {
        let handle = resource.begin().await?;
        Ok(Self {
            handle,
            request_id: request_id.to_string(),
            resolved: false,
        })
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn id(&self) -> HandleId {
        self.handle.id()
    }

    /// Commits the unit of work.
    ///
    /// On error the handle has already been rolled back by the engine.
    pub async fn commit(mut self) -> StorageResult<()> {
        let result = self.handle.commit().await;
        self.resolved = true;
        result
    }

    /// Rolls the unit of work back.
    pub async fn rollback(mut self) -> StorageResult<()> {
        let result = self.handle.rollback().await;
        self.resolved = true;
        result
    }
}

impl<H: TransactionHandle> Drop for ScopedTransaction<H> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if !self.handle.is_active() {
            debug!(
                "event=tx_release module=atomic status=ok request_id={} handle={} detail=already_resolved",
                self.request_id,
                self.handle.id()
            );
            return;
        }
        LogRecord::new(Phase::Rollback, Level::Warn)
            .request(self.request_id.as_str())
            .handle(self.handle.id())
            .detail("scope exited before resolution")
            .emit();
        if let Err(err) = self.handle.rollback_detached() {
            warn!(
                "event=tx_rollback module=atomic status=error request_id={} handle={} error={}",
                self.request_id,
                self.handle.id(),
                err
            );
        }
    }
}

/// Runs `body` inside one scoped transaction.
///
/// Commits when `body` succeeds. Otherwise rolls back and returns the original
/// failure unchanged. A failing commit is returned as a storage failure.
pub async fn run_in_transaction<R, T, F>(
    resource: &R,
    request_id: &str,
    body: F,
) -> Result<T, OperationFailure>
where
    R: TransactionalResource,
    F: for<'a> FnOnce(&'a R::Handle) -> StepFuture<'a, T>,
{
    let guard = ScopedTransaction::begin(resource, request_id).await?;
    let result = body(guard.handle()).await;
    match result {
        Ok(value) => {
            guard.commit().await?;
            Ok(value)
        }
        Err(failure) => {
            let handle = guard.id();
            if let Err(err) = guard.rollback().await {
                warn!(
                    "event=tx_rollback module=atomic status=error request_id={} handle={} error={}",
                    request_id, handle, err
                );
            }
            Err(failure)
        }
    }
}
