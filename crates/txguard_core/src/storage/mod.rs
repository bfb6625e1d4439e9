//! Persistence engine contract consumed by the transactional core.
//!
//! # Responsibility
//! - Define begin/commit/rollback over an opaque transactional handle.
//! - Surface failures with a structural kind the classifier can match on.
//!
//! # Invariants
//! - A handle is owned by exactly one scope guard and is never shared
//!   between concurrent atomic operations.
//! - `rollback_detached` is safe to call on an already resolved handle.
//! - `is_active` never blocks, so scope guards may call it from `Drop`.

use std::future::Future;
use uuid::Uuid;

mod error;
mod sqlite;

pub use error::{ConstraintKind, StorageError, StorageErrorKind, StorageResult};
pub use sqlite::{SqliteHandle, SqliteResource};

/// Stable identifier attached to every handle for log correlation.
pub type HandleId = Uuid;

/// A resource that can open units of work.
pub trait TransactionalResource: Send + Sync + 'static {
    type Handle: TransactionHandle;

    /// Begins a new unit of work and returns its active handle.
    fn begin(&self) -> impl Future<Output = StorageResult<Self::Handle>> + Send;
}

/// An open unit of work against one transactional resource.
pub trait TransactionHandle: Send + Sync + 'static {
    fn id(&self) -> HandleId;

    /// Makes all mutations issued through this handle durable.
    ///
    /// When commit fails the implementation must leave nothing pending: the
    /// unit of work is rolled back before the error is returned.
    fn commit(&mut self) -> impl Future<Output = StorageResult<()>> + Send;

    /// Discards all mutations issued through this handle.
    fn rollback(&mut self) -> impl Future<Output = StorageResult<()>> + Send;

    /// Whether the unit of work is still open (neither committed nor rolled
    /// back). Must not block.
    fn is_active(&self) -> bool;

    /// Rollback for scope exits that cannot await, such as a dropped future.
    ///
    /// Must not block the calling thread on in-flight work. An implementation
    /// may finish the rollback on a background thread, but must keep the
    /// underlying connection open until it has. No-op when already resolved.
    fn rollback_detached(&mut self) -> StorageResult<()>;
}
