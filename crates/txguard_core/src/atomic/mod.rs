//! Atomic operation engine.
//!
//! # Responsibility
//! - Wrap ordered, data-mutating steps in one all-or-nothing unit of work.
//! - Classify failures into a small, stable outcome taxonomy.
//! - Report outcomes to the request layer and the log.
//!
//! # Invariants
//! - A unit of work is resolved exactly once, on every exit path.
//! - Classification happens once per atomic operation, at the first failure.

pub mod classify;
pub mod context;
pub mod executor;
pub mod failure;
pub mod guard;
pub mod log_record;
pub mod outcome;
pub mod report;
pub mod step;
pub mod wrapper;

pub use classify::classify;
pub use context::RequestContext;
pub use executor::AtomicExecutor;
pub use failure::{BoundaryError, BusinessConflict, OperationFailure};
pub use guard::{run_in_transaction, ScopedTransaction};
pub use log_record::{LogRecord, Phase};
pub use outcome::{Outcome, OutcomeKind};
pub use report::{report, report_for, CallerResponse};
pub use step::{step, Step, StepFuture};
pub use wrapper::{atomic, Atomic};
