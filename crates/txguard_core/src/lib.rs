//! Transactional core for data-mutating operations.
//!
//! Runs ordered steps as one all-or-nothing unit of work, classifies the first
//! failure into a stable outcome taxonomy and reports it to callers and logs.

pub mod atomic;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use atomic::{
    atomic, classify, report, report_for, step, Atomic, AtomicExecutor, BoundaryError,
    BusinessConflict, CallerResponse, OperationFailure, Outcome, OutcomeKind, RequestContext,
    ScopedTransaction, Step, StepFuture,
};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::organization::{NewOrganization, Organization, OrganizationMember, OrganizationRole};
pub use repo::{RepoError, RepoResult};
pub use service::organization_service::{Membership, OrganizationService};
pub use service::security_role_service::SecurityRoleService;
pub use storage::{
    SqliteHandle, SqliteResource, StorageError, StorageErrorKind, TransactionHandle,
    TransactionalResource,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
