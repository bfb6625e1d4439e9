//! Repository layer over an open transactional handle.
//!
//! # Responsibility
//! - Keep SQL details inside the persistence boundary.
//! - Issue mutations through a borrowed `SqliteHandle` and never commit or
//!   roll back on their own; the enclosing atomic operation decides.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   storage errors.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::atomic::{BoundaryError, OperationFailure};
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod organization_repo;
pub mod security_role_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Storage(StorageError),
    NotFound { entity: &'static str, id: Uuid },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(StorageError::from(value))
    }
}

impl From<RepoError> for OperationFailure {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Storage(err) => Self::Storage(err),
            RepoError::NotFound { .. } => Self::Boundary(BoundaryError::not_found(value.to_string())),
            RepoError::InvalidData(_) => Self::unexpected(value),
        }
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
