//! Structured storage failures.

use crate::db::DbError;
use rusqlite::{ffi, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

// Extended result code for datatype violations in STRICT tables (SQLite 3.37+).
const SQLITE_CONSTRAINT_DATATYPE: i32 = ffi::SQLITE_CONSTRAINT | (12 << 8);

pub type StorageResult<T> = Result<T, StorageError>;

/// Constraint family reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
    Check,
    NotNull,
    Other,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::PrimaryKey => "primary_key",
            Self::ForeignKey => "foreign_key",
            Self::Check => "check",
            Self::NotNull => "not_null",
            Self::Other => "other",
        }
    }
}

/// The three failure categories every engine must keep distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Uniqueness, foreign-key, check or not-null violation.
    Constraint(ConstraintKind),
    /// Value of the wrong type, format or range.
    MalformedValue,
    /// Anything else: I/O, locking, misuse, resolved handle.
    Operational,
}

/// Storage failure with its structural kind.
#[derive(Debug)]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Operational, message)
    }

    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::new(sqlite_error_kind(&value), value.to_string()).with_source(value)
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            other => Self::operational(other.to_string()).with_source(other),
        }
    }
}

/// Maps rusqlite failures onto structural kinds using result codes, never
/// message text.
fn sqlite_error_kind(err: &rusqlite::Error) -> StorageErrorKind {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => constraint_error_kind(failure.extended_code),
            ErrorCode::TypeMismatch | ErrorCode::TooBig => StorageErrorKind::MalformedValue,
            _ => StorageErrorKind::Operational,
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::ToSqlConversionFailure(..)
        | rusqlite::Error::Utf8Error(..) => StorageErrorKind::MalformedValue,
        _ => StorageErrorKind::Operational,
    }
}

fn constraint_error_kind(extended_code: i32) -> StorageErrorKind {
    let constraint = match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE => ConstraintKind::Unique,
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::PrimaryKey,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        SQLITE_CONSTRAINT_DATATYPE => return StorageErrorKind::MalformedValue,
        _ => ConstraintKind::Other,
    };
    StorageErrorKind::Constraint(constraint)
}

#[cfg(test)]
mod tests {
    use super::{ConstraintKind, StorageError, StorageErrorKind};
    use rusqlite::Connection;

    fn scratch() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE) STRICT;
             CREATE TABLE child (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL REFERENCES parent (id),
                qty INTEGER NOT NULL CHECK (qty > 0)
             ) STRICT;
             INSERT INTO parent (id, name) VALUES (1, 'a');",
        )
        .unwrap();
        conn
    }

    fn kind_of(conn: &Connection, sql: &str) -> StorageErrorKind {
        let err = conn.execute_batch(sql).unwrap_err();
        StorageError::from(err).kind()
    }

    #[test]
    fn unique_violation_maps_to_unique_constraint() {
        let conn = scratch();
        assert_eq!(
            kind_of(&conn, "INSERT INTO parent (id, name) VALUES (2, 'a');"),
            StorageErrorKind::Constraint(ConstraintKind::Unique)
        );
    }

    #[test]
    fn primary_key_foreign_key_check_and_not_null_are_distinguished() {
        let conn = scratch();
        assert_eq!(
            kind_of(&conn, "INSERT INTO parent (id, name) VALUES (1, 'b');"),
            StorageErrorKind::Constraint(ConstraintKind::PrimaryKey)
        );
        assert_eq!(
            kind_of(&conn, "INSERT INTO child (parent_id, qty) VALUES (99, 1);"),
            StorageErrorKind::Constraint(ConstraintKind::ForeignKey)
        );
        assert_eq!(
            kind_of(&conn, "INSERT INTO child (parent_id, qty) VALUES (1, 0);"),
            StorageErrorKind::Constraint(ConstraintKind::Check)
        );
        assert_eq!(
            kind_of(&conn, "INSERT INTO parent (id, name) VALUES (3, NULL);"),
            StorageErrorKind::Constraint(ConstraintKind::NotNull)
        );
    }

    #[test]
    fn strict_datatype_violation_is_malformed() {
        let conn = scratch();
        assert_eq!(
            kind_of(&conn, "INSERT INTO child (parent_id, qty) VALUES (1, 'many');"),
            StorageErrorKind::MalformedValue
        );
    }

    #[test]
    fn conversion_failures_are_malformed() {
        let conn = scratch();
        let err = conn
            .query_row("SELECT name FROM parent WHERE id = 1;", [], |row| {
                row.get::<_, i64>(0)
            })
            .unwrap_err();
        assert_eq!(
            StorageError::from(err).kind(),
            StorageErrorKind::MalformedValue
        );
    }

    #[test]
    fn syntax_errors_are_operational() {
        let conn = scratch();
        assert_eq!(
            kind_of(&conn, "SELEC nothing;"),
            StorageErrorKind::Operational
        );
    }
}
