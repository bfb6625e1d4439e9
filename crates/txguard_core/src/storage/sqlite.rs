//! SQLite implementation of the persistence engine contract.
//!
//! # Responsibility
//! - Open one dedicated connection per unit of work.
//! - Run blocking SQLite calls off the async scheduler via `spawn_blocking`.
//!
//! # Invariants
//! - Every handle starts with `BEGIN IMMEDIATE`.
//! - The `active` flag is only written while the connection mutex is held.
//!   Work queued after the handle resolved is refused, so it can never
//!   autocommit.
//! - A detached rollback that finds the connection busy finishes on the
//!   blocking pool; the connection stays open until it has run.

use super::{HandleId, StorageError, StorageResult, TransactionHandle, TransactionalResource};
use crate::db::{connect, open_db, DbResult, DEFAULT_BUSY_TIMEOUT};
use log::{debug, warn};
use rusqlite::Connection;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;
use uuid::Uuid;

/// File-backed SQLite resource.
#[derive(Debug, Clone)]
pub struct SqliteResource {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteResource {
    /// Opens (and migrates) the database at `path`.
    ///
    /// The bootstrap connection is closed again; each `begin` opens its own.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        drop(open_db(&path)?);
        Ok(Self {
            path,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionalResource for SqliteResource {
    type Handle = SqliteHandle;

    fn begin(&self) -> impl Future<Output = StorageResult<SqliteHandle>> + Send {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        async move {
            // If the caller stops waiting, the connection is dropped with the
            // task result and SQLite discards the open transaction.
            let conn = tokio::task::spawn_blocking(move || -> StorageResult<Connection> {
                let conn = connect(&path, busy_timeout)?;
                conn.execute_batch("BEGIN IMMEDIATE;")?;
                Ok(conn)
            })
            .await
            .map_err(|err| StorageError::operational(format!("begin task failed: {err}")))??;

            let handle = SqliteHandle {
                id: Uuid::new_v4(),
                session: Arc::new(Mutex::new(conn)),
                active: Arc::new(AtomicBool::new(true)),
            };
            debug!("event=tx_begin module=storage status=ok handle={}", handle.id);
            Ok(handle)
        }
    }
}

/// Active SQLite unit of work.
///
/// Steps issue statements through [`SqliteHandle::run`]; the closure runs on
/// the blocking pool while the calling task is suspended.
pub struct SqliteHandle {
    id: HandleId,
    session: Arc<Mutex<Connection>>,
    active: Arc<AtomicBool>,
}

impl SqliteHandle {
    /// Runs `operation` against the open transaction.
    ///
    /// # Errors
    /// - Returns an operational error when the handle is already resolved.
    /// - Returns whatever `operation` returns otherwise.
    pub async fn run<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StorageError> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        let active = Arc::clone(&self.active);
        let id = self.id;
        tokio::task::spawn_blocking(move || {
            let conn = lock_session(&session);
            if !active.load(Ordering::SeqCst) {
                return Err(E::from(resolved_error(id)));
            }
            operation(&conn)
        })
        .await
        .map_err(|err| E::from(StorageError::operational(format!("statement task failed: {err}"))))?
    }

    /// Executes one statement and returns the number of changed rows.
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<rusqlite::types::Value>,
    ) -> StorageResult<usize> {
        let sql = sql.into();
        self.run(move |conn| {
            conn.execute(&sql, rusqlite::params_from_iter(params))
                .map_err(StorageError::from)
        })
        .await
    }

    async fn finish(&mut self, statement: &'static str) -> StorageResult<()> {
        let session = Arc::clone(&self.session);
        let active = Arc::clone(&self.active);
        let id = self.id;
        tokio::task::spawn_blocking(move || {
            let conn = lock_session(&session);
            if !active.load(Ordering::SeqCst) {
                return Err(resolved_error(id));
            }
            let result = conn.execute_batch(statement);
            if result.is_err() && !conn.is_autocommit() {
                // A failed COMMIT can leave the transaction open.
                if let Err(err) = conn.execute_batch("ROLLBACK;") {
                    warn!(
                        "event=tx_rollback module=storage status=error handle={} error={}",
                        id, err
                    );
                }
            }
            active.store(false, Ordering::SeqCst);
            result.map_err(StorageError::from)
        })
        .await
        .map_err(|err| StorageError::operational(format!("{statement} task failed: {err}")))?
    }

    fn defer_rollback(&self) {
        let session = Arc::clone(&self.session);
        let active = Arc::clone(&self.active);
        let id = self.id;
        let job = move || {
            let conn = lock_session(&session);
            match rollback_locked(&conn, &active) {
                Ok(()) => debug!(
                    "event=tx_rollback module=storage status=ok mode=deferred handle={}",
                    id
                ),
                Err(err) => warn!(
                    "event=tx_rollback module=storage status=error mode=deferred handle={} error={}",
                    id, err
                ),
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => drop(runtime.spawn_blocking(job)),
            Err(_) => drop(std::thread::spawn(job)),
        }
    }
}

impl TransactionHandle for SqliteHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn commit(&mut self) -> impl Future<Output = StorageResult<()>> + Send {
        self.finish("COMMIT;")
    }

    fn rollback(&mut self) -> impl Future<Output = StorageResult<()>> + Send {
        self.finish("ROLLBACK;")
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn rollback_detached(&mut self) -> StorageResult<()> {
        if !self.is_active() {
            return Ok(());
        }
        match self.session.try_lock() {
            Ok(conn) => rollback_locked(&conn, &self.active),
            Err(TryLockError::Poisoned(poisoned)) => {
                rollback_locked(&poisoned.into_inner(), &self.active)
            }
            Err(TryLockError::WouldBlock) => {
                debug!(
                    "event=tx_rollback module=storage status=deferred handle={}",
                    self.id
                );
                self.defer_rollback();
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for SqliteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// Caller holds the session lock.
fn rollback_locked(conn: &Connection, active: &AtomicBool) -> StorageResult<()> {
    if !active.swap(false, Ordering::SeqCst) || conn.is_autocommit() {
        return Ok(());
    }
    conn.execute_batch("ROLLBACK;")?;
    Ok(())
}

// A panic inside a statement closure cannot leave the session half-updated:
// `active` is only written after the statement returns.
fn lock_session(session: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn resolved_error(id: HandleId) -> StorageError {
    StorageError::operational(format!("transaction handle {id} is already resolved"))
}

#[cfg(test)]
mod tests {
    use super::SqliteResource;
    use crate::storage::{StorageError, TransactionHandle, TransactionalResource};
    use std::sync::Arc;
    use std::time::Duration;

    fn resource(dir: &tempfile::TempDir) -> SqliteResource {
        SqliteResource::open(dir.path().join("txguard.db")).unwrap()
    }

    async fn organization_count(resource: &SqliteResource) -> i64 {
        let mut handle = resource.begin().await.unwrap();
        let count = handle
            .run(|conn| {
                conn.query_row("SELECT COUNT(*) FROM organizations;", [], |row| row.get(0))
                    .map_err(StorageError::from)
            })
            .await
            .unwrap();
        handle.rollback().await.unwrap();
        count
    }

    async fn insert_organization(handle: &super::SqliteHandle, name: &str) {
        let name = name.to_string();
        handle
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO organizations (uuid, name) VALUES (?1, ?2);",
                    rusqlite::params![uuid::Uuid::new_v4().to_string(), name],
                )
                .map_err(StorageError::from)
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn commit_makes_writes_visible() {
        let dir = tempfile::tempdir().unwrap();
        let resource = resource(&dir);

        let mut handle = resource.begin().await.unwrap();
        insert_organization(&handle, "acme").await;
        handle.commit().await.unwrap();

        assert!(!handle.is_active());
        assert_eq!(organization_count(&resource).await, 1);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let dir = tempfile::tempdir().unwrap();
        let resource = resource(&dir);

        let mut handle = resource.begin().await.unwrap();
        insert_organization(&handle, "acme").await;
        handle.rollback().await.unwrap();

        assert_eq!(organization_count(&resource).await, 0);
    }

    #[tokio::test]
    async fn resolved_handle_refuses_further_work() {
        let dir = tempfile::tempdir().unwrap();
        let resource = resource(&dir);

        let mut handle = resource.begin().await.unwrap();
        handle.commit().await.unwrap();

        let err = handle
            .execute("DELETE FROM organizations;", Vec::new())
            .await
            .unwrap_err();
        assert!(err.message().contains("already resolved"));
        assert!(handle.commit().await.is_err());
        handle.rollback_detached().unwrap();
    }

    #[tokio::test]
    async fn detached_rollback_on_idle_handle_runs_inline() {
        let dir = tempfile::tempdir().unwrap();
        let resource = resource(&dir);

        let mut handle = resource.begin().await.unwrap();
        insert_organization(&handle, "acme").await;
        handle.rollback_detached().unwrap();

        assert!(!handle.is_active());
        assert_eq!(organization_count(&resource).await, 0);
    }

    #[tokio::test]
    async fn detached_rollback_does_not_wait_for_busy_connection() {
        let dir = tempfile::tempdir().unwrap();
        let resource = resource(&dir);

        let mut handle = resource.begin().await.unwrap();
        insert_organization(&handle, "acme").await;

        // Stand-in for a statement still running on the blocking pool.
        let session = Arc::clone(&handle.session);
        let busy = session.lock().unwrap();
        handle.rollback_detached().unwrap();
        assert!(handle.is_active());
        drop(busy);

        for _ in 0..200 {
            if !handle.is_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!handle.is_active());
        assert_eq!(organization_count(&resource).await, 0);
    }
}
