use rusqlite::types::Value;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use txguard_core::atomic::report::{INFRASTRUCTURE_MESSAGE, INTEGRITY_MESSAGE, MALFORMED_MESSAGE};
use txguard_core::atomic::{atomic, AtomicExecutor, BoundaryError, OperationFailure, RequestContext, StepFuture};
use txguard_core::model::organization::{NewOrganization, Organization};
use txguard_core::repo::organization_repo::OrganizationRepository;
use txguard_core::storage::{SqliteHandle, SqliteResource};
use uuid::Uuid;

fn context(dir: &tempfile::TempDir, request_id: &str) -> RequestContext<SqliteResource> {
    let resource = SqliteResource::open(dir.path().join("txguard.db")).unwrap();
    RequestContext::new(request_id, Arc::new(resource))
}

fn organization_count(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM organizations;", [], |row| row.get(0))
        .unwrap()
}

fn create_named(tx: &SqliteHandle, input: NewOrganization) -> StepFuture<'_, Organization> {
    Box::pin(async move {
        let organization = OrganizationRepository::new(tx).create_organization(&input).await?;
        Ok::<_, OperationFailure>(organization)
    })
}

fn insert_raw(tx: &SqliteHandle, max_members: Value) -> StepFuture<'_, usize> {
    Box::pin(async move {
        let changed = tx
            .execute(
                "INSERT INTO organizations (uuid, name, max_members) VALUES (?1, ?2, ?3);",
                vec![
                    Value::Text(Uuid::new_v4().to_string()),
                    Value::Text("raw".to_string()),
                    max_members,
                ],
            )
            .await?;
        Ok::<_, OperationFailure>(changed)
    })
}

fn require_owner_access(tx: &SqliteHandle, user: Uuid) -> StepFuture<'_, ()> {
    Box::pin(async move {
        OrganizationRepository::new(tx)
            .create_organization(&NewOrganization::named("shadow"))
            .await?;
        Err::<(), _>(OperationFailure::from(
            BoundaryError::forbidden(format!("user {user} is not an owner"))
                .with_detail("role=viewer"),
        ))
    })
}

fn sleepy(tx: &SqliteHandle, delay: Duration) -> StepFuture<'_, ()> {
    Box::pin(async move {
        OrganizationRepository::new(tx)
            .create_organization(&NewOrganization::named("slow"))
            .await?;
        tokio::time::sleep(delay).await;
        Ok::<_, OperationFailure>(())
    })
}

#[tokio::test]
async fn wrapped_handler_keeps_arguments_and_return_value() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, "req-wrap-ok");
    let create = atomic(create_named);

    let organization = create
        .call(&ctx, NewOrganization::named("acme"))
        .await
        .unwrap();

    assert_eq!(organization.name, "acme");
    assert_eq!(organization_count(ctx.resource().path()), 1);
}

#[tokio::test]
async fn wrapped_handler_can_be_called_repeatedly() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, "req-wrap-many");
    let create = atomic(create_named);

    for name in ["acme", "globex"] {
        create.call(&ctx, NewOrganization::named(name)).await.unwrap();
    }

    assert_eq!(organization_count(ctx.resource().path()), 2);
    assert!(!ctx.in_atomic());
}

#[tokio::test]
async fn boundary_failure_is_rethrown_unchanged_and_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, "req-wrap-forbidden");
    let user = Uuid::new_v4();

    let err = atomic(require_owner_access)
        .call(&ctx, user)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BoundaryError::forbidden(format!("user {user} is not an owner")).with_detail("role=viewer")
    );
    assert_eq!(organization_count(ctx.resource().path()), 0);
}

#[tokio::test]
async fn check_constraint_becomes_generic_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, "req-wrap-check");

    let err = atomic(insert_raw)
        .call(&ctx, Value::Integer(0))
        .await
        .unwrap_err();

    assert_eq!(err.status_code, 409);
    assert_eq!(err.message, INTEGRITY_MESSAGE);
    assert_eq!(err.detail, None);
    assert_eq!(organization_count(ctx.resource().path()), 0);
}

#[tokio::test]
async fn wrong_value_type_becomes_malformed_error_with_detail() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, "req-wrap-malformed");

    let err = atomic(insert_raw)
        .call(&ctx, Value::Text("plenty".to_string()))
        .await
        .unwrap_err();

    assert_eq!(err.status_code, 400);
    assert_eq!(err.message, MALFORMED_MESSAGE);
    assert!(err.detail.is_some());
    assert_eq!(organization_count(ctx.resource().path()), 0);
}

#[tokio::test]
async fn executor_time_limit_applies_to_wrapped_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&dir, "req-wrap-timeout");
    let slow = AtomicExecutor::new()
        .with_timeout(Duration::from_millis(50))
        .wrap(sleepy);

    let err = slow.call(&ctx, Duration::from_secs(30)).await.unwrap_err();

    assert_eq!(err.status_code, 500);
    assert_eq!(err.message, INFRASTRUCTURE_MESSAGE);
    assert_eq!(err.detail, None);
    assert_eq!(organization_count(ctx.resource().path()), 0);
}
