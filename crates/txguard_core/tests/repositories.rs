use std::collections::BTreeMap;
use txguard_core::model::organization::{NewOrganization, OrganizationRole, OrganizationStatus};
use txguard_core::model::security_role::{NewSecurityRole, RoleType};
use txguard_core::repo::organization_repo::OrganizationRepository;
use txguard_core::repo::security_role_repo::SecurityRoleRepository;
use txguard_core::storage::{SqliteResource, StorageError, TransactionHandle, TransactionalResource};
use txguard_core::RepoError;
use uuid::Uuid;

fn open(dir: &tempfile::TempDir) -> SqliteResource {
    SqliteResource::open(dir.path().join("txguard.db")).unwrap()
}

#[tokio::test]
async fn organization_roundtrip_and_lookups() {
    let dir = tempfile::tempdir().unwrap();
    let resource = open(&dir);
    let mut handle = resource.begin().await.unwrap();
    let repo = OrganizationRepository::new(&handle);

    let mut input = NewOrganization::named("acme");
    input.description = Some("Rockets".to_string());
    input.is_personal = true;
    let created = repo.create_organization(&input).await.unwrap();

    assert_eq!(created.description.as_deref(), Some("Rockets"));
    assert!(created.is_personal);
    assert_eq!(created.status, OrganizationStatus::Active);
    assert_eq!(created.max_members, 100);
    assert!(created.created_at > 0);

    assert_eq!(
        repo.get_organization(created.uuid).await.unwrap(),
        Some(created.clone())
    );
    assert_eq!(
        repo.find_by_name("acme").await.unwrap().map(|org| org.uuid),
        Some(created.uuid)
    );
    assert_eq!(repo.find_by_name("globex").await.unwrap(), None);
    assert_eq!(repo.get_organization(Uuid::new_v4()).await.unwrap(), None);
    assert_eq!(repo.count_organizations().await.unwrap(), 1);

    handle.commit().await.unwrap();
}

#[tokio::test]
async fn members_are_listed_in_join_order() {
    let dir = tempfile::tempdir().unwrap();
    let resource = open(&dir);
    let mut handle = resource.begin().await.unwrap();
    let repo = OrganizationRepository::new(&handle);
    let organization = repo
        .create_organization(&NewOrganization::named("acme"))
        .await
        .unwrap();

    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    repo.add_member(organization.uuid, owner, OrganizationRole::Owner)
        .await
        .unwrap();
    repo.add_member(organization.uuid, viewer, OrganizationRole::Viewer)
        .await
        .unwrap();

    let members = repo.list_members(organization.uuid).await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .any(|member| member.user_uuid == owner && member.role == OrganizationRole::Owner));
    assert!(members
        .iter()
        .any(|member| member.user_uuid == viewer && member.role == OrganizationRole::Viewer));
    assert!(members
        .windows(2)
        .all(|pair| (pair[0].joined_at, pair[0].uuid) <= (pair[1].joined_at, pair[1].uuid)));

    handle.rollback().await.unwrap();
}

#[tokio::test]
async fn missing_organization_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let resource = open(&dir);
    let mut handle = resource.begin().await.unwrap();
    let missing = Uuid::new_v4();

    let err = OrganizationRepository::new(&handle)
        .require_organization(missing)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "organization",
            id
        } if id == missing
    ));

    handle.rollback().await.unwrap();
}

#[tokio::test]
async fn corrupted_status_is_rejected_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let resource = open(&dir);
    let mut handle = resource.begin().await.unwrap();
    let repo = OrganizationRepository::new(&handle);
    let organization = repo
        .create_organization(&NewOrganization::named("acme"))
        .await
        .unwrap();

    // Bypass the CHECK constraint to simulate state written by another tool.
    handle
        .run(|conn| {
            conn.execute_batch(
                "PRAGMA ignore_check_constraints = ON;
                 UPDATE organizations SET status = 'archived';
                 PRAGMA ignore_check_constraints = OFF;",
            )
            .map_err(StorageError::from)
        })
        .await
        .unwrap();

    let err = repo.get_organization(organization.uuid).await.unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("archived")));

    handle.rollback().await.unwrap();
}

#[tokio::test]
async fn roles_roundtrip_permissions_and_sort_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let resource = open(&dir);
    let mut handle = resource.begin().await.unwrap();
    let repo = SecurityRoleRepository::new(&handle);

    let mut permissions = BTreeMap::new();
    permissions.insert("agents".to_string(), vec!["read".to_string()]);
    for name in ["VIEWER", "AUDITOR"] {
        repo.create_role(&NewSecurityRole {
            name: name.to_string(),
            description: None,
            role_type: RoleType::Organization,
            permissions: permissions.clone(),
        })
        .await
        .unwrap();
    }

    let roles = repo.list_roles().await.unwrap();
    let names: Vec<&str> = roles.iter().map(|role| role.name.as_str()).collect();
    assert_eq!(names, vec!["AUDITOR", "VIEWER"]);

    let viewer = repo.find_by_name("VIEWER").await.unwrap().unwrap();
    assert_eq!(viewer.permissions, permissions);
    assert_eq!(viewer.role_type, RoleType::Organization);
    assert_eq!(repo.find_by_name("OWNER").await.unwrap(), None);

    handle.commit().await.unwrap();
}
