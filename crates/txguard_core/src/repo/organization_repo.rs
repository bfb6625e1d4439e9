//! Organization and membership repository.

use super::{bool_to_int, parse_uuid, RepoError, RepoResult};
use crate::model::organization::{
    NewOrganization, Organization, OrganizationId, OrganizationMember, OrganizationRole,
    OrganizationStatus, UserId,
};
use crate::storage::SqliteHandle;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ORGANIZATION_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    is_personal,
    status,
    max_members,
    created_at
FROM organizations";

const MEMBER_SELECT_SQL: &str = "SELECT
    uuid,
    organization_uuid,
    user_uuid,
    role,
    joined_at
FROM organization_users";

/// Organization repository bound to one open unit of work.
pub struct OrganizationRepository<'h> {
    handle: &'h SqliteHandle,
}

impl<'h> OrganizationRepository<'h> {
    pub fn new(handle: &'h SqliteHandle) -> Self {
        Self { handle }
    }

    /// Inserts one organization and reads it back.
    pub async fn create_organization(&self, input: &NewOrganization) -> RepoResult<Organization> {
        let uuid = Uuid::new_v4();
        let input = input.clone();
        self.handle
            .run(move |conn| -> RepoResult<Organization> {
                conn.execute(
                    "INSERT INTO organizations (
                        uuid,
                        name,
                        description,
                        is_personal,
                        max_members
                    ) VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        uuid.to_string(),
                        input.name,
                        input.description,
                        bool_to_int(input.is_personal),
                        input.max_members,
                    ],
                )?;
                load_organization(conn, uuid)?.ok_or(RepoError::NotFound {
                    entity: "organization",
                    id: uuid,
                })
            })
            .await
    }

    pub async fn get_organization(&self, id: OrganizationId) -> RepoResult<Option<Organization>> {
        self.handle.run(move |conn| load_organization(conn, id)).await
    }

    /// Loads an organization or fails with `NotFound`.
    pub async fn require_organization(&self, id: OrganizationId) -> RepoResult<Organization> {
        self.get_organization(id)
            .await?
            .ok_or(RepoError::NotFound {
                entity: "organization",
                id,
            })
    }

    pub async fn find_by_name(&self, name: &str) -> RepoResult<Option<Organization>> {
        let name = name.to_string();
        self.handle
            .run(move |conn| -> RepoResult<Option<Organization>> {
                conn.query_row(
                    &format!("{ORGANIZATION_SELECT_SQL} WHERE name = ?1 LIMIT 1;"),
                    [name],
                    |row| Ok(parse_organization_row(row)),
                )
                .optional()?
                .transpose()
            })
            .await
    }

    pub async fn count_organizations(&self) -> RepoResult<i64> {
        self.handle
            .run(|conn| -> RepoResult<i64> {
                let count = conn.query_row("SELECT COUNT(*) FROM organizations;", [], |row| {
                    row.get(0)
                })?;
                Ok(count)
            })
            .await
    }

    /// Adds `user` to `organization` with `role`.
    ///
    /// A duplicate membership surfaces as a unique constraint violation.
    pub async fn add_member(
        &self,
        organization: OrganizationId,
        user: UserId,
        role: OrganizationRole,
    ) -> RepoResult<OrganizationMember> {
        let uuid = Uuid::new_v4();
        self.handle
            .run(move |conn| -> RepoResult<OrganizationMember> {
                conn.execute(
                    "INSERT INTO organization_users (
                        uuid,
                        organization_uuid,
                        user_uuid,
                        role
                    ) VALUES (?1, ?2, ?3, ?4);",
                    params![
                        uuid.to_string(),
                        organization.to_string(),
                        user.to_string(),
                        role.as_db(),
                    ],
                )?;
                let member = conn
                    .query_row(
                        &format!("{MEMBER_SELECT_SQL} WHERE uuid = ?1;"),
                        [uuid.to_string()],
                        |row| Ok(parse_member_row(row)),
                    )
                    .optional()?
                    .transpose()?;
                member.ok_or(RepoError::NotFound {
                    entity: "organization member",
                    id: uuid,
                })
            })
            .await
    }

    /// Lists members ordered by join time, then id.
    pub async fn list_members(
        &self,
        organization: OrganizationId,
    ) -> RepoResult<Vec<OrganizationMember>> {
        self.handle
            .run(move |conn| -> RepoResult<Vec<OrganizationMember>> {
                let mut stmt = conn.prepare(&format!(
                    "{MEMBER_SELECT_SQL}
                     WHERE organization_uuid = ?1
                     ORDER BY joined_at ASC, uuid ASC;"
                ))?;
                let mut rows = stmt.query([organization.to_string()])?;
                let mut members = Vec::new();
                while let Some(row) = rows.next()? {
                    members.push(parse_member_row(row)?);
                }
                Ok(members)
            })
            .await
    }
}

fn load_organization(conn: &Connection, id: OrganizationId) -> RepoResult<Option<Organization>> {
    let mut stmt = conn.prepare(&format!("{ORGANIZATION_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_organization_row(row)?));
    }
    Ok(None)
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    let uuid_text: String = row.get("uuid")?;
    let status_text: String = row.get("status")?;
    let status = OrganizationStatus::from_db(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in organizations.status"
        ))
    })?;

    Ok(Organization {
        uuid: parse_uuid(&uuid_text, "organizations.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        is_personal: row.get::<_, i64>("is_personal")? == 1,
        status,
        max_members: row.get("max_members")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<OrganizationMember> {
    let uuid_text: String = row.get("uuid")?;
    let organization_text: String = row.get("organization_uuid")?;
    let user_text: String = row.get("user_uuid")?;
    let role_text: String = row.get("role")?;
    let role = OrganizationRole::from_db(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid role `{role_text}` in organization_users.role"
        ))
    })?;

    Ok(OrganizationMember {
        uuid: parse_uuid(&uuid_text, "organization_users.uuid")?,
        organization_uuid: parse_uuid(&organization_text, "organization_users.organization_uuid")?,
        user_uuid: parse_uuid(&user_text, "organization_users.user_uuid")?,
        role,
        joined_at: row.get("joined_at")?,
    })
}
