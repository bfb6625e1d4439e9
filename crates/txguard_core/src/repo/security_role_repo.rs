//! Security role repository.

use super::{parse_uuid, RepoError, RepoResult};
use crate::model::security_role::{NewSecurityRole, Permissions, RoleType, SecurityRole};
use crate::storage::SqliteHandle;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ROLE_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    status,
    role_type,
    permissions
FROM security_roles";

pub struct SecurityRoleRepository<'h> {
    handle: &'h SqliteHandle,
}

impl<'h> SecurityRoleRepository<'h> {
    pub fn new(handle: &'h SqliteHandle) -> Self {
        Self { handle }
    }

    /// Inserts one role. Role names are globally unique at storage level.
    pub async fn create_role(&self, input: &NewSecurityRole) -> RepoResult<SecurityRole> {
        let uuid = Uuid::new_v4();
        let permissions = serde_json::to_string(&input.permissions)
            .map_err(|err| RepoError::InvalidData(format!("unserializable permissions: {err}")))?;
        let input = input.clone();
        self.handle
            .run(move |conn| -> RepoResult<SecurityRole> {
                conn.execute(
                    "INSERT INTO security_roles (
                        uuid,
                        name,
                        description,
                        role_type,
                        permissions
                    ) VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        uuid.to_string(),
                        input.name,
                        input.description,
                        input.role_type.as_db(),
                        permissions,
                    ],
                )?;
                query_one(conn, "uuid", uuid.to_string())?.ok_or(RepoError::NotFound {
                    entity: "security role",
                    id: uuid,
                })
            })
            .await
    }

    pub async fn find_by_name(&self, name: &str) -> RepoResult<Option<SecurityRole>> {
        let name = name.to_string();
        self.handle
            .run(move |conn| query_one(conn, "name", name))
            .await
    }

    /// Lists roles ordered by name.
    pub async fn list_roles(&self) -> RepoResult<Vec<SecurityRole>> {
        self.handle
            .run(|conn| -> RepoResult<Vec<SecurityRole>> {
                let mut stmt = conn.prepare(&format!("{ROLE_SELECT_SQL} ORDER BY name ASC;"))?;
                let mut rows = stmt.query([])?;
                let mut roles = Vec::new();
                while let Some(row) = rows.next()? {
                    roles.push(parse_role_row(row)?);
                }
                Ok(roles)
            })
            .await
    }
}

fn query_one(
    conn: &Connection,
    column: &'static str,
    value: String,
) -> RepoResult<Option<SecurityRole>> {
    conn.query_row(
        &format!("{ROLE_SELECT_SQL} WHERE {column} = ?1;"),
        [value],
        |row| Ok(parse_role_row(row)),
    )
    .optional()?
    .transpose()
}

fn parse_role_row(row: &Row<'_>) -> RepoResult<SecurityRole> {
    let uuid_text: String = row.get("uuid")?;
    let type_text: String = row.get("role_type")?;
    let role_type = RoleType::from_db(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid role type `{type_text}` in security_roles.role_type"
        ))
    })?;
    let permissions_text: String = row.get("permissions")?;
    let permissions: Permissions = serde_json::from_str(&permissions_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid permissions in security_roles.permissions: {err}"))
    })?;

    Ok(SecurityRole {
        uuid: parse_uuid(&uuid_text, "security_roles.uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status: row.get("status")?,
        role_type,
        permissions,
    })
}
