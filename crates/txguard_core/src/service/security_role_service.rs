//! Security role use-case service.

use crate::atomic::{AtomicExecutor, BusinessConflict, OperationFailure, Outcome, RequestContext};
use crate::model::security_role::{full_permissions, NewSecurityRole, RoleType, SecurityRole};
use crate::repo::security_role_repo::SecurityRoleRepository;
use crate::storage::{SqliteHandle, SqliteResource};
use log::info;

pub const OWNER_ROLE: &str = "OWNER";
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Debug, Clone, Default)]
pub struct SecurityRoleService {
    executor: AtomicExecutor,
}

impl SecurityRoleService {
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// Creates one role. A taken name is a `Conflict`.
    pub async fn create_role(
        &self,
        ctx: &RequestContext<SqliteResource>,
        input: NewSecurityRole,
    ) -> Outcome<SecurityRole> {
        self.executor
            .execute_one(ctx, move |tx: &SqliteHandle| {
                Box::pin(async move {
                    let repo = SecurityRoleRepository::new(tx);
                    if repo.find_by_name(&input.name).await?.is_some() {
                        return Err(BusinessConflict::new(format!(
                            "Role with name '{}' already exists",
                            input.name
                        ))
                        .into());
                    }
                    let role = repo.create_role(&input).await?;
                    Ok::<_, OperationFailure>(role)
                })
            })
            .await
    }

    /// Seeds the built-in OWNER and ADMIN roles into an empty role table.
    ///
    /// Returns the roles created by this call; empty when any role existed.
    pub async fn seed_system_roles(
        &self,
        ctx: &RequestContext<SqliteResource>,
    ) -> Outcome<Vec<SecurityRole>> {
        let request_id = ctx.request_id().to_string();
        self.executor
            .execute_one(ctx, move |tx: &SqliteHandle| {
                Box::pin(async move {
                    let repo = SecurityRoleRepository::new(tx);
                    if !repo.list_roles().await?.is_empty() {
                        return Ok(Vec::new());
                    }

                    let mut created = Vec::with_capacity(2);
                    for (name, description) in [
                        (OWNER_ROLE, "Organization owner with full access"),
                        (ADMIN_ROLE, "Organization administrator"),
                    ] {
                        let role = NewSecurityRole {
                            name: name.to_string(),
                            description: Some(description.to_string()),
                            role_type: RoleType::System,
                            permissions: full_permissions(),
                        };
                        created.push(repo.create_role(&role).await?);
                    }
                    info!(
                        "event=roles_seed module=service status=ok request_id={} count={}",
                        request_id,
                        created.len()
                    );
                    Ok::<_, OperationFailure>(created)
                })
            })
            .await
    }
}
