//! Organization use-case service.
//!
//! # Responsibility
//! - Create organizations together with their owner membership.
//! - Add users to existing organizations through a wrapped entry point.
//!
//! # Invariants
//! - Organization creation is all-or-nothing: no organization row survives
//!   without its owner membership.
//! - Organization names are unique among existing organizations.
//! - Membership never exceeds `max_members`.

use crate::atomic::{
    step, Atomic, AtomicExecutor, BoundaryError, BusinessConflict, OperationFailure, Outcome,
    RequestContext, StepFuture,
};
use crate::model::organization::{
    NewOrganization, Organization, OrganizationId, OrganizationMember, OrganizationRole, UserId,
};
use crate::repo::organization_repo::OrganizationRepository;
use crate::storage::{SqliteHandle, SqliteResource};
use log::debug;

/// Rule name reported with duplicate-name conflicts.
pub const UNIQUE_NAME_RULE: &str = "unique_organization_name";
/// Rule name reported when an organization is full.
pub const MEMBER_LIMIT_RULE: &str = "organization_member_limit";

/// Arguments of the add-member entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub organization: OrganizationId,
    pub user: UserId,
    pub role: OrganizationRole,
}

type MemberHandler =
    for<'a> fn(&'a SqliteHandle, Membership) -> StepFuture<'a, OrganizationMember>;

/// Organization service over a SQLite-backed request context.
#[derive(Clone)]
pub struct OrganizationService {
    executor: AtomicExecutor,
    add_member: Atomic<MemberHandler>,
}

impl std::fmt::Debug for OrganizationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationService")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl Default for OrganizationService {
    fn default() -> Self {
        Self::new(AtomicExecutor::default())
    }
}

impl OrganizationService {
    pub fn new(executor: AtomicExecutor) -> Self {
        let add_member = executor.wrap(add_member_step as MemberHandler);
        Self {
            executor,
            add_member,
        }
    }

    /// Creates `input` and makes `owner` its first member.
    ///
    /// Runs as two ordered steps in one atomic operation. A duplicate name is
    /// a `Conflict`; storage rejections roll back both steps.
    pub async fn create_organization(
        &self,
        ctx: &RequestContext<SqliteResource>,
        input: NewOrganization,
        owner: UserId,
    ) -> Outcome<Organization> {
        let steps = vec![
            step(move |tx: &SqliteHandle, _| {
                Box::pin(async move {
                    let repo = OrganizationRepository::new(tx);
                    if repo.find_by_name(&input.name).await?.is_some() {
                        return Err(BusinessConflict::new(format!(
                            "Organization with name '{}' already exists",
                            input.name
                        ))
                        .with_rule(UNIQUE_NAME_RULE)
                        .into());
                    }
                    let organization = repo.create_organization(&input).await?;
                    Ok::<_, OperationFailure>(organization)
                })
            }),
            step(move |tx: &SqliteHandle, previous: Option<Organization>| {
                Box::pin(async move {
                    let organization = previous.ok_or_else(|| {
                        OperationFailure::unexpected("owner step ran without an organization")
                    })?;
                    OrganizationRepository::new(tx)
                        .add_member(organization.uuid, owner, OrganizationRole::Owner)
                        .await?;
                    Ok::<_, OperationFailure>(organization)
                })
            }),
        ];

        let outcome = self.executor.execute_atomic(ctx, steps).await;
        if let Outcome::Success(organization) = &outcome {
            debug!(
                "event=organization_create module=service status=ok request_id={} organization={}",
                ctx.request_id(),
                organization.uuid
            );
        }
        outcome
    }

    /// Adds `membership.user` to an existing organization.
    ///
    /// # Errors
    /// - `404` when the organization does not exist.
    /// - `409` when the organization is full or the user is already a member.
    pub async fn add_user_to_organization(
        &self,
        ctx: &RequestContext<SqliteResource>,
        membership: Membership,
    ) -> Result<OrganizationMember, BoundaryError> {
        self.add_member.call(ctx, membership).await
    }
}

fn add_member_step(
    tx: &SqliteHandle,
    membership: Membership,
) -> StepFuture<'_, OrganizationMember> {
    Box::pin(async move {
        let repo = OrganizationRepository::new(tx);
        let organization = repo.require_organization(membership.organization).await?;
        let members = repo.list_members(organization.uuid).await?;
        if members.len() as i64 >= organization.max_members {
            return Err(BusinessConflict::new(format!(
                "Organization '{}' has reached its member limit",
                organization.name
            ))
            .with_rule(MEMBER_LIMIT_RULE)
            .into());
        }
        let member = repo
            .add_member(organization.uuid, membership.user, membership.role)
            .await?;
        Ok::<_, OperationFailure>(member)
    })
}
