//! Interfaces of the collaborators that live outside this core: the
//! authorization authority, the user directory, the notifier and the
//! identifier provider.

use uuid::Uuid;

use crate::error::HivemeshResult;
use crate::models::{
    invite::GroupInvite,
    organization::{OrgMembership, Organization},
    role::Role,
    user::User,
};
use crate::repository::{PaginatedResult, Pagination};

/// What a credential is being checked against.
///
/// The authority owns role ranking: `Owner` satisfies every action,
/// `Admin` satisfies `Admin`/`Editor`/`Viewer`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzRequest {
    /// The system root principal.
    Root,
    Group { group_id: Uuid, action: Role },
    Org { org_id: Uuid, action: Role },
}

impl AuthzRequest {
    pub fn group(group_id: Uuid, action: Role) -> Self {
        Self::Group { group_id, action }
    }

    pub fn org(org_id: Uuid, action: Role) -> Self {
        Self::Org { org_id, action }
    }
}

pub trait AuthAuthority: Send + Sync {
    /// `Ok(())` on allow, `AuthorizationDenied` on deny and
    /// `AuthenticationFailed` when the credential resolves to nobody.
    fn authorize(
        &self,
        token: &str,
        request: AuthzRequest,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Resolve a credential to a principal identifier.
    fn identify(&self, token: &str) -> impl Future<Output = HivemeshResult<Uuid>> + Send;
    fn view_org(
        &self,
        token: &str,
        org_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Organization>> + Send;
    /// `NotFound` when the member does not belong to the organization.
    fn view_org_membership(
        &self,
        token: &str,
        org_id: Uuid,
        member_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<OrgMembership>> + Send;
}

pub trait UserDirectory: Send + Sync {
    /// Page through the given users in the directory's own order.
    fn get_users_by_ids(
        &self,
        ids: &[Uuid],
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<User>>> + Send;
    /// Unknown emails are omitted from the result.
    fn get_users_by_emails(
        &self,
        emails: &[String],
    ) -> impl Future<Output = HivemeshResult<Vec<User>>> + Send;
}

/// Outbound notifications. Results are only logged by the core.
pub trait Notifier: Send + Sync + 'static {
    fn send_group_invite(
        &self,
        to: Vec<String>,
        invite: GroupInvite,
        org_name: String,
        redirect_path: String,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn send_group_membership_notification(
        &self,
        to: Vec<String>,
        org_name: String,
        group_name: String,
        role: Role,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
}

pub trait IdProvider: Send + Sync {
    fn new_id(&self) -> HivemeshResult<Uuid>;
}

/// Random (v4) identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn new_id(&self) -> HivemeshResult<Uuid> {
        Ok(Uuid::new_v4())
    }
}
