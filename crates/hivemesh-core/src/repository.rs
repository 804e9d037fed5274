//! Repository and cache trait definitions for data access abstraction.
//!
//! All operations are async. Storage adapters implement the repository
//! traits; the membership cache is a separate, best-effort store that is
//! never treated as a source of truth.

use uuid::Uuid;

use crate::error::HivemeshResult;
use crate::models::{
    group::Group,
    invite::{GroupInvite, InviteState, InviteUserType},
    membership::GroupMembership,
    profile::Profile,
    role::Role,
    thing::{Thing, ThingKey},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn empty(pagination: Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            offset: pagination.offset,
            limit: pagination.limit,
        }
    }

    /// Transform the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Groups and the resources they own
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    fn save(&self, groups: Vec<Group>) -> impl Future<Output = HivemeshResult<Vec<Group>>> + Send;
    fn update(&self, group: Group) -> impl Future<Output = HivemeshResult<Group>> + Send;
    fn retrieve_by_id(&self, id: Uuid) -> impl Future<Output = HivemeshResult<Group>> + Send;
    fn retrieve_by_ids(
        &self,
        ids: &[Uuid],
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<Group>>> + Send;
    /// Identifiers of every group owned by the organization.
    fn retrieve_ids_by_org(
        &self,
        org_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Vec<Uuid>>> + Send;
    /// Removing a group cascades to its things, profiles, memberships
    /// and invites.
    fn remove(&self, ids: &[Uuid]) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Bulk dump used by backups.
    fn retrieve_all(&self) -> impl Future<Output = HivemeshResult<Vec<Group>>> + Send;
}

pub trait ThingRepository: Send + Sync {
    /// Persist new things. Duplicate keys are a `Conflict`.
    fn save(&self, things: Vec<Thing>) -> impl Future<Output = HivemeshResult<Vec<Thing>>> + Send;
    /// Overwrite name, metadata, group and profile of an existing thing.
    fn update(&self, thing: Thing) -> impl Future<Output = HivemeshResult<Thing>> + Send;
    /// Set or clear the external key. A key held by another thing is a
    /// `Conflict`.
    fn update_external_key(
        &self,
        id: Uuid,
        external_key: Option<String>,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn retrieve_by_id(&self, id: Uuid) -> impl Future<Output = HivemeshResult<Thing>> + Send;
    fn retrieve_by_key(
        &self,
        key: &ThingKey,
    ) -> impl Future<Output = HivemeshResult<Thing>> + Send;
    fn retrieve_by_group_ids(
        &self,
        group_ids: &[Uuid],
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<Thing>>> + Send;
    fn retrieve_by_profile(
        &self,
        profile_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<Thing>>> + Send;
    fn remove(&self, ids: &[Uuid]) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn retrieve_all(&self) -> impl Future<Output = HivemeshResult<Vec<Thing>>> + Send;
}

pub trait ProfileRepository: Send + Sync {
    fn save(
        &self,
        profiles: Vec<Profile>,
    ) -> impl Future<Output = HivemeshResult<Vec<Profile>>> + Send;
    fn update(&self, profile: Profile) -> impl Future<Output = HivemeshResult<Profile>> + Send;
    fn retrieve_by_id(&self, id: Uuid) -> impl Future<Output = HivemeshResult<Profile>> + Send;
    fn retrieve_by_group_ids(
        &self,
        group_ids: &[Uuid],
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<Profile>>> + Send;
    fn remove(&self, ids: &[Uuid]) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn retrieve_all(&self) -> impl Future<Output = HivemeshResult<Vec<Profile>>> + Send;
}

// ---------------------------------------------------------------------------
// Memberships & invites
// ---------------------------------------------------------------------------

pub trait GroupMembershipRepository: Send + Sync {
    /// Persist new memberships. An existing `(group, member)` pair is a
    /// `Conflict`.
    fn save(
        &self,
        memberships: Vec<GroupMembership>,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Change roles of existing memberships. Missing pairs are `NotFound`.
    fn update(
        &self,
        memberships: Vec<GroupMembership>,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn remove(
        &self,
        group_id: Uuid,
        member_ids: &[Uuid],
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Current role of a member, `NotFound` when there is no membership.
    fn retrieve_role(
        &self,
        group_id: Uuid,
        member_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Role>> + Send;
    fn retrieve_by_group(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Vec<GroupMembership>>> + Send;
    fn retrieve_group_ids_by_member(
        &self,
        member_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Vec<Uuid>>> + Send;
    fn retrieve_all(&self) -> impl Future<Output = HivemeshResult<Vec<GroupMembership>>> + Send;
}

pub trait GroupInviteRepository: Send + Sync {
    fn save(&self, invites: Vec<GroupInvite>) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn retrieve_by_id(&self, id: Uuid) -> impl Future<Output = HivemeshResult<GroupInvite>> + Send;
    /// Invites still stored as `Pending` for the pair, expired or not.
    fn retrieve_pending(
        &self,
        group_id: Uuid,
        invitee_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Vec<GroupInvite>>> + Send;
    fn retrieve_by_user(
        &self,
        user_type: InviteUserType,
        user_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<GroupInvite>>> + Send;
    fn retrieve_by_group(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = HivemeshResult<PaginatedResult<GroupInvite>>> + Send;
    fn update_state(
        &self,
        id: Uuid,
        state: InviteState,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Link dormant group invites to the organization invite that will
    /// activate them.
    fn save_dormant_relations(
        &self,
        org_invite_id: Uuid,
        invite_ids: &[Uuid],
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Assign the invitee and new expiry to every dormant invite linked to
    /// the organization invite, returning the invites as they are after
    /// activation.
    fn activate(
        &self,
        org_invite_id: Uuid,
        invitee_id: Uuid,
        invitee_email: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> impl Future<Output = HivemeshResult<Vec<GroupInvite>>> + Send;
}

// ---------------------------------------------------------------------------
// Membership cache (best-effort, never authoritative)
// ---------------------------------------------------------------------------

/// Lookup/store surface of the membership cache.
///
/// Reads return `Ok(None)` on a miss and `Err` when the cache itself is
/// unavailable; callers treat both as "ask storage".
pub trait MembershipCache: Send + Sync {
    fn save_group_membership(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        role: Role,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn view_role(
        &self,
        group_id: Uuid,
        member_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Option<Role>>> + Send;
    fn remove_group_membership(
        &self,
        group_id: Uuid,
        member_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    /// Complete set of a member's groups, if one has been cached.
    fn retrieve_group_ids_by_member(
        &self,
        member_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Option<Vec<Uuid>>>> + Send;
    fn save_group_ids_by_member(
        &self,
        member_id: Uuid,
        group_ids: &[Uuid],
    ) -> impl Future<Output = HivemeshResult<()>> + Send;

    fn save_group_by_thing(
        &self,
        thing_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn view_group_by_thing(
        &self,
        thing_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Option<Uuid>>> + Send;
    fn remove_group_by_thing(&self, thing_id: Uuid)
    -> impl Future<Output = HivemeshResult<()>> + Send;

    fn save_group_by_profile(
        &self,
        profile_id: Uuid,
        group_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
    fn view_group_by_profile(
        &self,
        profile_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<Option<Uuid>>> + Send;
    fn remove_group_by_profile(
        &self,
        profile_id: Uuid,
    ) -> impl Future<Output = HivemeshResult<()>> + Send;
}
