//! Group administration.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use hivemesh_core::error::HivemeshResult;
use hivemesh_core::external::{AuthAuthority, AuthzRequest, IdProvider};
use hivemesh_core::models::group::{CreateGroup, Group, UpdateGroup};
use hivemesh_core::models::membership::GroupMembership;
use hivemesh_core::models::role::Role;
use hivemesh_core::repository::{
    GroupMembershipRepository, GroupRepository, MembershipCache, PaginatedResult, Pagination,
    ProfileRepository, ThingRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::error::ResourceError;
use crate::memberships::MembershipRegistry;

/// Page used when every row of a group is needed. The limit stays within
/// a signed 64-bit SQL `LIMIT`.
pub(crate) const ALL: Pagination = Pagination {
    offset: 0,
    limit: i64::MAX as u64,
};

pub struct GroupRegistry<B: Backend> {
    backend: Arc<B>,
    gate: AccessGate<B>,
    memberships: MembershipRegistry<B>,
}

impl<B: Backend> Clone for GroupRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
            memberships: self.memberships.clone(),
        }
    }
}

impl<B: Backend> GroupRegistry<B> {
    pub fn new(backend: Arc<B>, gate: AccessGate<B>, memberships: MembershipRegistry<B>) -> Self {
        Self {
            backend,
            gate,
            memberships,
        }
    }

    /// Create groups in an organization. The caller becomes Owner of each.
    pub async fn create_groups(
        &self,
        token: &str,
        org_id: Uuid,
        inputs: Vec<CreateGroup>,
    ) -> HivemeshResult<Vec<Group>> {
        if inputs.iter().any(|g| g.name.trim().is_empty()) {
            return Err(ResourceError::EmptyName("group").into());
        }

        let auth = self.backend.auth();
        auth.authorize(token, AuthzRequest::org(org_id, Role::Editor))
            .await?;
        let owner_id = auth.identify(token).await?;

        let now = Utc::now();
        let mut groups = Vec::with_capacity(inputs.len());
        for input in inputs {
            groups.push(Group {
                id: self.backend.ids().new_id()?,
                org_id,
                name: input.name,
                description: input.description,
                metadata: input
                    .metadata
                    .unwrap_or(serde_json::Value::Object(Default::default())),
                created_at: now,
                updated_at: now,
            });
        }

        let groups = self.backend.groups().save(groups).await?;

        let owners = groups
            .iter()
            .map(|g| GroupMembership::new(g.id, owner_id, Role::Owner))
            .collect();
        self.memberships.save_memberships(owners).await?;

        for group in &groups {
            info!(group_id = %group.id, org_id = %org_id, "group created");
        }
        Ok(groups)
    }

    pub async fn update_group(
        &self,
        token: &str,
        group_id: Uuid,
        input: UpdateGroup,
    ) -> HivemeshResult<Group> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ResourceError::EmptyName("group").into());
        }

        self.gate
            .can_user_access_group(token, group_id, Role::Admin)
            .await?;

        let mut group = self.backend.groups().retrieve_by_id(group_id).await?;
        group.apply(input, Utc::now());
        self.backend.groups().update(group).await
    }

    pub async fn view_group(&self, token: &str, group_id: Uuid) -> HivemeshResult<Group> {
        self.gate
            .can_user_access_group(token, group_id, Role::Viewer)
            .await?;
        self.backend.groups().retrieve_by_id(group_id).await
    }

    pub async fn view_group_by_thing(&self, token: &str, thing_id: Uuid) -> HivemeshResult<Group> {
        let group_id = self.gate.hierarchy().group_id_by_thing(thing_id).await?;
        self.view_group(token, group_id).await
    }

    pub async fn view_group_by_profile(
        &self,
        token: &str,
        profile_id: Uuid,
    ) -> HivemeshResult<Group> {
        let group_id = self
            .gate
            .hierarchy()
            .group_id_by_profile(profile_id)
            .await?;
        self.view_group(token, group_id).await
    }

    /// Groups of an organization the caller can see.
    pub async fn list_groups_by_org(
        &self,
        token: &str,
        org_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Group>> {
        let ids = self.gate.hierarchy().group_ids_by_org(token, org_id).await?;
        if ids.is_empty() {
            return Ok(PaginatedResult::empty(pagination));
        }
        self.backend.groups().retrieve_by_ids(&ids, pagination).await
    }

    /// Remove groups the caller owns, together with everything under them.
    pub async fn remove_groups(&self, token: &str, group_ids: Vec<Uuid>) -> HivemeshResult<()> {
        let distinct: BTreeSet<Uuid> = group_ids.iter().copied().collect();
        for &group_id in &distinct {
            self.gate
                .can_user_access_group(token, group_id, Role::Owner)
                .await?;
        }

        let ids: Vec<Uuid> = distinct.into_iter().collect();
        let mut members = Vec::new();
        for &group_id in &ids {
            members.extend(self.backend.memberships().retrieve_by_group(group_id).await?);
        }
        let things = self
            .backend
            .things()
            .retrieve_by_group_ids(&ids, ALL)
            .await?
            .items;
        let profiles = self
            .backend
            .profiles()
            .retrieve_by_group_ids(&ids, ALL)
            .await?
            .items;

        self.backend.groups().remove(&ids).await?;

        let cache = self.backend.cache();
        for m in &members {
            cache.remove_group_membership(m.group_id, m.member_id).await?;
        }
        for thing in &things {
            cache.remove_group_by_thing(thing.id).await?;
        }
        for profile in &profiles {
            cache.remove_group_by_profile(profile.id).await?;
        }

        info!(count = ids.len(), "groups removed");
        Ok(())
    }
}
