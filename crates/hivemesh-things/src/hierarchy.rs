//! Resolution of the group that owns a thing or profile.
//!
//! Every lookup consults the membership cache first and falls back to
//! storage on a miss or on a cache failure, repopulating the cache from
//! the storage answer.

use std::collections::HashSet;
use std::sync::Arc;

use hivemesh_core::error::HivemeshResult;
use hivemesh_core::external::{AuthAuthority, AuthzRequest};
use hivemesh_core::models::role::Role;
use hivemesh_core::repository::{
    GroupMembershipRepository, GroupRepository, MembershipCache, ProfileRepository,
    ThingRepository,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::Backend;

pub struct ResourceHierarchy<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> Clone for ResourceHierarchy<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: Backend> ResourceHierarchy<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Group owning the thing.
    pub async fn group_id_by_thing(&self, thing_id: Uuid) -> HivemeshResult<Uuid> {
        let cache = self.backend.cache();
        match cache.view_group_by_thing(thing_id).await {
            Ok(Some(group_id)) => {
                debug!(thing_id = %thing_id, "thing group cache hit");
                return Ok(group_id);
            }
            Ok(None) => debug!(thing_id = %thing_id, "thing group cache miss"),
            Err(e) => warn!(thing_id = %thing_id, error = %e, "cache unavailable, reading storage"),
        }

        let thing = self.backend.things().retrieve_by_id(thing_id).await?;
        if let Err(e) = cache.save_group_by_thing(thing_id, thing.group_id).await {
            warn!(thing_id = %thing_id, error = %e, "failed to repopulate thing group cache");
        }
        Ok(thing.group_id)
    }

    /// Group owning the profile.
    pub async fn group_id_by_profile(&self, profile_id: Uuid) -> HivemeshResult<Uuid> {
        let cache = self.backend.cache();
        match cache.view_group_by_profile(profile_id).await {
            Ok(Some(group_id)) => {
                debug!(profile_id = %profile_id, "profile group cache hit");
                return Ok(group_id);
            }
            Ok(None) => debug!(profile_id = %profile_id, "profile group cache miss"),
            Err(e) => {
                warn!(profile_id = %profile_id, error = %e, "cache unavailable, reading storage")
            }
        }

        let profile = self.backend.profiles().retrieve_by_id(profile_id).await?;
        if let Err(e) = cache.save_group_by_profile(profile_id, profile.group_id).await {
            warn!(profile_id = %profile_id, error = %e, "failed to repopulate profile group cache");
        }
        Ok(profile.group_id)
    }

    /// Groups of an organization visible to the caller.
    ///
    /// The root principal sees every group of the organization. Anyone
    /// else must be a member of the organization and sees only the
    /// groups they hold a membership in.
    pub async fn group_ids_by_org(&self, token: &str, org_id: Uuid) -> HivemeshResult<Vec<Uuid>> {
        let groups = self.backend.groups();
        if self.is_root(token).await? {
            return groups.retrieve_ids_by_org(org_id).await;
        }

        let auth = self.backend.auth();
        auth.authorize(token, AuthzRequest::org(org_id, Role::Viewer))
            .await?;
        let member_id = auth.identify(token).await?;

        let org_groups = groups.retrieve_ids_by_org(org_id).await?;
        let member_groups: HashSet<Uuid> = self
            .group_ids_by_member(member_id)
            .await?
            .into_iter()
            .collect();

        Ok(org_groups
            .into_iter()
            .filter(|id| member_groups.contains(id))
            .collect())
    }

    /// Every group the member holds a membership in.
    pub async fn group_ids_by_member(&self, member_id: Uuid) -> HivemeshResult<Vec<Uuid>> {
        let cache = self.backend.cache();
        match cache.retrieve_group_ids_by_member(member_id).await {
            Ok(Some(ids)) => return Ok(ids),
            Ok(None) => {}
            Err(e) => warn!(member_id = %member_id, error = %e, "cache unavailable, reading storage"),
        }

        let ids = self
            .backend
            .memberships()
            .retrieve_group_ids_by_member(member_id)
            .await?;
        if let Err(e) = cache.save_group_ids_by_member(member_id, &ids).await {
            warn!(member_id = %member_id, error = %e, "failed to repopulate member groups cache");
        }
        Ok(ids)
    }

    /// Whether the credential belongs to the system root principal.
    ///
    /// A denial is a plain `false`; any other authority failure is
    /// propagated.
    pub async fn is_root(&self, token: &str) -> HivemeshResult<bool> {
        match self.backend.auth().authorize(token, AuthzRequest::Root).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_denied() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
