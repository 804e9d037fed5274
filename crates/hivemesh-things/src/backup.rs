//! Root-only export and import of the whole things dataset.

use std::sync::Arc;

use hivemesh_core::error::HivemeshResult;
use hivemesh_core::models::group::Group;
use hivemesh_core::models::membership::GroupMembership;
use hivemesh_core::models::profile::Profile;
use hivemesh_core::models::thing::Thing;
use hivemesh_core::repository::{
    GroupMembershipRepository, GroupRepository, MembershipCache, ProfileRepository,
    ThingRepository,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::error::ResourceError;

/// Snapshot of every group and the resources it owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Backup {
    pub groups: Vec<Group>,
    pub things: Vec<Thing>,
    pub profiles: Vec<Profile>,
    pub group_memberships: Vec<GroupMembership>,
}

pub struct BackupService<B: Backend> {
    backend: Arc<B>,
    gate: AccessGate<B>,
}

impl<B: Backend> Clone for BackupService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<B: Backend> BackupService<B> {
    pub fn new(backend: Arc<B>, gate: AccessGate<B>) -> Self {
        Self { backend, gate }
    }

    pub async fn backup(&self, token: &str) -> HivemeshResult<Backup> {
        self.require_root(token).await?;

        let backup = Backup {
            groups: self.backend.groups().retrieve_all().await?,
            things: self.backend.things().retrieve_all().await?,
            profiles: self.backend.profiles().retrieve_all().await?,
            group_memberships: self.backend.memberships().retrieve_all().await?,
        };

        info!(
            groups = backup.groups.len(),
            things = backup.things.len(),
            profiles = backup.profiles.len(),
            memberships = backup.group_memberships.len(),
            "backup taken"
        );
        Ok(backup)
    }

    /// Load a snapshot into storage and warm the cache from it.
    ///
    /// Profiles go in before things so every thing finds its profile.
    pub async fn restore(&self, token: &str, backup: Backup) -> HivemeshResult<()> {
        self.require_root(token).await?;

        let Backup {
            groups,
            things,
            profiles,
            group_memberships,
        } = backup;
        let group_count = groups.len();

        let thing_groups: Vec<_> = things.iter().map(|t| (t.id, t.group_id)).collect();
        let profile_groups: Vec<_> = profiles.iter().map(|p| (p.id, p.group_id)).collect();
        let roles: Vec<_> = group_memberships
            .iter()
            .map(|m| (m.group_id, m.member_id, m.role))
            .collect();

        if !groups.is_empty() {
            self.backend.groups().save(groups).await?;
        }
        if !profiles.is_empty() {
            self.backend.profiles().save(profiles).await?;
        }
        if !things.is_empty() {
            self.backend.things().save(things).await?;
        }
        if !group_memberships.is_empty() {
            self.backend.memberships().save(group_memberships).await?;
        }

        let cache = self.backend.cache();
        for &(group_id, member_id, role) in &roles {
            cache.save_group_membership(group_id, member_id, role).await?;
        }
        for &(profile_id, group_id) in &profile_groups {
            cache.save_group_by_profile(profile_id, group_id).await?;
        }
        for &(thing_id, group_id) in &thing_groups {
            cache.save_group_by_thing(thing_id, group_id).await?;
        }

        info!(
            groups = group_count,
            things = thing_groups.len(),
            profiles = profile_groups.len(),
            memberships = roles.len(),
            "backup restored"
        );
        Ok(())
    }

    async fn require_root(&self, token: &str) -> HivemeshResult<()> {
        if !self.gate.is_root(token).await? {
            return Err(ResourceError::RootRequired.into());
        }
        Ok(())
    }
}
