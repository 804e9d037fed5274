//! In-process implementation of the membership cache.

use std::collections::{HashMap, HashSet};

use hivemesh_core::error::HivemeshResult;
use hivemesh_core::models::role::Role;
use hivemesh_core::repository::MembershipCache;
use parking_lot::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Entries {
    roles: HashMap<(Uuid, Uuid), Role>,
    /// Only complete sets are stored; see `save_group_ids_by_member`.
    member_groups: HashMap<Uuid, HashSet<Uuid>>,
    thing_groups: HashMap<Uuid, Uuid>,
    profile_groups: HashMap<Uuid, Uuid>,
}

/// Membership cache held in process memory.
///
/// Suitable for single-node deployments and tests; a networked cache
/// implements the same trait for clustered ones.
#[derive(Default)]
pub struct InMemoryMembershipCache {
    entries: RwLock<Entries>,
}

impl InMemoryMembershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        *self.entries.write() = Entries::default();
    }
}

impl MembershipCache for InMemoryMembershipCache {
    async fn save_group_membership(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        role: Role,
    ) -> HivemeshResult<()> {
        let mut entries = self.entries.write();
        entries.roles.insert((group_id, member_id), role);
        if let Some(groups) = entries.member_groups.get_mut(&member_id) {
            groups.insert(group_id);
        }
        Ok(())
    }

    async fn view_role(&self, group_id: Uuid, member_id: Uuid) -> HivemeshResult<Option<Role>> {
        Ok(self.entries.read().roles.get(&(group_id, member_id)).copied())
    }

    async fn remove_group_membership(&self, group_id: Uuid, member_id: Uuid) -> HivemeshResult<()> {
        let mut entries = self.entries.write();
        entries.roles.remove(&(group_id, member_id));
        if let Some(groups) = entries.member_groups.get_mut(&member_id) {
            groups.remove(&group_id);
        }
        Ok(())
    }

    async fn retrieve_group_ids_by_member(
        &self,
        member_id: Uuid,
    ) -> HivemeshResult<Option<Vec<Uuid>>> {
        Ok(self
            .entries
            .read()
            .member_groups
            .get(&member_id)
            .map(|groups| groups.iter().copied().collect()))
    }

    async fn save_group_ids_by_member(
        &self,
        member_id: Uuid,
        group_ids: &[Uuid],
    ) -> HivemeshResult<()> {
        self.entries
            .write()
            .member_groups
            .insert(member_id, group_ids.iter().copied().collect());
        Ok(())
    }

    async fn save_group_by_thing(&self, thing_id: Uuid, group_id: Uuid) -> HivemeshResult<()> {
        self.entries.write().thing_groups.insert(thing_id, group_id);
        Ok(())
    }

    async fn view_group_by_thing(&self, thing_id: Uuid) -> HivemeshResult<Option<Uuid>> {
        Ok(self.entries.read().thing_groups.get(&thing_id).copied())
    }

    async fn remove_group_by_thing(&self, thing_id: Uuid) -> HivemeshResult<()> {
        self.entries.write().thing_groups.remove(&thing_id);
        Ok(())
    }

    async fn save_group_by_profile(&self, profile_id: Uuid, group_id: Uuid) -> HivemeshResult<()> {
        self.entries
            .write()
            .profile_groups
            .insert(profile_id, group_id);
        Ok(())
    }

    async fn view_group_by_profile(&self, profile_id: Uuid) -> HivemeshResult<Option<Uuid>> {
        Ok(self.entries.read().profile_groups.get(&profile_id).copied())
    }

    async fn remove_group_by_profile(&self, profile_id: Uuid) -> HivemeshResult<()> {
        self.entries.write().profile_groups.remove(&profile_id);
        Ok(())
    }
}
