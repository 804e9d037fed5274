//! Group membership administration.
//!
//! Every batch is validated as a whole before anything is written: the
//! caller's Admin access to each group, the requested roles, and the
//! *current* role of every target (Owner memberships cannot be changed
//! or removed through this path). The membership cache is updated after
//! each successful write and a failed cache write fails the operation.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use hivemesh_core::error::{HivemeshError, HivemeshResult};
use hivemesh_core::external::{AuthAuthority, UserDirectory};
use hivemesh_core::models::membership::GroupMembership;
use hivemesh_core::models::role::Role;
use hivemesh_core::repository::{
    GroupMembershipRepository, GroupRepository, MembershipCache, PaginatedResult, Pagination,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::config::ThingsConfig;
use crate::error::MembershipError;
use crate::notify::{Notification, NotificationQueue};

/// `(group, member)` pairs that passed validation, in request order.
struct CheckedTargets(Vec<(Uuid, Uuid)>);

pub struct MembershipRegistry<B: Backend> {
    backend: Arc<B>,
    gate: AccessGate<B>,
    queue: NotificationQueue,
    config: Arc<ThingsConfig>,
}

impl<B: Backend> Clone for MembershipRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
            queue: self.queue.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: Backend> MembershipRegistry<B> {
    pub fn new(
        backend: Arc<B>,
        gate: AccessGate<B>,
        queue: NotificationQueue,
        config: Arc<ThingsConfig>,
    ) -> Self {
        Self {
            backend,
            gate,
            queue,
            config,
        }
    }

    /// Add members to groups the caller administers.
    pub async fn create_group_memberships(
        &self,
        token: &str,
        memberships: Vec<GroupMembership>,
    ) -> HivemeshResult<()> {
        if memberships.is_empty() {
            return Ok(());
        }

        self.require_admin(token, &memberships).await?;
        if memberships.iter().any(|m| m.role.is_owner()) {
            return Err(MembershipError::OwnerNotAssignable.into());
        }
        check_unique(memberships.iter().map(|m| (m.group_id, m.member_id)))?;

        self.save_memberships(memberships.clone()).await?;

        if self.config.notify_new_members {
            self.notify_new_members(token, &memberships).await;
        }
        Ok(())
    }

    /// Change roles of existing, non-Owner memberships.
    pub async fn update_group_memberships(
        &self,
        token: &str,
        memberships: Vec<GroupMembership>,
    ) -> HivemeshResult<()> {
        if memberships.is_empty() {
            return Ok(());
        }

        self.require_admin(token, &memberships).await?;
        if memberships.iter().any(|m| m.role.is_owner()) {
            return Err(MembershipError::OwnerNotAssignable.into());
        }
        let targets = check_unique(memberships.iter().map(|m| (m.group_id, m.member_id)))?;
        self.require_not_owner(&targets).await?;

        self.backend.memberships().update(memberships.clone()).await?;

        let cache = self.backend.cache();
        for m in &memberships {
            cache
                .save_group_membership(m.group_id, m.member_id, m.role)
                .await?;
        }

        info!(count = memberships.len(), "group memberships updated");
        Ok(())
    }

    /// Remove non-Owner members from a group.
    pub async fn remove_group_memberships(
        &self,
        token: &str,
        group_id: Uuid,
        member_ids: Vec<Uuid>,
    ) -> HivemeshResult<()> {
        if member_ids.is_empty() {
            return Ok(());
        }

        self.gate
            .can_user_access_group(token, group_id, Role::Admin)
            .await?;
        let targets = check_unique(member_ids.iter().map(|&m| (group_id, m)))?;
        self.require_not_owner(&targets).await?;

        self.backend
            .memberships()
            .remove(group_id, &member_ids)
            .await?;

        let cache = self.backend.cache();
        for &member_id in &member_ids {
            cache.remove_group_membership(group_id, member_id).await?;
        }

        info!(group_id = %group_id, count = member_ids.len(), "group memberships removed");
        Ok(())
    }

    /// Members of a group with their emails, paged in directory order.
    pub async fn list_group_memberships(
        &self,
        token: &str,
        group_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<GroupMembership>> {
        self.gate
            .can_user_access_group(token, group_id, Role::Viewer)
            .await?;

        let memberships = self.backend.memberships().retrieve_by_group(group_id).await?;
        if memberships.is_empty() {
            return Ok(PaginatedResult::empty(pagination));
        }

        let roles: HashMap<Uuid, Role> = memberships
            .iter()
            .map(|m| (m.member_id, m.role))
            .collect();
        let ids: Vec<Uuid> = memberships.iter().map(|m| m.member_id).collect();

        let page = self
            .backend
            .users()
            .get_users_by_ids(&ids, pagination)
            .await?;

        let items = page
            .items
            .into_iter()
            .filter_map(|user| {
                roles.get(&user.id).map(|&role| GroupMembership {
                    group_id,
                    member_id: user.id,
                    email: user.email,
                    role,
                })
            })
            .collect();

        Ok(PaginatedResult {
            items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    /// Current role of a member, cache first.
    pub async fn role_of(&self, group_id: Uuid, member_id: Uuid) -> HivemeshResult<Role> {
        let cache = self.backend.cache();
        match cache.view_role(group_id, member_id).await {
            Ok(Some(role)) => return Ok(role),
            Ok(None) => debug!(group_id = %group_id, member_id = %member_id, "role cache miss"),
            Err(e) => warn!(
                group_id = %group_id,
                member_id = %member_id,
                error = %e,
                "cache unavailable, reading storage"
            ),
        }

        let role = self
            .backend
            .memberships()
            .retrieve_role(group_id, member_id)
            .await?;
        if let Err(e) = cache.save_group_membership(group_id, member_id, role).await {
            warn!(group_id = %group_id, member_id = %member_id, error = %e, "failed to repopulate role cache");
        }
        Ok(role)
    }

    /// Persist memberships and cache their roles without access checks.
    ///
    /// Used where access was established another way: the creator of a
    /// group, or the invitee of an accepted invite.
    pub(crate) async fn save_memberships(
        &self,
        memberships: Vec<GroupMembership>,
    ) -> HivemeshResult<()> {
        let pairs: Vec<(Uuid, Uuid, Role)> = memberships
            .iter()
            .map(|m| (m.group_id, m.member_id, m.role))
            .collect();

        self.backend.memberships().save(memberships).await?;

        let cache = self.backend.cache();
        for &(group_id, member_id, role) in &pairs {
            cache.save_group_membership(group_id, member_id, role).await?;
            info!(group_id = %group_id, member_id = %member_id, role = %role, "group membership created");
        }
        Ok(())
    }

    async fn require_admin(
        &self,
        token: &str,
        memberships: &[GroupMembership],
    ) -> HivemeshResult<()> {
        let groups: BTreeSet<Uuid> = memberships.iter().map(|m| m.group_id).collect();
        for group_id in groups {
            self.gate
                .can_user_access_group(token, group_id, Role::Admin)
                .await?;
        }
        Ok(())
    }

    async fn require_not_owner(&self, targets: &CheckedTargets) -> HivemeshResult<()> {
        for &(group_id, member_id) in &targets.0 {
            if self.role_of(group_id, member_id).await?.is_owner() {
                return Err(MembershipError::OwnerImmutable {
                    group_id,
                    member_id,
                }
                .into());
            }
        }
        Ok(())
    }

    async fn notify_new_members(&self, token: &str, memberships: &[GroupMembership]) {
        if let Err(e) = self.try_notify_new_members(token, memberships).await {
            warn!(error = %e, "failed to prepare membership notifications");
        }
    }

    async fn try_notify_new_members(
        &self,
        token: &str,
        memberships: &[GroupMembership],
    ) -> HivemeshResult<()> {
        let ids: Vec<Uuid> = memberships.iter().map(|m| m.member_id).collect();
        let page = Pagination {
            offset: 0,
            limit: ids.len() as u64,
        };
        let emails: HashMap<Uuid, String> = self
            .backend
            .users()
            .get_users_by_ids(&ids, page)
            .await?
            .items
            .into_iter()
            .map(|u| (u.id, u.email))
            .collect();

        let mut names: HashMap<Uuid, (String, String)> = HashMap::new();
        for m in memberships {
            let Some(email) = emails.get(&m.member_id) else {
                continue;
            };
            if !names.contains_key(&m.group_id) {
                let group = self.backend.groups().retrieve_by_id(m.group_id).await?;
                let org = self.backend.auth().view_org(token, group.org_id).await?;
                names.insert(m.group_id, (org.name, group.name));
            }
            let (org_name, group_name) = &names[&m.group_id];

            self.queue.dispatch(Notification::GroupMembership {
                to: vec![email.clone()],
                org_name: org_name.clone(),
                group_name: group_name.clone(),
                role: m.role,
            });
        }
        Ok(())
    }
}

fn check_unique(pairs: impl Iterator<Item = (Uuid, Uuid)>) -> HivemeshResult<CheckedTargets> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for (group_id, member_id) in pairs {
        if !seen.insert((group_id, member_id)) {
            return Err(HivemeshError::from(MembershipError::DuplicateTarget {
                group_id,
                member_id,
            }));
        }
        targets.push((group_id, member_id));
    }
    Ok(CheckedTargets(targets))
}
