//! Shared in-memory fixture for the integration tests.
//!
//! Repositories live in one `MemStore`. The fake authority reads group
//! roles straight from the stored memberships and ranks them
//! Viewer < Editor < Admin < Owner, the way the real authority does.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hivemesh_core::error::{HivemeshError, HivemeshResult};
use hivemesh_core::external::{
    AuthAuthority, AuthzRequest, Notifier, UserDirectory, UuidProvider,
};
use hivemesh_core::models::group::{CreateGroup, Group};
use hivemesh_core::models::invite::{GroupInvite, InviteState, InviteUserType, Invitee};
use hivemesh_core::models::membership::GroupMembership;
use hivemesh_core::models::organization::{OrgMembership, Organization};
use hivemesh_core::models::profile::{CreateProfile, Profile, ProfileConfig};
use hivemesh_core::models::role::Role;
use hivemesh_core::models::thing::{CreateThing, KeyKind, Thing, ThingKey};
use hivemesh_core::models::user::User;
use hivemesh_core::repository::{
    GroupInviteRepository, GroupMembershipRepository, GroupRepository, MembershipCache,
    PaginatedResult, Pagination, ProfileRepository, ThingRepository,
};
use hivemesh_things::{
    Backend, InMemoryMembershipCache, NotificationQueue, ThingsConfig, ThingsService,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

pub const ROOT_TOKEN: &str = "root-token";

fn page<T>(items: Vec<T>, pagination: Pagination) -> PaginatedResult<T> {
    let total = items.len() as u64;
    let offset = usize::try_from(pagination.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(pagination.limit).unwrap_or(usize::MAX);
    PaginatedResult {
        items: items.into_iter().skip(offset).take(limit).collect(),
        total,
        offset: pagination.offset,
        limit: pagination.limit,
    }
}

fn rank(role: Role) -> u8 {
    match role {
        Role::Viewer => 1,
        Role::Editor => 2,
        Role::Admin => 3,
        Role::Owner => 4,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemStore {
    pub groups: RwLock<BTreeMap<Uuid, Group>>,
    pub things: RwLock<BTreeMap<Uuid, Thing>>,
    pub profiles: RwLock<BTreeMap<Uuid, Profile>>,
    pub memberships: RwLock<Vec<GroupMembership>>,
    pub invites: RwLock<BTreeMap<Uuid, GroupInvite>>,
    pub dormant: RwLock<HashMap<Uuid, Vec<Uuid>>>,

    pub users: RwLock<Vec<User>>,
    pub tokens: RwLock<HashMap<String, Uuid>>,
    pub orgs: RwLock<HashMap<Uuid, Organization>>,
    pub org_roles: RwLock<HashMap<(Uuid, Uuid), Role>>,
    pub root_id: RwLock<Option<Uuid>>,

    pub thing_reads: AtomicUsize,
    pub profile_reads: AtomicUsize,
}

impl MemStore {
    pub fn membership_count(&self, group_id: Uuid) -> usize {
        self.memberships
            .read()
            .iter()
            .filter(|m| m.group_id == group_id)
            .count()
    }

    pub fn role(&self, group_id: Uuid, member_id: Uuid) -> Option<Role> {
        self.memberships
            .read()
            .iter()
            .find(|m| m.group_id == group_id && m.member_id == member_id)
            .map(|m| m.role)
    }
}

#[derive(Clone)]
pub struct MemGroups(Arc<MemStore>);

impl GroupRepository for MemGroups {
    async fn save(&self, groups: Vec<Group>) -> HivemeshResult<Vec<Group>> {
        let mut stored = self.0.groups.write();
        for g in &groups {
            stored.insert(g.id, g.clone());
        }
        Ok(groups)
    }

    async fn update(&self, group: Group) -> HivemeshResult<Group> {
        let mut stored = self.0.groups.write();
        match stored.get_mut(&group.id) {
            Some(existing) => {
                *existing = group.clone();
                Ok(group)
            }
            None => Err(HivemeshError::not_found("group", group.id)),
        }
    }

    async fn retrieve_by_id(&self, id: Uuid) -> HivemeshResult<Group> {
        self.0
            .groups
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| HivemeshError::not_found("group", id))
    }

    async fn retrieve_by_ids(
        &self,
        ids: &[Uuid],
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Group>> {
        let groups = self
            .0
            .groups
            .read()
            .values()
            .filter(|g| ids.contains(&g.id))
            .cloned()
            .collect();
        Ok(page(groups, pagination))
    }

    async fn retrieve_ids_by_org(&self, org_id: Uuid) -> HivemeshResult<Vec<Uuid>> {
        Ok(self
            .0
            .groups
            .read()
            .values()
            .filter(|g| g.org_id == org_id)
            .map(|g| g.id)
            .collect())
    }

    async fn remove(&self, ids: &[Uuid]) -> HivemeshResult<()> {
        self.0.groups.write().retain(|id, _| !ids.contains(id));
        self.0.things.write().retain(|_, t| !ids.contains(&t.group_id));
        self.0
            .profiles
            .write()
            .retain(|_, p| !ids.contains(&p.group_id));
        self.0
            .memberships
            .write()
            .retain(|m| !ids.contains(&m.group_id));
        self.0
            .invites
            .write()
            .retain(|_, inv| !ids.contains(&inv.group_id));
        Ok(())
    }

    async fn retrieve_all(&self) -> HivemeshResult<Vec<Group>> {
        Ok(self.0.groups.read().values().cloned().collect())
    }
}

#[derive(Clone)]
pub struct MemThings(Arc<MemStore>);

impl ThingRepository for MemThings {
    async fn save(&self, things: Vec<Thing>) -> HivemeshResult<Vec<Thing>> {
        let mut stored = self.0.things.write();
        for t in &things {
            let taken = stored.values().any(|s| {
                s.key == t.key
                    || (t.external_key.is_some() && s.external_key == t.external_key)
            });
            if taken {
                return Err(HivemeshError::conflict("thing key already in use"));
            }
        }
        for t in &things {
            stored.insert(t.id, t.clone());
        }
        Ok(things)
    }

    async fn update(&self, thing: Thing) -> HivemeshResult<Thing> {
        let mut stored = self.0.things.write();
        match stored.get_mut(&thing.id) {
            Some(existing) => {
                *existing = thing.clone();
                Ok(thing)
            }
            None => Err(HivemeshError::not_found("thing", thing.id)),
        }
    }

    async fn update_external_key(
        &self,
        id: Uuid,
        external_key: Option<String>,
    ) -> HivemeshResult<()> {
        let mut stored = self.0.things.write();
        if external_key.is_some()
            && stored
                .values()
                .any(|t| t.id != id && t.external_key == external_key)
        {
            return Err(HivemeshError::conflict("external key already in use"));
        }
        let thing = stored
            .get_mut(&id)
            .ok_or_else(|| HivemeshError::not_found("thing", id))?;
        thing.external_key = external_key;
        Ok(())
    }

    async fn retrieve_by_id(&self, id: Uuid) -> HivemeshResult<Thing> {
        self.0.thing_reads.fetch_add(1, Ordering::SeqCst);
        self.0
            .things
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| HivemeshError::not_found("thing", id))
    }

    async fn retrieve_by_key(&self, key: &ThingKey) -> HivemeshResult<Thing> {
        self.0
            .things
            .read()
            .values()
            .find(|t| match key.kind {
                KeyKind::Internal => t.key == key.value,
                KeyKind::External => t.external_key.as_deref() == Some(key.value.as_str()),
            })
            .cloned()
            .ok_or_else(|| HivemeshError::not_found("thing", &key.value))
    }

    async fn retrieve_by_group_ids(
        &self,
        group_ids: &[Uuid],
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Thing>> {
        let things = self
            .0
            .things
            .read()
            .values()
            .filter(|t| group_ids.contains(&t.group_id))
            .cloned()
            .collect();
        Ok(page(things, pagination))
    }

    async fn retrieve_by_profile(
        &self,
        profile_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Thing>> {
        let things = self
            .0
            .things
            .read()
            .values()
            .filter(|t| t.profile_id == profile_id)
            .cloned()
            .collect();
        Ok(page(things, pagination))
    }

    async fn remove(&self, ids: &[Uuid]) -> HivemeshResult<()> {
        self.0.things.write().retain(|id, _| !ids.contains(id));
        Ok(())
    }

    async fn retrieve_all(&self) -> HivemeshResult<Vec<Thing>> {
        Ok(self.0.things.read().values().cloned().collect())
    }
}

#[derive(Clone)]
pub struct MemProfiles(Arc<MemStore>);

impl ProfileRepository for MemProfiles {
    async fn save(&self, profiles: Vec<Profile>) -> HivemeshResult<Vec<Profile>> {
        let mut stored = self.0.profiles.write();
        for p in &profiles {
            stored.insert(p.id, p.clone());
        }
        Ok(profiles)
    }

    async fn update(&self, profile: Profile) -> HivemeshResult<Profile> {
        let mut stored = self.0.profiles.write();
        match stored.get_mut(&profile.id) {
            Some(existing) => {
                *existing = profile.clone();
                Ok(profile)
            }
            None => Err(HivemeshError::not_found("profile", profile.id)),
        }
    }

    async fn retrieve_by_id(&self, id: Uuid) -> HivemeshResult<Profile> {
        self.0.profile_reads.fetch_add(1, Ordering::SeqCst);
        self.0
            .profiles
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| HivemeshError::not_found("profile", id))
    }

    async fn retrieve_by_group_ids(
        &self,
        group_ids: &[Uuid],
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Profile>> {
        let profiles = self
            .0
            .profiles
            .read()
            .values()
            .filter(|p| group_ids.contains(&p.group_id))
            .cloned()
            .collect();
        Ok(page(profiles, pagination))
    }

    async fn remove(&self, ids: &[Uuid]) -> HivemeshResult<()> {
        self.0.profiles.write().retain(|id, _| !ids.contains(id));
        Ok(())
    }

    async fn retrieve_all(&self) -> HivemeshResult<Vec<Profile>> {
        Ok(self.0.profiles.read().values().cloned().collect())
    }
}

#[derive(Clone)]
pub struct MemMemberships(Arc<MemStore>);

impl GroupMembershipRepository for MemMemberships {
    async fn save(&self, memberships: Vec<GroupMembership>) -> HivemeshResult<()> {
        let mut stored = self.0.memberships.write();
        for m in &memberships {
            if stored
                .iter()
                .any(|s| s.group_id == m.group_id && s.member_id == m.member_id)
            {
                return Err(HivemeshError::conflict("group membership already exists"));
            }
        }
        stored.extend(memberships);
        Ok(())
    }

    async fn update(&self, memberships: Vec<GroupMembership>) -> HivemeshResult<()> {
        let mut stored = self.0.memberships.write();
        for m in &memberships {
            if !stored
                .iter()
                .any(|s| s.group_id == m.group_id && s.member_id == m.member_id)
            {
                return Err(HivemeshError::not_found("group membership", m.member_id));
            }
        }
        for m in memberships {
            if let Some(s) = stored
                .iter_mut()
                .find(|s| s.group_id == m.group_id && s.member_id == m.member_id)
            {
                s.role = m.role;
            }
        }
        Ok(())
    }

    async fn remove(&self, group_id: Uuid, member_ids: &[Uuid]) -> HivemeshResult<()> {
        self.0
            .memberships
            .write()
            .retain(|m| !(m.group_id == group_id && member_ids.contains(&m.member_id)));
        Ok(())
    }

    async fn retrieve_role(&self, group_id: Uuid, member_id: Uuid) -> HivemeshResult<Role> {
        self.0
            .role(group_id, member_id)
            .ok_or_else(|| HivemeshError::not_found("group membership", member_id))
    }

    async fn retrieve_by_group(&self, group_id: Uuid) -> HivemeshResult<Vec<GroupMembership>> {
        Ok(self
            .0
            .memberships
            .read()
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn retrieve_group_ids_by_member(&self, member_id: Uuid) -> HivemeshResult<Vec<Uuid>> {
        Ok(self
            .0
            .memberships
            .read()
            .iter()
            .filter(|m| m.member_id == member_id)
            .map(|m| m.group_id)
            .collect())
    }

    async fn retrieve_all(&self) -> HivemeshResult<Vec<GroupMembership>> {
        Ok(self.0.memberships.read().clone())
    }
}

#[derive(Clone)]
pub struct MemInvites(Arc<MemStore>);

impl GroupInviteRepository for MemInvites {
    async fn save(&self, invites: Vec<GroupInvite>) -> HivemeshResult<()> {
        let mut stored = self.0.invites.write();
        for inv in invites {
            stored.insert(inv.id, inv);
        }
        Ok(())
    }

    async fn retrieve_by_id(&self, id: Uuid) -> HivemeshResult<GroupInvite> {
        self.0
            .invites
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| HivemeshError::not_found("group invite", id))
    }

    async fn retrieve_pending(
        &self,
        group_id: Uuid,
        invitee_id: Uuid,
    ) -> HivemeshResult<Vec<GroupInvite>> {
        Ok(self
            .0
            .invites
            .read()
            .values()
            .filter(|inv| {
                inv.group_id == group_id
                    && inv.invitee.is(invitee_id)
                    && inv.state == InviteState::Pending
            })
            .cloned()
            .collect())
    }

    async fn retrieve_by_user(
        &self,
        user_type: InviteUserType,
        user_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<GroupInvite>> {
        let invites = self
            .0
            .invites
            .read()
            .values()
            .filter(|inv| match user_type {
                InviteUserType::Invitee => inv.invitee.is(user_id),
                InviteUserType::Inviter => inv.inviter_id == user_id,
            })
            .cloned()
            .collect();
        Ok(page(invites, pagination))
    }

    async fn retrieve_by_group(
        &self,
        group_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<GroupInvite>> {
        let invites = self
            .0
            .invites
            .read()
            .values()
            .filter(|inv| inv.group_id == group_id)
            .cloned()
            .collect();
        Ok(page(invites, pagination))
    }

    async fn update_state(&self, id: Uuid, state: InviteState) -> HivemeshResult<()> {
        let mut stored = self.0.invites.write();
        let invite = stored
            .get_mut(&id)
            .ok_or_else(|| HivemeshError::not_found("group invite", id))?;
        invite.state = state;
        Ok(())
    }

    async fn save_dormant_relations(
        &self,
        org_invite_id: Uuid,
        invite_ids: &[Uuid],
    ) -> HivemeshResult<()> {
        self.0
            .dormant
            .write()
            .entry(org_invite_id)
            .or_default()
            .extend_from_slice(invite_ids);
        Ok(())
    }

    async fn activate(
        &self,
        org_invite_id: Uuid,
        invitee_id: Uuid,
        invitee_email: &str,
        expires_at: DateTime<Utc>,
    ) -> HivemeshResult<Vec<GroupInvite>> {
        let ids = self
            .0
            .dormant
            .write()
            .remove(&org_invite_id)
            .unwrap_or_default();

        let mut stored = self.0.invites.write();
        let mut activated = Vec::new();
        for id in ids {
            if let Some(invite) = stored.get_mut(&id) {
                if invite.is_dormant() {
                    invite.invitee = Invitee::Assigned {
                        id: invitee_id,
                        email: invitee_email.to_string(),
                    };
                    invite.expires_at = expires_at;
                }
                activated.push(invite.clone());
            }
        }
        Ok(activated)
    }
}

// ---------------------------------------------------------------------------
// Cache that can be switched off
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FlakyCache {
    inner: Arc<InMemoryMembershipCache>,
    down: Arc<AtomicBool>,
}

impl FlakyCache {
    fn check(&self) -> HivemeshResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(HivemeshError::Cache("connection refused".into()));
        }
        Ok(())
    }
}

impl MembershipCache for FlakyCache {
    async fn save_group_membership(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        role: Role,
    ) -> HivemeshResult<()> {
        self.check()?;
        self.inner
            .save_group_membership(group_id, member_id, role)
            .await
    }

    async fn view_role(&self, group_id: Uuid, member_id: Uuid) -> HivemeshResult<Option<Role>> {
        self.check()?;
        self.inner.view_role(group_id, member_id).await
    }

    async fn remove_group_membership(&self, group_id: Uuid, member_id: Uuid) -> HivemeshResult<()> {
        self.check()?;
        self.inner.remove_group_membership(group_id, member_id).await
    }

    async fn retrieve_group_ids_by_member(
        &self,
        member_id: Uuid,
    ) -> HivemeshResult<Option<Vec<Uuid>>> {
        self.check()?;
        self.inner.retrieve_group_ids_by_member(member_id).await
    }

    async fn save_group_ids_by_member(
        &self,
        member_id: Uuid,
        group_ids: &[Uuid],
    ) -> HivemeshResult<()> {
        self.check()?;
        self.inner.save_group_ids_by_member(member_id, group_ids).await
    }

    async fn save_group_by_thing(&self, thing_id: Uuid, group_id: Uuid) -> HivemeshResult<()> {
        self.check()?;
        self.inner.save_group_by_thing(thing_id, group_id).await
    }

    async fn view_group_by_thing(&self, thing_id: Uuid) -> HivemeshResult<Option<Uuid>> {
        self.check()?;
        self.inner.view_group_by_thing(thing_id).await
    }

    async fn remove_group_by_thing(&self, thing_id: Uuid) -> HivemeshResult<()> {
        self.check()?;
        self.inner.remove_group_by_thing(thing_id).await
    }

    async fn save_group_by_profile(&self, profile_id: Uuid, group_id: Uuid) -> HivemeshResult<()> {
        self.check()?;
        self.inner.save_group_by_profile(profile_id, group_id).await
    }

    async fn view_group_by_profile(&self, profile_id: Uuid) -> HivemeshResult<Option<Uuid>> {
        self.check()?;
        self.inner.view_group_by_profile(profile_id).await
    }

    async fn remove_group_by_profile(&self, profile_id: Uuid) -> HivemeshResult<()> {
        self.check()?;
        self.inner.remove_group_by_profile(profile_id).await
    }
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeAuthority(Arc<MemStore>);

impl FakeAuthority {
    fn principal(&self, token: &str) -> HivemeshResult<Uuid> {
        self.0
            .tokens
            .read()
            .get(token)
            .copied()
            .ok_or_else(|| HivemeshError::AuthenticationFailed {
                reason: "unknown token".into(),
            })
    }
}

impl AuthAuthority for FakeAuthority {
    async fn authorize(&self, token: &str, request: AuthzRequest) -> HivemeshResult<()> {
        let principal = self.principal(token)?;
        if *self.0.root_id.read() == Some(principal) {
            return Ok(());
        }

        let granted = match request {
            AuthzRequest::Root => None,
            AuthzRequest::Group { group_id, .. } => self.0.role(group_id, principal),
            AuthzRequest::Org { org_id, .. } => {
                self.0.org_roles.read().get(&(org_id, principal)).copied()
            }
        };
        let required = match request {
            AuthzRequest::Root => Role::Owner,
            AuthzRequest::Group { action, .. } | AuthzRequest::Org { action, .. } => action,
        };

        match granted {
            Some(role) if rank(role) >= rank(required) => Ok(()),
            _ => Err(HivemeshError::denied("insufficient role")),
        }
    }

    async fn identify(&self, token: &str) -> HivemeshResult<Uuid> {
        self.principal(token)
    }

    async fn view_org(&self, token: &str, org_id: Uuid) -> HivemeshResult<Organization> {
        self.principal(token)?;
        self.0
            .orgs
            .read()
            .get(&org_id)
            .cloned()
            .ok_or_else(|| HivemeshError::not_found("organization", org_id))
    }

    async fn view_org_membership(
        &self,
        token: &str,
        org_id: Uuid,
        member_id: Uuid,
    ) -> HivemeshResult<OrgMembership> {
        self.principal(token)?;
        let role = self
            .0
            .org_roles
            .read()
            .get(&(org_id, member_id))
            .copied()
            .ok_or_else(|| HivemeshError::not_found("organization membership", member_id))?;
        let email = self
            .0
            .users
            .read()
            .iter()
            .find(|u| u.id == member_id)
            .map(|u| u.email.clone())
            .unwrap_or_default();
        Ok(OrgMembership {
            org_id,
            member_id,
            email,
            role: role.as_str().to_string(),
        })
    }
}

#[derive(Clone)]
pub struct FakeDirectory(Arc<MemStore>);

impl UserDirectory for FakeDirectory {
    async fn get_users_by_ids(
        &self,
        ids: &[Uuid],
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<User>> {
        let users = self
            .0
            .users
            .read()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect();
        Ok(page(users, pagination))
    }

    async fn get_users_by_emails(&self, emails: &[String]) -> HivemeshResult<Vec<User>> {
        Ok(self
            .0
            .users
            .read()
            .iter()
            .filter(|u| emails.contains(&u.email))
            .cloned()
            .collect())
    }
}

/// What the notifier was asked to deliver.
#[derive(Debug, Clone)]
pub enum Sent {
    Invite {
        to: Vec<String>,
        invite_id: Uuid,
        org_name: String,
    },
    Membership {
        to: Vec<String>,
        group_name: String,
        role: Role,
    },
}

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Sent>,
}

impl Notifier for RecordingNotifier {
    async fn send_group_invite(
        &self,
        to: Vec<String>,
        invite: GroupInvite,
        org_name: String,
        _redirect_path: String,
    ) -> HivemeshResult<()> {
        let _ = self.tx.send(Sent::Invite {
            to,
            invite_id: invite.id,
            org_name,
        });
        Ok(())
    }

    async fn send_group_membership_notification(
        &self,
        to: Vec<String>,
        _org_name: String,
        group_name: String,
        role: Role,
    ) -> HivemeshResult<()> {
        let _ = self.tx.send(Sent::Membership {
            to,
            group_name,
            role,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Backend and fixture
// ---------------------------------------------------------------------------

pub struct TestBackend {
    groups: MemGroups,
    things: MemThings,
    profiles: MemProfiles,
    memberships: MemMemberships,
    invites: MemInvites,
    cache: FlakyCache,
    auth: FakeAuthority,
    users: FakeDirectory,
    ids: UuidProvider,
}

impl Backend for TestBackend {
    type Groups = MemGroups;
    type Things = MemThings;
    type Profiles = MemProfiles;
    type Memberships = MemMemberships;
    type Invites = MemInvites;
    type Cache = FlakyCache;
    type Auth = FakeAuthority;
    type Users = FakeDirectory;
    type Ids = UuidProvider;

    fn groups(&self) -> &MemGroups {
        &self.groups
    }
    fn things(&self) -> &MemThings {
        &self.things
    }
    fn profiles(&self) -> &MemProfiles {
        &self.profiles
    }
    fn memberships(&self) -> &MemMemberships {
        &self.memberships
    }
    fn invites(&self) -> &MemInvites {
        &self.invites
    }
    fn cache(&self) -> &FlakyCache {
        &self.cache
    }
    fn auth(&self) -> &FakeAuthority {
        &self.auth
    }
    fn users(&self) -> &FakeDirectory {
        &self.users
    }
    fn ids(&self) -> &UuidProvider {
        &self.ids
    }
}

#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub struct Fixture {
    pub service: ThingsService<TestBackend>,
    pub store: Arc<MemStore>,
    pub cache: Arc<InMemoryMembershipCache>,
    pub cache_down: Arc<AtomicBool>,
    pub sent: mpsc::UnboundedReceiver<Sent>,
    pub org_id: Uuid,
    pub root: Principal,
    /// Org Admin; owns every group created through [`Fixture::group`].
    pub alice: Principal,
}

/// Build a service over empty stores with one organization, a root
/// principal and `alice`, an organization Admin.
pub async fn setup() -> Fixture {
    setup_with(ThingsConfig::default()).await
}

pub async fn setup_with(config: ThingsConfig) -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let store = Arc::new(MemStore::default());
    let cache = Arc::new(InMemoryMembershipCache::new());
    let cache_down = Arc::new(AtomicBool::new(false));
    let (tx, sent) = mpsc::unbounded_channel();

    let backend = TestBackend {
        groups: MemGroups(store.clone()),
        things: MemThings(store.clone()),
        profiles: MemProfiles(store.clone()),
        memberships: MemMemberships(store.clone()),
        invites: MemInvites(store.clone()),
        cache: FlakyCache {
            inner: cache.clone(),
            down: cache_down.clone(),
        },
        auth: FakeAuthority(store.clone()),
        users: FakeDirectory(store.clone()),
        ids: UuidProvider,
    };

    let (queue, _worker) = NotificationQueue::from_config(RecordingNotifier { tx }, &config);
    let service = ThingsService::new(backend, queue, config);

    let org_id = Uuid::new_v4();
    // Registered as "root", so its token is `ROOT_TOKEN`.
    let root = register(&store, "root", None);
    *store.root_id.write() = Some(root.id);
    let alice = register(&store, "alice", Some((org_id, Role::Admin)));
    store.orgs.write().insert(
        org_id,
        Organization {
            id: org_id,
            name: "acme".into(),
            owner_id: alice.id,
            created_at: Utc::now(),
        },
    );

    Fixture {
        service,
        store,
        cache,
        cache_down,
        sent,
        org_id,
        root,
        alice,
    }
}

fn register(store: &MemStore, name: &str, org_role: Option<(Uuid, Role)>) -> Principal {
    let principal = Principal {
        id: Uuid::new_v4(),
        email: format!("{name}@example.com"),
        token: format!("{name}-token"),
    };
    store.users.write().push(User {
        id: principal.id,
        email: principal.email.clone(),
    });
    store
        .tokens
        .write()
        .insert(principal.token.clone(), principal.id);
    if let Some((org_id, role)) = org_role {
        store.org_roles.write().insert((org_id, principal.id), role);
    }
    principal
}

impl Fixture {
    /// A user who belongs to the organization as a plain Viewer.
    pub fn org_member(&self, name: &str) -> Principal {
        register(&self.store, name, Some((self.org_id, Role::Viewer)))
    }

    /// A user known to the directory but outside the organization.
    pub fn outsider(&self, name: &str) -> Principal {
        register(&self.store, name, None)
    }

    /// A group owned by `alice`.
    pub async fn group(&self, name: &str) -> Group {
        self.service
            .groups()
            .create_groups(
                &self.alice.token,
                self.org_id,
                vec![CreateGroup {
                    name: name.into(),
                    description: String::new(),
                    metadata: None,
                }],
            )
            .await
            .unwrap()
            .remove(0)
    }

    /// Grant a role directly, as the group owner.
    pub async fn grant(&self, group_id: Uuid, member: &Principal, role: Role) {
        self.service
            .memberships()
            .create_group_memberships(
                &self.alice.token,
                vec![GroupMembership::new(group_id, member.id, role)],
            )
            .await
            .unwrap();
    }

    pub async fn profile(&self, group_id: Uuid) -> Profile {
        self.service
            .profiles()
            .create_profiles(
                &self.alice.token,
                group_id,
                vec![CreateProfile {
                    name: "senml".into(),
                    config: ProfileConfig {
                        content_type: "application/senml+json".into(),
                        ..Default::default()
                    },
                    metadata: None,
                }],
            )
            .await
            .unwrap()
            .remove(0)
    }

    pub async fn thing(&self, group_id: Uuid, profile_id: Uuid) -> Thing {
        self.service
            .things()
            .create_things(
                &self.alice.token,
                group_id,
                vec![CreateThing {
                    profile_id,
                    name: "sensor".into(),
                    key: String::new(),
                    external_key: None,
                    metadata: None,
                }],
            )
            .await
            .unwrap()
            .remove(0)
    }

    /// Next notification handed to the notifier.
    pub async fn next_sent(&mut self) -> Sent {
        tokio::time::timeout(Duration::from_secs(2), self.sent.recv())
            .await
            .expect("notification not delivered in time")
            .expect("notifier dropped")
    }

    /// True when nothing further reaches the notifier for a short while.
    pub async fn nothing_sent(&mut self) -> bool {
        tokio::time::timeout(Duration::from_millis(200), self.sent.recv())
            .await
            .is_err()
    }

    pub fn set_cache_down(&self, down: bool) {
        self.cache_down.store(down, Ordering::SeqCst);
    }
}
