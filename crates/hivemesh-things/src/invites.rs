//! Group invite lifecycle.
//!
//! ```text
//! Pending --revoke (inviter)--> Revoked
//! Pending --accept (invitee)--> Accepted   (+ group membership)
//! Pending --decline (invitee)-> Declined
//! Pending --expires_at passed-> Expired    (observed lazily)
//! dormant --activate (org invite resolved)--> Pending with invitee
//! ```
//!
//! Every transition out of `Pending` happens at most once.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use hivemesh_core::error::{HivemeshError, HivemeshResult};
use hivemesh_core::external::{AuthAuthority, IdProvider, UserDirectory};
use hivemesh_core::models::group::Group;
use hivemesh_core::models::invite::{
    GroupInvite, GroupInviteRequest, InviteState, InviteUserType, Invitee,
};
use hivemesh_core::models::membership::GroupMembership;
use hivemesh_core::models::role::Role;
use hivemesh_core::models::user::User;
use hivemesh_core::repository::{
    GroupInviteRepository, GroupRepository, PaginatedResult, Pagination,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::config::ThingsConfig;
use crate::error::{InviteError, MembershipError};
use crate::memberships::MembershipRegistry;
use crate::notify::{Notification, NotificationQueue};

/// Input for a direct group invite.
#[derive(Debug, Clone)]
pub struct CreateGroupInvite {
    pub group_id: Uuid,
    pub invitee_email: String,
    pub role: Role,
}

pub struct InviteLifecycle<B: Backend> {
    backend: Arc<B>,
    gate: AccessGate<B>,
    memberships: MembershipRegistry<B>,
    queue: NotificationQueue,
    config: Arc<ThingsConfig>,
}

impl<B: Backend> Clone for InviteLifecycle<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
            memberships: self.memberships.clone(),
            queue: self.queue.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: Backend> InviteLifecycle<B> {
    pub fn new(
        backend: Arc<B>,
        gate: AccessGate<B>,
        memberships: MembershipRegistry<B>,
        queue: NotificationQueue,
        config: Arc<ThingsConfig>,
    ) -> Self {
        Self {
            backend,
            gate,
            memberships,
            queue,
            config,
        }
    }

    /// Invite an organization member, addressed by email, into a group the
    /// caller administers.
    pub async fn create_group_invite(
        &self,
        token: &str,
        input: CreateGroupInvite,
    ) -> HivemeshResult<GroupInvite> {
        let CreateGroupInvite {
            group_id,
            invitee_email,
            role,
        } = input;

        self.gate
            .can_user_access_group(token, group_id, Role::Admin)
            .await?;
        if role.is_owner() {
            return Err(MembershipError::OwnerNotAssignable.into());
        }

        let inviter = self.caller(token).await?;
        let group = self.backend.groups().retrieve_by_id(group_id).await?;
        let invitee = self.user_by_email(&invitee_email).await?;

        let auth = self.backend.auth();
        auth.view_org_membership(token, group.org_id, invitee.id)
            .await?;

        match self.memberships.role_of(group_id, invitee.id).await {
            Ok(_) => return Err(InviteError::AlreadyMember.into()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let now = Utc::now();
        let pending = self
            .backend
            .invites()
            .retrieve_pending(group_id, invitee.id)
            .await?;
        if pending
            .iter()
            .any(|inv| inv.effective_state(now) == InviteState::Pending)
        {
            return Err(InviteError::AlreadyPending.into());
        }

        let org = auth.view_org(token, group.org_id).await?;
        let expires_at = self.config.invite_expiry(now)?;

        let invite = GroupInvite {
            id: self.backend.ids().new_id()?,
            group_id,
            group_name: group.name,
            inviter_id: inviter.id,
            inviter_email: inviter.email,
            invitee: Invitee::Assigned {
                id: invitee.id,
                email: invitee.email.clone(),
            },
            role,
            state: InviteState::Pending,
            created_at: now,
            expires_at,
        };
        self.backend.invites().save(vec![invite.clone()]).await?;

        info!(
            invite_id = %invite.id,
            group_id = %group_id,
            invitee_id = %invitee.id,
            role = %role,
            "group invite created"
        );

        self.queue.dispatch(Notification::GroupInvite {
            to: vec![invitee.email],
            invite: invite.clone(),
            org_name: org.name,
            redirect_path: self.config.invite_redirect_path.clone(),
        });

        Ok(invite)
    }

    /// Create invites without an invitee, to be activated when the
    /// organization invite resolves.
    pub async fn create_dormant_group_invites(
        &self,
        token: &str,
        org_invite_id: Uuid,
        requests: Vec<GroupInviteRequest>,
    ) -> HivemeshResult<Vec<GroupInvite>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let distinct: BTreeSet<Uuid> = requests.iter().map(|r| r.group_id).collect();
        if distinct.len() != requests.len() {
            return Err(HivemeshError::malformed(
                "a group may appear only once per organization invite",
            ));
        }
        if requests.iter().any(|r| r.role.is_owner()) {
            return Err(MembershipError::OwnerNotAssignable.into());
        }

        let mut groups: Vec<Group> = Vec::with_capacity(requests.len());
        for request in &requests {
            self.gate
                .can_user_access_group(token, request.group_id, Role::Admin)
                .await?;
            groups.push(self.backend.groups().retrieve_by_id(request.group_id).await?);
        }

        let inviter = self.caller(token).await?;
        let now = Utc::now();
        let expires_at = self.config.invite_expiry(now)?;

        let mut invites = Vec::with_capacity(requests.len());
        for (request, group) in requests.iter().zip(groups) {
            invites.push(GroupInvite {
                id: self.backend.ids().new_id()?,
                group_id: request.group_id,
                group_name: group.name,
                inviter_id: inviter.id,
                inviter_email: inviter.email.clone(),
                invitee: Invitee::Dormant,
                role: request.role,
                state: InviteState::Pending,
                created_at: now,
                expires_at,
            });
        }

        let ids: Vec<Uuid> = invites.iter().map(|inv| inv.id).collect();
        let repo = self.backend.invites();
        repo.save(invites.clone()).await?;
        repo.save_dormant_relations(org_invite_id, &ids).await?;

        info!(
            org_invite_id = %org_invite_id,
            count = invites.len(),
            "dormant group invites created"
        );
        Ok(invites)
    }

    /// Assign the caller as invitee of every dormant invite chained to the
    /// organization invite and notify them of the ones now pending.
    pub async fn activate_group_invites(
        &self,
        token: &str,
        org_invite_id: Uuid,
    ) -> HivemeshResult<Vec<GroupInvite>> {
        let invitee = self.caller(token).await?;
        let expires_at = self.config.invite_expiry(Utc::now())?;

        let activated = self
            .backend
            .invites()
            .activate(org_invite_id, invitee.id, &invitee.email, expires_at)
            .await?;

        info!(
            org_invite_id = %org_invite_id,
            invitee_id = %invitee.id,
            count = activated.len(),
            "dormant group invites activated"
        );

        for invite in activated
            .iter()
            .filter(|inv| inv.state == InviteState::Pending)
        {
            self.notify_invite(token, invite).await;
        }
        Ok(activated)
    }

    /// Withdraw a pending invite. Only its inviter may do so.
    pub async fn revoke_group_invite(&self, token: &str, invite_id: Uuid) -> HivemeshResult<()> {
        let caller = self.backend.auth().identify(token).await?;
        let invite = self.backend.invites().retrieve_by_id(invite_id).await?;

        if invite.inviter_id != caller {
            return Err(InviteError::NotInviter.into());
        }
        require_pending(&invite)?;

        self.backend
            .invites()
            .update_state(invite_id, InviteState::Revoked)
            .await?;

        info!(invite_id = %invite_id, "group invite revoked");
        Ok(())
    }

    /// Accept or decline a pending invite. Only its invitee may do so.
    ///
    /// Accepting creates the membership first; if that fails the invite
    /// stays pending.
    pub async fn respond_group_invite(
        &self,
        token: &str,
        invite_id: Uuid,
        accept: bool,
    ) -> HivemeshResult<()> {
        let caller = self.backend.auth().identify(token).await?;
        let invite = self.backend.invites().retrieve_by_id(invite_id).await?;

        if !invite.invitee.is(caller) {
            return Err(InviteError::NotInvitee.into());
        }
        require_pending(&invite)?;

        let state = if accept {
            self.memberships
                .save_memberships(vec![GroupMembership::new(
                    invite.group_id,
                    caller,
                    invite.role,
                )])
                .await?;
            InviteState::Accepted
        } else {
            InviteState::Declined
        };

        self.backend
            .invites()
            .update_state(invite_id, state)
            .await?;

        info!(invite_id = %invite_id, state = state.as_str(), "group invite answered");
        Ok(())
    }

    /// Visible to root, to Admins of the destination group and to the
    /// invitee.
    pub async fn view_group_invite(
        &self,
        token: &str,
        invite_id: Uuid,
    ) -> HivemeshResult<GroupInvite> {
        if self.gate.is_root(token).await? {
            let invite = self.backend.invites().retrieve_by_id(invite_id).await?;
            return Ok(invite.observed_at(Utc::now()));
        }

        // Non-root callers cannot tell a missing invite from a hidden one.
        let caller = self.backend.auth().identify(token).await?;
        let invite = match self.backend.invites().retrieve_by_id(invite_id).await {
            Ok(invite) => invite,
            Err(err) if err.is_not_found() => return Err(InviteError::NotVisible.into()),
            Err(err) => return Err(err),
        };
        if !invite.invitee.is(caller) {
            self.gate
                .can_user_access_group(token, invite.group_id, Role::Admin)
                .await?;
        }

        Ok(invite.observed_at(Utc::now()))
    }

    /// Invites a user received or sent. Non-root callers may only list
    /// their own.
    pub async fn list_group_invites_by_user(
        &self,
        token: &str,
        user_type: InviteUserType,
        user_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<GroupInvite>> {
        if !self.gate.is_root(token).await? {
            let caller = self.backend.auth().identify(token).await?;
            if caller != user_id {
                return Err(InviteError::ForeignListing.into());
            }
        }

        let now = Utc::now();
        Ok(self
            .backend
            .invites()
            .retrieve_by_user(user_type, user_id, pagination)
            .await?
            .map(|inv| inv.observed_at(now)))
    }

    /// Invites into a group the caller administers.
    pub async fn list_group_invites_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<GroupInvite>> {
        self.gate
            .can_user_access_group(token, group_id, Role::Admin)
            .await?;

        let now = Utc::now();
        Ok(self
            .backend
            .invites()
            .retrieve_by_group(group_id, pagination)
            .await?
            .map(|inv| inv.observed_at(now)))
    }

    async fn caller(&self, token: &str) -> HivemeshResult<User> {
        let id = self.backend.auth().identify(token).await?;
        let page = Pagination {
            offset: 0,
            limit: 1,
        };
        self.backend
            .users()
            .get_users_by_ids(&[id], page)
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| HivemeshError::not_found("user", id))
    }

    async fn user_by_email(&self, email: &str) -> HivemeshResult<User> {
        self.backend
            .users()
            .get_users_by_emails(&[email.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| InviteError::UnknownInvitee(email.to_string()).into())
    }

    async fn notify_invite(&self, token: &str, invite: &GroupInvite) {
        let Some(email) = invite.invitee.email() else {
            return;
        };

        let org_name = match self.org_name_of(token, invite.group_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(invite_id = %invite.id, error = %e, "failed to prepare invite notification");
                return;
            }
        };

        self.queue.dispatch(Notification::GroupInvite {
            to: vec![email.to_string()],
            invite: invite.clone(),
            org_name,
            redirect_path: self.config.invite_redirect_path.clone(),
        });
    }

    async fn org_name_of(&self, token: &str, group_id: Uuid) -> HivemeshResult<String> {
        let group = self.backend.groups().retrieve_by_id(group_id).await?;
        let org = self.backend.auth().view_org(token, group.org_id).await?;
        Ok(org.name)
    }
}

fn require_pending(invite: &GroupInvite) -> Result<(), InviteError> {
    match invite.effective_state(Utc::now()) {
        InviteState::Pending => Ok(()),
        InviteState::Expired => Err(InviteError::Expired(invite.id)),
        state => Err(InviteError::NotPending {
            id: invite.id,
            state: state.as_str(),
        }),
    }
}
