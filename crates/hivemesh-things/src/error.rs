//! Error types of the membership, invite and resource components.

use hivemesh_core::error::HivemeshError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("owner membership of member {member_id} in group {group_id} is immutable")]
    OwnerImmutable { group_id: Uuid, member_id: Uuid },

    #[error("owner role cannot be granted through memberships or invites")]
    OwnerNotAssignable,

    #[error("member {member_id} listed more than once for group {group_id}")]
    DuplicateTarget { group_id: Uuid, member_id: Uuid },
}

impl From<MembershipError> for HivemeshError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::OwnerImmutable { .. } | MembershipError::OwnerNotAssignable => {
                HivemeshError::AuthorizationDenied {
                    reason: err.to_string(),
                }
            }
            MembershipError::DuplicateTarget { .. } => HivemeshError::MalformedInput {
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum InviteError {
    #[error("invite {0} has expired")]
    Expired(Uuid),

    #[error("invite {id} is {state}, not pending")]
    NotPending { id: Uuid, state: &'static str },

    #[error("only the inviter can revoke an invite")]
    NotInviter,

    #[error("only the invitee can respond to an invite")]
    NotInvitee,

    #[error("user is already a member of the group")]
    AlreadyMember,

    #[error("a pending invite for this user already exists")]
    AlreadyPending,

    #[error("no user with email {0}")]
    UnknownInvitee(String),

    #[error("cannot list invites of another user")]
    ForeignListing,

    #[error("invite is not visible to the caller")]
    NotVisible,
}

impl From<InviteError> for HivemeshError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::Expired(id) => HivemeshError::Expired {
                entity: "group invite".into(),
                id: id.to_string(),
            },
            InviteError::NotPending { .. } => HivemeshError::InvalidState {
                reason: err.to_string(),
            },
            InviteError::NotInviter
            | InviteError::NotInvitee
            | InviteError::ForeignListing
            | InviteError::NotVisible => HivemeshError::AuthorizationDenied {
                reason: err.to_string(),
            },
            InviteError::AlreadyMember | InviteError::AlreadyPending => HivemeshError::Conflict {
                reason: err.to_string(),
            },
            InviteError::UnknownInvitee(email) => HivemeshError::NotFound {
                entity: "user".into(),
                id: email,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("profile {profile_id} does not belong to group {group_id}")]
    ProfileOutsideGroup { profile_id: Uuid, group_id: Uuid },

    #[error("thing {thing_id} does not belong to group {group_id}")]
    ThingOutsideGroup { thing_id: Uuid, group_id: Uuid },

    #[error("profile {0} is assigned to things")]
    ProfileAssigned(Uuid),

    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("root access required")]
    RootRequired,
}

impl From<ResourceError> for HivemeshError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::ProfileOutsideGroup { .. }
            | ResourceError::ThingOutsideGroup { .. }
            | ResourceError::RootRequired => HivemeshError::AuthorizationDenied {
                reason: err.to_string(),
            },
            ResourceError::ProfileAssigned(_) => HivemeshError::Conflict {
                reason: err.to_string(),
            },
            ResourceError::EmptyName(_) => HivemeshError::MalformedInput {
                message: err.to_string(),
            },
        }
    }
}
