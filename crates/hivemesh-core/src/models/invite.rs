//! Group invite domain model.
//!
//! A group invite proposes a role in a group to a principal. Invites are
//! created either directly for a known invitee or dormant, chained to a
//! pending organization invite and activated once that invite resolves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

/// Lifecycle state as persisted.
///
/// `Expired` is never written by the core: a `Pending` invite whose
/// `expires_at` has passed is reported as expired when it is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteState {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

impl InviteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteState::Pending => "pending",
            InviteState::Accepted => "accepted",
            InviteState::Declined => "declined",
            InviteState::Revoked => "revoked",
            InviteState::Expired => "expired",
        }
    }
}

/// The principal an invite is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Invitee {
    /// Created alongside an organization invite; nobody can respond yet.
    Dormant,
    Assigned { id: Uuid, email: String },
}

impl Invitee {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Invitee::Dormant => None,
            Invitee::Assigned { id, .. } => Some(*id),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Invitee::Dormant => None,
            Invitee::Assigned { email, .. } => Some(email),
        }
    }

    pub fn is(&self, principal: Uuid) -> bool {
        self.id() == Some(principal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInvite {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Denormalized for notifications and listings.
    pub group_name: String,
    pub inviter_id: Uuid,
    pub inviter_email: String,
    pub invitee: Invitee,
    pub role: Role,
    pub state: InviteState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GroupInvite {
    pub fn is_dormant(&self) -> bool {
        matches!(self.invitee, Invitee::Dormant)
    }

    /// State as observed at `now`, folding in lazy expiration.
    pub fn effective_state(&self, now: DateTime<Utc>) -> InviteState {
        match self.state {
            InviteState::Pending if now > self.expires_at => InviteState::Expired,
            state => state,
        }
    }

    /// Copy of the invite with its state normalized to `now`.
    pub fn observed_at(mut self, now: DateTime<Utc>) -> Self {
        self.state = self.effective_state(now);
        self
    }
}

/// One proposed `(group, role)` pair of a dormant invite batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInviteRequest {
    pub group_id: Uuid,
    pub role: Role,
}

/// Which side of an invite a listing filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteUserType {
    Invitee,
    Inviter,
}
