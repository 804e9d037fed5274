//! Group membership model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::Role;

/// A `(group, principal, role)` grant.
///
/// `email` is resolved from the user directory for display and is not
/// authoritative; repositories may store it empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_id: Uuid,
    pub member_id: Uuid,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

impl GroupMembership {
    pub fn new(group_id: Uuid, member_id: Uuid, role: Role) -> Self {
        Self {
            group_id,
            member_id,
            email: String::new(),
            role,
        }
    }
}
