//! User records resolved from the external user directory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directory view of a user. Emails are denormalized into memberships
/// and invites but the directory stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}
