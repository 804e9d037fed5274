//! Group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A group is the tenancy unit under which things and profiles live.
///
/// Every group belongs to exactly one organization. Access to the
/// things and profiles of a group is granted through role-based
/// group memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing group. The identifier and
/// the owning organization never change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Group {
    /// Apply an update in place, bumping `updated_at`.
    pub fn apply(&mut self, input: UpdateGroup, now: DateTime<Utc>) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(metadata) = input.metadata {
            self.metadata = metadata;
        }
        self.updated_at = now;
    }
}
