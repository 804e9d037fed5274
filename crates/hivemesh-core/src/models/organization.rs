//! Organization views returned by the external authorization authority.
//!
//! Organizations are owned by the authority; this core only reads them
//! to resolve names and to check organization-level membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization groups multiple groups under a single administrative entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A principal's membership in an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMembership {
    pub org_id: Uuid,
    pub member_id: Uuid,
    pub email: String,
    /// Organization-level role name as reported by the authority.
    pub role: String,
}
