//! Thing domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A device or application connected under a group.
///
/// A thing's profile must belong to the same group as the thing itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: Uuid,
    pub group_id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
    /// Primary credential the thing authenticates with.
    pub key: String,
    /// Optional alternate credential, unique across all things.
    pub external_key: Option<String>,
    pub metadata: serde_json::Value,
}

/// Fields required to create a new thing. An empty `key` is replaced by
/// a generated one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateThing {
    pub profile_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub key: String,
    pub external_key: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing thing.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateThing {
    pub name: Option<String>,
    pub profile_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

impl Thing {
    /// Apply an update in place. The group is changed only through a
    /// combined group/profile move.
    pub fn apply(&mut self, input: UpdateThing) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(profile_id) = input.profile_id {
            self.profile_id = profile_id;
        }
        if let Some(metadata) = input.metadata {
            self.metadata = metadata;
        }
    }
}

/// Which credential a thing presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Internal,
    External,
}

/// A thing credential used to resolve the thing's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThingKey {
    pub kind: KeyKind,
    pub value: String,
}

impl ThingKey {
    pub fn internal(value: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::Internal,
            value: value.into(),
        }
    }

    pub fn external(value: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::External,
            value: value.into(),
        }
    }
}
