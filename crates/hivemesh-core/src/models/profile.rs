//! Profile domain model.
//!
//! A profile carries the message-handling configuration shared by the
//! things assigned to it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub config: ProfileConfig,
    pub metadata: serde_json::Value,
}

/// Structured configuration block of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileConfig {
    /// Content type of messages published by assigned things
    /// (e.g., `application/senml+json`).
    pub content_type: String,
    #[serde(default)]
    pub transformer: Transformer,
}

/// Rules for turning raw payloads into stored messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Transformer {
    #[serde(default)]
    pub data_filters: Vec<String>,
    #[serde(default)]
    pub data_field: String,
    #[serde(default)]
    pub time_field: String,
    #[serde(default)]
    pub time_format: String,
    #[serde(default)]
    pub time_location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    pub name: String,
    #[serde(default)]
    pub config: ProfileConfig,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub config: Option<ProfileConfig>,
    pub metadata: Option<serde_json::Value>,
}

impl Profile {
    pub fn apply(&mut self, input: UpdateProfile) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(config) = input.config {
            self.config = config;
        }
        if let Some(metadata) = input.metadata {
            self.metadata = metadata;
        }
    }
}
