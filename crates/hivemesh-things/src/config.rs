//! Configuration of the things service core.

use chrono::{DateTime, TimeDelta, Utc};
use hivemesh_core::error::{HivemeshError, HivemeshResult};
use serde::Deserialize;

/// Configuration for the membership, invite and notification paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThingsConfig {
    /// Lifetime of a new or newly activated group invite in seconds
    /// (default: 604_800 = 7 days).
    pub invite_duration_secs: u64,
    /// Frontend path embedded in invite notifications.
    pub invite_redirect_path: String,
    /// Notify members added directly (not through an invite).
    pub notify_new_members: bool,
    /// Bound of the detached notification queue (default: 256). Read by
    /// [`NotificationQueue::from_config`](crate::notify::NotificationQueue::from_config).
    pub notification_queue_capacity: usize,
}

impl Default for ThingsConfig {
    fn default() -> Self {
        Self {
            invite_duration_secs: 604_800,
            invite_redirect_path: "/groups/invites".into(),
            notify_new_members: true,
            notification_queue_capacity: 256,
        }
    }
}

impl ThingsConfig {
    /// Invite lifetime; `MalformedInput` when it does not fit a `TimeDelta`.
    pub fn invite_duration(&self) -> HivemeshResult<TimeDelta> {
        i64::try_from(self.invite_duration_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| invalid_duration(self.invite_duration_secs))
    }

    /// Expiry of an invite issued or activated at `now`.
    pub fn invite_expiry(&self, now: DateTime<Utc>) -> HivemeshResult<DateTime<Utc>> {
        now.checked_add_signed(self.invite_duration()?)
            .ok_or_else(|| invalid_duration(self.invite_duration_secs))
    }
}

fn invalid_duration(secs: u64) -> HivemeshError {
    HivemeshError::malformed(format!("invite_duration_secs {secs} is out of range"))
}
