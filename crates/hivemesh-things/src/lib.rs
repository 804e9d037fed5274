//! hivemesh things: group tenancy, memberships, access resolution and
//! the group invite lifecycle.

pub mod access;
pub mod backend;
pub mod backup;
pub mod cache;
pub mod config;
pub mod error;
pub mod groups;
pub mod hierarchy;
pub mod invites;
pub mod memberships;
pub mod notify;
pub mod profiles;
pub mod service;
pub mod things;

pub use access::AccessGate;
pub use backend::Backend;
pub use backup::{Backup, BackupService};
pub use cache::InMemoryMembershipCache;
pub use config::ThingsConfig;
pub use error::{InviteError, MembershipError, ResourceError};
pub use groups::GroupRegistry;
pub use hierarchy::ResourceHierarchy;
pub use invites::{CreateGroupInvite, InviteLifecycle};
pub use memberships::MembershipRegistry;
pub use notify::{Notification, NotificationQueue};
pub use profiles::ProfileRegistry;
pub use service::ThingsService;
pub use things::ThingRegistry;
