//! Things service. Wires every component over one backend.

use std::sync::Arc;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::backup::BackupService;
use crate::config::ThingsConfig;
use crate::groups::GroupRegistry;
use crate::invites::InviteLifecycle;
use crate::memberships::MembershipRegistry;
use crate::notify::NotificationQueue;
use crate::profiles::ProfileRegistry;
use crate::things::ThingRegistry;

/// Entry point of the things core.
///
/// Generic over the backend so that this crate has no dependency on any
/// storage, cache or authority implementation. Components share the
/// backend and may be cloned out and used independently.
pub struct ThingsService<B: Backend> {
    gate: AccessGate<B>,
    memberships: MembershipRegistry<B>,
    invites: InviteLifecycle<B>,
    groups: GroupRegistry<B>,
    things: ThingRegistry<B>,
    profiles: ProfileRegistry<B>,
    backups: BackupService<B>,
}

impl<B: Backend> ThingsService<B> {
    pub fn new(backend: B, queue: NotificationQueue, config: ThingsConfig) -> Self {
        let backend = Arc::new(backend);
        let config = Arc::new(config);

        let gate = AccessGate::new(backend.clone());
        let memberships = MembershipRegistry::new(
            backend.clone(),
            gate.clone(),
            queue.clone(),
            config.clone(),
        );
        let invites = InviteLifecycle::new(
            backend.clone(),
            gate.clone(),
            memberships.clone(),
            queue,
            config,
        );
        let groups = GroupRegistry::new(backend.clone(), gate.clone(), memberships.clone());
        let things = ThingRegistry::new(backend.clone(), gate.clone());
        let profiles = ProfileRegistry::new(backend.clone(), gate.clone());
        let backups = BackupService::new(backend, gate.clone());

        Self {
            gate,
            memberships,
            invites,
            groups,
            things,
            profiles,
            backups,
        }
    }

    pub fn access(&self) -> &AccessGate<B> {
        &self.gate
    }

    pub fn memberships(&self) -> &MembershipRegistry<B> {
        &self.memberships
    }

    pub fn invites(&self) -> &InviteLifecycle<B> {
        &self.invites
    }

    pub fn groups(&self) -> &GroupRegistry<B> {
        &self.groups
    }

    pub fn things(&self) -> &ThingRegistry<B> {
        &self.things
    }

    pub fn profiles(&self) -> &ProfileRegistry<B> {
        &self.profiles
    }

    pub fn backups(&self) -> &BackupService<B> {
        &self.backups
    }
}
