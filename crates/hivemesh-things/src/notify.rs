//! Detached notification dispatch.
//!
//! Operations enqueue notifications after their state change is durable
//! and return immediately. A single worker task owns the [`Notifier`] and
//! drains the queue; its failures are logged and never reach the caller.

use hivemesh_core::external::Notifier;
use hivemesh_core::models::invite::GroupInvite;
use hivemesh_core::models::role::Role;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ThingsConfig;

/// A notification waiting for delivery.
#[derive(Debug, Clone)]
pub enum Notification {
    GroupInvite {
        to: Vec<String>,
        invite: GroupInvite,
        org_name: String,
        redirect_path: String,
    },
    GroupMembership {
        to: Vec<String>,
        org_name: String,
        group_name: String,
        role: Role,
    },
}

impl Notification {
    fn kind(&self) -> &'static str {
        match self {
            Notification::GroupInvite { .. } => "group_invite",
            Notification::GroupMembership { .. } => "group_membership",
        }
    }
}

/// Handle to the bounded notification queue.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    /// Start the worker on the current tokio runtime.
    ///
    /// The worker stops once every queue handle has been dropped and the
    /// remaining notifications are delivered; await the returned handle
    /// to drain at shutdown.
    pub fn spawn<N: Notifier>(notifier: N, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let kind = notification.kind();
                let result = match notification {
                    Notification::GroupInvite {
                        to,
                        invite,
                        org_name,
                        redirect_path,
                    } => {
                        notifier
                            .send_group_invite(to, invite, org_name, redirect_path)
                            .await
                    }
                    Notification::GroupMembership {
                        to,
                        org_name,
                        group_name,
                        role,
                    } => {
                        notifier
                            .send_group_membership_notification(to, org_name, group_name, role)
                            .await
                    }
                };

                match result {
                    Ok(()) => debug!(kind, "notification delivered"),
                    Err(e) => warn!(kind, error = %e, "notification delivery failed"),
                }
            }
        });

        (Self { tx }, worker)
    }

    /// Like [`spawn`](Self::spawn), bounded by
    /// `config.notification_queue_capacity`.
    pub fn from_config<N: Notifier>(
        notifier: N,
        config: &ThingsConfig,
    ) -> (Self, JoinHandle<()>) {
        Self::spawn(notifier, config.notification_queue_capacity)
    }

    /// Enqueue without waiting. A full or closed queue drops the
    /// notification.
    pub fn dispatch(&self, notification: Notification) {
        let kind = notification.kind();
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(kind, "notification queue full, dropping notification");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(kind, "notification worker stopped, dropping notification");
            }
        }
    }
}
