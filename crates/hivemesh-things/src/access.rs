//! Authorization decision point for group-owned resources.
//!
//! Requests against a thing or profile are resolved to the owning group
//! and handed to the external authority together with the required
//! role. Role comparison happens entirely in the authority.

use std::sync::Arc;

use hivemesh_core::error::HivemeshResult;
use hivemesh_core::external::{AuthAuthority, AuthzRequest};
use hivemesh_core::models::role::Role;
use hivemesh_core::models::thing::ThingKey;
use hivemesh_core::repository::ThingRepository;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::ResourceError;
use crate::hierarchy::ResourceHierarchy;

pub struct AccessGate<B: Backend> {
    backend: Arc<B>,
    hierarchy: ResourceHierarchy<B>,
}

impl<B: Backend> Clone for AccessGate<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            hierarchy: self.hierarchy.clone(),
        }
    }
}

impl<B: Backend> AccessGate<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let hierarchy = ResourceHierarchy::new(backend.clone());
        Self { backend, hierarchy }
    }

    pub fn hierarchy(&self) -> &ResourceHierarchy<B> {
        &self.hierarchy
    }

    pub async fn can_user_access_group(
        &self,
        token: &str,
        group_id: Uuid,
        action: Role,
    ) -> HivemeshResult<()> {
        self.backend
            .auth()
            .authorize(token, AuthzRequest::group(group_id, action))
            .await
    }

    pub async fn can_user_access_thing(
        &self,
        token: &str,
        thing_id: Uuid,
        action: Role,
    ) -> HivemeshResult<()> {
        let group_id = self.hierarchy.group_id_by_thing(thing_id).await?;
        self.can_user_access_group(token, group_id, action).await
    }

    pub async fn can_user_access_profile(
        &self,
        token: &str,
        profile_id: Uuid,
        action: Role,
    ) -> HivemeshResult<()> {
        let group_id = self.hierarchy.group_id_by_profile(profile_id).await?;
        self.can_user_access_group(token, group_id, action).await
    }

    /// Check the group and that every listed thing belongs to it.
    pub async fn can_user_access_group_things(
        &self,
        token: &str,
        group_id: Uuid,
        action: Role,
        thing_ids: &[Uuid],
    ) -> HivemeshResult<()> {
        self.can_user_access_group(token, group_id, action).await?;

        for &thing_id in thing_ids {
            if self.hierarchy.group_id_by_thing(thing_id).await? != group_id {
                return Err(ResourceError::ThingOutsideGroup { thing_id, group_id }.into());
            }
        }
        Ok(())
    }

    /// Allow a thing, identified by its key, to act within its own group
    /// only.
    pub async fn can_thing_access_group(
        &self,
        key: &ThingKey,
        group_id: Uuid,
    ) -> HivemeshResult<Uuid> {
        let thing_id = self.identify(key).await?;
        if self.hierarchy.group_id_by_thing(thing_id).await? != group_id {
            return Err(ResourceError::ThingOutsideGroup { thing_id, group_id }.into());
        }
        Ok(thing_id)
    }

    /// Resolve a thing identifier from one of its keys.
    pub async fn identify(&self, key: &ThingKey) -> HivemeshResult<Uuid> {
        let thing = self.backend.things().retrieve_by_key(key).await?;
        Ok(thing.id)
    }

    /// Like [`ResourceHierarchy::is_root`].
    pub async fn is_root(&self, token: &str) -> HivemeshResult<bool> {
        self.hierarchy.is_root(token).await
    }
}
