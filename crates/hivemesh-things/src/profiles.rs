//! Profile administration.

use std::sync::Arc;

use hivemesh_core::error::HivemeshResult;
use hivemesh_core::external::IdProvider;
use hivemesh_core::models::profile::{CreateProfile, Profile, UpdateProfile};
use hivemesh_core::models::role::Role;
use hivemesh_core::repository::{
    MembershipCache, PaginatedResult, Pagination, ProfileRepository, ThingRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::error::ResourceError;

pub struct ProfileRegistry<B: Backend> {
    backend: Arc<B>,
    gate: AccessGate<B>,
}

impl<B: Backend> Clone for ProfileRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<B: Backend> ProfileRegistry<B> {
    pub fn new(backend: Arc<B>, gate: AccessGate<B>) -> Self {
        Self { backend, gate }
    }

    pub async fn create_profiles(
        &self,
        token: &str,
        group_id: Uuid,
        inputs: Vec<CreateProfile>,
    ) -> HivemeshResult<Vec<Profile>> {
        if inputs.iter().any(|p| p.name.trim().is_empty()) {
            return Err(ResourceError::EmptyName("profile").into());
        }

        self.gate
            .can_user_access_group(token, group_id, Role::Editor)
            .await?;

        let mut profiles = Vec::with_capacity(inputs.len());
        for input in inputs {
            profiles.push(Profile {
                id: self.backend.ids().new_id()?,
                group_id,
                name: input.name,
                config: input.config,
                metadata: input
                    .metadata
                    .unwrap_or(serde_json::Value::Object(Default::default())),
            });
        }

        let profiles = self.backend.profiles().save(profiles).await?;

        let cache = self.backend.cache();
        for profile in &profiles {
            cache.save_group_by_profile(profile.id, group_id).await?;
            info!(profile_id = %profile.id, group_id = %group_id, "profile created");
        }
        Ok(profiles)
    }

    pub async fn update_profile(
        &self,
        token: &str,
        profile_id: Uuid,
        input: UpdateProfile,
    ) -> HivemeshResult<Profile> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ResourceError::EmptyName("profile").into());
        }

        self.gate
            .can_user_access_profile(token, profile_id, Role::Editor)
            .await?;

        let mut profile = self.backend.profiles().retrieve_by_id(profile_id).await?;
        profile.apply(input);
        self.backend.profiles().update(profile).await
    }

    pub async fn view_profile(&self, token: &str, profile_id: Uuid) -> HivemeshResult<Profile> {
        self.gate
            .can_user_access_profile(token, profile_id, Role::Viewer)
            .await?;
        self.backend.profiles().retrieve_by_id(profile_id).await
    }

    /// Profile assigned to a thing.
    pub async fn view_profile_by_thing(
        &self,
        token: &str,
        thing_id: Uuid,
    ) -> HivemeshResult<Profile> {
        self.gate
            .can_user_access_thing(token, thing_id, Role::Viewer)
            .await?;
        let thing = self.backend.things().retrieve_by_id(thing_id).await?;
        self.backend.profiles().retrieve_by_id(thing.profile_id).await
    }

    pub async fn list_profiles_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Profile>> {
        self.gate
            .can_user_access_group(token, group_id, Role::Viewer)
            .await?;
        self.backend
            .profiles()
            .retrieve_by_group_ids(&[group_id], pagination)
            .await
    }

    /// Remove profiles no thing is assigned to.
    pub async fn remove_profiles(&self, token: &str, profile_ids: Vec<Uuid>) -> HivemeshResult<()> {
        let probe = Pagination {
            offset: 0,
            limit: 1,
        };
        for &profile_id in &profile_ids {
            self.gate
                .can_user_access_profile(token, profile_id, Role::Editor)
                .await?;
            let assigned = self
                .backend
                .things()
                .retrieve_by_profile(profile_id, probe)
                .await?;
            if assigned.total > 0 {
                return Err(ResourceError::ProfileAssigned(profile_id).into());
            }
        }

        self.backend.profiles().remove(&profile_ids).await?;

        let cache = self.backend.cache();
        for &profile_id in &profile_ids {
            cache.remove_group_by_profile(profile_id).await?;
        }

        info!(count = profile_ids.len(), "profiles removed");
        Ok(())
    }
}
