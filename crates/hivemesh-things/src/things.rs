//! Thing administration and identification.

use std::sync::Arc;

use hivemesh_core::error::{HivemeshError, HivemeshResult};
use hivemesh_core::external::IdProvider;
use hivemesh_core::models::role::Role;
use hivemesh_core::models::thing::{CreateThing, Thing, ThingKey, UpdateThing};
use hivemesh_core::repository::{MembershipCache, PaginatedResult, Pagination, ThingRepository};
use tracing::info;
use uuid::Uuid;

use crate::access::AccessGate;
use crate::backend::Backend;
use crate::error::ResourceError;

pub struct ThingRegistry<B: Backend> {
    backend: Arc<B>,
    gate: AccessGate<B>,
}

impl<B: Backend> Clone for ThingRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<B: Backend> ThingRegistry<B> {
    pub fn new(backend: Arc<B>, gate: AccessGate<B>) -> Self {
        Self { backend, gate }
    }

    /// Create things in a group. Each thing's profile must belong to the
    /// same group.
    pub async fn create_things(
        &self,
        token: &str,
        group_id: Uuid,
        inputs: Vec<CreateThing>,
    ) -> HivemeshResult<Vec<Thing>> {
        if inputs.iter().any(|t| t.name.trim().is_empty()) {
            return Err(ResourceError::EmptyName("thing").into());
        }

        self.gate
            .can_user_access_group(token, group_id, Role::Editor)
            .await?;
        for input in &inputs {
            self.require_profile_in_group(input.profile_id, group_id)
                .await?;
        }

        let ids = self.backend.ids();
        let mut things = Vec::with_capacity(inputs.len());
        for input in inputs {
            let key = if input.key.is_empty() {
                ids.new_id()?.to_string()
            } else {
                input.key
            };
            things.push(Thing {
                id: ids.new_id()?,
                group_id,
                profile_id: input.profile_id,
                name: input.name,
                key,
                external_key: input.external_key,
                metadata: input
                    .metadata
                    .unwrap_or(serde_json::Value::Object(Default::default())),
            });
        }

        let things = self.backend.things().save(things).await?;

        let cache = self.backend.cache();
        for thing in &things {
            cache.save_group_by_thing(thing.id, group_id).await?;
            info!(thing_id = %thing.id, group_id = %group_id, "thing created");
        }
        Ok(things)
    }

    pub async fn update_thing(
        &self,
        token: &str,
        thing_id: Uuid,
        input: UpdateThing,
    ) -> HivemeshResult<Thing> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ResourceError::EmptyName("thing").into());
        }

        self.gate
            .can_user_access_thing(token, thing_id, Role::Editor)
            .await?;

        let mut thing = self.backend.things().retrieve_by_id(thing_id).await?;
        if let Some(profile_id) = input.profile_id {
            self.require_profile_in_group(profile_id, thing.group_id)
                .await?;
        }
        thing.apply(input);
        self.backend.things().update(thing).await
    }

    /// Move a thing to another group together with a profile of that
    /// group.
    pub async fn update_thing_group_and_profile(
        &self,
        token: &str,
        thing_id: Uuid,
        group_id: Uuid,
        profile_id: Uuid,
    ) -> HivemeshResult<Thing> {
        self.gate
            .can_user_access_thing(token, thing_id, Role::Editor)
            .await?;
        let mut thing = self.backend.things().retrieve_by_id(thing_id).await?;
        if group_id != thing.group_id {
            self.gate
                .can_user_access_group(token, group_id, Role::Editor)
                .await?;
        }
        self.require_profile_in_group(profile_id, group_id).await?;

        thing.group_id = group_id;
        thing.profile_id = profile_id;
        let thing = self.backend.things().update(thing).await?;

        self.backend
            .cache()
            .save_group_by_thing(thing_id, group_id)
            .await?;

        info!(thing_id = %thing_id, group_id = %group_id, profile_id = %profile_id, "thing moved");
        Ok(thing)
    }

    pub async fn update_external_key(
        &self,
        token: &str,
        thing_id: Uuid,
        external_key: String,
    ) -> HivemeshResult<()> {
        if external_key.is_empty() {
            return Err(HivemeshError::malformed("external key must not be empty"));
        }
        self.gate
            .can_user_access_thing(token, thing_id, Role::Editor)
            .await?;
        self.backend
            .things()
            .update_external_key(thing_id, Some(external_key))
            .await
    }

    pub async fn remove_external_key(&self, token: &str, thing_id: Uuid) -> HivemeshResult<()> {
        self.gate
            .can_user_access_thing(token, thing_id, Role::Editor)
            .await?;
        self.backend
            .things()
            .update_external_key(thing_id, None)
            .await
    }

    pub async fn view_thing(&self, token: &str, thing_id: Uuid) -> HivemeshResult<Thing> {
        self.gate
            .can_user_access_thing(token, thing_id, Role::Viewer)
            .await?;
        self.backend.things().retrieve_by_id(thing_id).await
    }

    pub async fn list_things_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Thing>> {
        self.gate
            .can_user_access_group(token, group_id, Role::Viewer)
            .await?;
        self.backend
            .things()
            .retrieve_by_group_ids(&[group_id], pagination)
            .await
    }

    pub async fn list_things_by_profile(
        &self,
        token: &str,
        profile_id: Uuid,
        pagination: Pagination,
    ) -> HivemeshResult<PaginatedResult<Thing>> {
        self.gate
            .can_user_access_profile(token, profile_id, Role::Viewer)
            .await?;
        self.backend
            .things()
            .retrieve_by_profile(profile_id, pagination)
            .await
    }

    /// Remove things. Access to every owning group is checked first.
    pub async fn remove_things(&self, token: &str, thing_ids: Vec<Uuid>) -> HivemeshResult<()> {
        for &thing_id in &thing_ids {
            self.gate
                .can_user_access_thing(token, thing_id, Role::Editor)
                .await?;
        }

        self.backend.things().remove(&thing_ids).await?;

        let cache = self.backend.cache();
        for &thing_id in &thing_ids {
            cache.remove_group_by_thing(thing_id).await?;
        }

        info!(count = thing_ids.len(), "things removed");
        Ok(())
    }

    /// Resolve a thing identifier from one of its keys.
    pub async fn identify(&self, key: &ThingKey) -> HivemeshResult<Uuid> {
        self.gate.identify(key).await
    }

    async fn require_profile_in_group(&self, profile_id: Uuid, group_id: Uuid) -> HivemeshResult<()> {
        let profile_group = self
            .gate
            .hierarchy()
            .group_id_by_profile(profile_id)
            .await?;
        if profile_group != group_id {
            return Err(ResourceError::ProfileOutsideGroup {
                profile_id,
                group_id,
            }
            .into());
        }
        Ok(())
    }
}
