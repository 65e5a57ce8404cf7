/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outcome domain operations.
//!
//! Configuration documents are validated against the connector schema before
//! any persistence side effect; a rejected outcome leaves the store untouched.
//! Every successful write resets the outcome cache kind.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::cache::{EntityCache, EntityKind};
use crate::model::{ConnectorKind, Outcome, PlatformUser};
use crate::outcome::connector::validate_configuration;
use crate::services::{OutcomeStore, StoreError};

/// Errors raised by the outcome domain.
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("Unknown connector: {connector}")]
    UnknownConnector { connector: String },

    #[error("Invalid outcome configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Outcome not found: {id}")]
    NotFound { id: String },

    #[error("Built-in outcome cannot be deleted: {id}")]
    BuiltIn { id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input for creating an outcome.
#[derive(Debug, Clone)]
pub struct OutcomeInput {
    pub name: String,
    pub description: Option<String>,
    /// Connector identifier, resolved against the registry.
    pub connector: String,
    pub configuration: String,
    pub restricted_user_ids: Vec<String>,
}

/// Partial update of an outcome. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct OutcomePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub configuration: Option<String>,
    pub restricted_user_ids: Option<Vec<String>>,
}

/// Domain service for outcome entities.
pub struct OutcomeDomain {
    store: Arc<dyn OutcomeStore>,
    cache: Arc<EntityCache>,
}

impl OutcomeDomain {
    pub fn new(store: Arc<dyn OutcomeStore>, cache: Arc<EntityCache>) -> Self {
        Self { store, cache }
    }

    /// Creates an outcome after resolving its connector and validating its
    /// configuration. A validation failure has no persistence side effect.
    pub async fn add_outcome(&self, input: OutcomeInput) -> Result<Outcome, OutcomeError> {
        let connector =
            ConnectorKind::parse(&input.connector).ok_or(OutcomeError::UnknownConnector {
                connector: input.connector.clone(),
            })?;
        validate_configuration(connector, &input.configuration)?;

        let now = chrono::Utc::now();
        let outcome = Outcome {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            description: input.description,
            built_in: false,
            connector,
            configuration: input.configuration,
            restricted_user_ids: input.restricted_user_ids,
            created: now,
            updated: now,
        };
        let created = self.store.create(outcome).await?;
        self.cache.reset(EntityKind::Outcome);
        info!(id = %created.id, connector = %created.connector, "Created outcome");
        Ok(created)
    }

    /// Applies a partial update, revalidating the configuration when it
    /// changes.
    pub async fn edit_outcome(&self, id: &str, patch: OutcomePatch) -> Result<Outcome, OutcomeError> {
        let mut outcome = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| OutcomeError::NotFound { id: id.to_string() })?;

        if let Some(configuration) = patch.configuration {
            validate_configuration(outcome.connector, &configuration)?;
            outcome.configuration = configuration;
        }
        if let Some(name) = patch.name {
            outcome.name = name;
        }
        if let Some(description) = patch.description {
            outcome.description = description;
        }
        if let Some(restricted_user_ids) = patch.restricted_user_ids {
            outcome.restricted_user_ids = restricted_user_ids;
        }
        outcome.updated = chrono::Utc::now();

        let updated = self.store.update(outcome).await?;
        self.cache.reset(EntityKind::Outcome);
        info!(id = %updated.id, "Updated outcome");
        Ok(updated)
    }

    /// Deletes an outcome. Built-in outcomes are protected.
    pub async fn delete_outcome(&self, id: &str) -> Result<(), OutcomeError> {
        let outcome = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| OutcomeError::NotFound { id: id.to_string() })?;
        if outcome.built_in {
            return Err(OutcomeError::BuiltIn { id: id.to_string() });
        }
        self.store.delete(id).await?;
        self.cache.reset(EntityKind::Outcome);
        info!(id = %id, "Deleted outcome");
        Ok(())
    }

    pub async fn get_outcome(&self, id: &str) -> Result<Outcome, OutcomeError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| OutcomeError::NotFound { id: id.to_string() })
    }

    /// Outcomes the given user may bind to a trigger: unrestricted outcomes
    /// plus those explicitly listing the user, sorted by name.
    pub async fn usable_outcomes(&self, user: &PlatformUser) -> Result<Vec<Outcome>, OutcomeError> {
        let cached = self
            .cache
            .outcomes()
            .await
            .map_err(|e| StoreError::Backend {
                message: e.to_string(),
            })?;
        let mut usable: Vec<Outcome> = cached
            .iter()
            .filter(|outcome| {
                outcome.restricted_user_ids.is_empty()
                    || outcome.restricted_user_ids.contains(&user.internal_id)
            })
            .cloned()
            .collect();
        usable.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(usable)
    }
}
