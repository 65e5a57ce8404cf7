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

//! Persistence store interfaces: outcome entities and in-app notifications.
//!
//! The entity store itself is platform-owned; the engine only issues writes
//! through these narrow seams.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ContentSection, Outcome};

/// Errors raised by the persistence stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entity not found: {id}")]
    NotFound { id: String },

    #[error("Store operation failed: {message}")]
    Backend { message: String },
}

/// Persistence for outcome configuration entities.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn create(&self, outcome: Outcome) -> Result<Outcome, StoreError>;
    async fn update(&self, outcome: Outcome) -> Result<Outcome, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Outcome>, StoreError>;
    async fn list(&self) -> Result<Vec<Outcome>, StoreError>;
}

/// An in-app notification record created by the `ui` connector.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InAppNotification {
    pub name: String,
    /// Kind of the owning trigger (`live` or `digest`).
    pub notification_type: String,
    pub user_id: String,
    /// Content sections grouped by originating trigger name.
    pub content: Vec<ContentSection>,
    pub created: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Persistence for in-app notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn add_notification(&self, notification: InAppNotification) -> Result<(), StoreError>;
}
