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

//! Singleton background managers.
//!
//! Two explicit service objects drive the engine: the notification manager
//! consumes the platform mutation stream and fills the notification event log,
//! and the publisher manager consumes that log and dispatches through the
//! configured connectors. Each runs as a cluster-wide singleton guarded by a
//! named lock; a replica that loses the lock race skips its tick quietly and
//! tries again on the next interval.

pub mod notification;
pub mod publisher;

pub use notification::{NotificationManager, NotificationManagerConfig};
pub use publisher::{
    DispatchOutcome, DispatchResult, PublisherError, PublisherManager, PublisherManagerConfig,
};

/// Snapshot of a manager's lifecycle state, as reported by `status()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManagerStatus {
    /// Stable manager identifier.
    pub id: &'static str,
    /// Whether the manager is enabled by configuration.
    pub enabled: bool,
    /// Whether this replica currently holds the lock and is consuming.
    pub running: bool,
    /// Mail transport liveness, reported by the publisher manager only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_active: Option<bool>,
}
