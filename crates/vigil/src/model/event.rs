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

//! Event types: the change events received from the platform mutation stream
//! and the notification/digest events generated by the engine.

use json_patch::Patch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version tag stamped on every generated notification event.
pub const NOTIFICATION_EVENT_VERSION: &str = "1";

/// Kind of a change observed on the mutation stream.
///
/// Also used as the transition classification of a change relative to a user's
/// filter: a change whose object becomes newly visible is reported as `Create`
/// and one whose object is no longer visible as `Delete`, whatever the
/// original mutation was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    /// Returns the wire representation of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One mutation delivered by the platform stream.
///
/// `payload` is the object after the change. Update events additionally carry
/// a reverse patch which, applied to the payload, reconstructs the object as
/// it was before the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// What happened to the object.
    pub kind: EventKind,
    /// The object after the change.
    pub payload: Value,
    /// Inverse diff reconstructing the pre-change object (updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_patch: Option<Patch>,
}

/// Recipient of a generated notification, with the outcome ids bound to it by
/// the owning trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationUser {
    pub user_id: String,
    pub user_email: String,
    pub outcomes: Vec<String>,
}

/// One recipient of a live notification event and the transition that was
/// classified for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub user: NotificationUser,
    pub kind: EventKind,
}

/// Live notification event: one matched change, all recipients aggregated.
///
/// Produced by the live matching engine, appended to the notification event
/// log and consumed once by the publisher. Only emitted when at least one
/// recipient has a non-empty transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub version: String,
    /// Id of the trigger that matched.
    pub notification_id: String,
    pub targets: Vec<NotificationTarget>,
    /// The changed object.
    pub data: Value,
}

/// One aggregated item of a digest: the originating live trigger, the object
/// and the transition kind it was recorded with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestItem {
    pub notification_id: String,
    pub instance: Value,
    pub kind: EventKind,
}

/// Digest notification event: one recipient, the items collected over the
/// digest window in recorded order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEvent {
    pub version: String,
    /// Id of the digest trigger that fired.
    pub notification_id: String,
    pub target: NotificationUser,
    pub data: Vec<DigestItem>,
}

/// One rendered content line of an in-app or templated notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEvent {
    /// The transition kind, as recorded on the target.
    pub operation: String,
    /// Human-readable one-line summary of the changed object.
    pub message: String,
    pub instance_id: String,
}

/// Notification content grouped by originating trigger name, so a single
/// digest can present one section per trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSection {
    /// Name of the originating trigger.
    pub title: String,
    pub events: Vec<ContentEvent>,
}

/// An entry of the durable notification event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationLogEvent {
    Live(NotificationEvent),
    Digest(DigestEvent),
}

impl NotificationLogEvent {
    /// Id of the trigger this event was generated for.
    pub fn notification_id(&self) -> &str {
        match self {
            NotificationLogEvent::Live(event) => &event.notification_id,
            NotificationLogEvent::Digest(event) => &event.notification_id,
        }
    }
}
