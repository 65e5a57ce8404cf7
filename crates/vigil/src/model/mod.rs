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

//! Domain types shared across the engine: triggers, users, outcomes and the
//! generated notification events that flow through the event log.

pub mod event;
pub mod outcome;
pub mod platform;
pub mod trigger;

pub use event::{
    ChangeEvent, ContentEvent, ContentSection, DigestEvent, DigestItem, EventKind,
    NotificationEvent, NotificationLogEvent, NotificationTarget, NotificationUser,
    NOTIFICATION_EVENT_VERSION,
};
pub use outcome::{ConnectorKind, EmailConfiguration, Outcome, WebhookConfiguration};
pub use platform::{PlatformSettings, PlatformUser};
pub use trigger::{DigestPeriod, DigestSpec, LiveSpec, Trigger, TriggerKind};

use std::collections::HashMap;

/// Entities that can be looked up by more than one identifier.
///
/// Beyond the internal id, platform entities commonly expose a standard id and
/// a list of external ids coming from upstream data sources. Cache maps index
/// entities under every alias so a lookup by any of them succeeds.
pub trait Identifiable {
    /// The internal, platform-assigned identifier.
    fn internal_id(&self) -> &str;

    /// The deterministic standard identifier, when the entity has one.
    fn standard_id(&self) -> Option<&str> {
        None
    }

    /// Identifiers assigned by external systems.
    fn external_ids(&self) -> &[String] {
        &[]
    }
}

/// Builds an index of entities keyed by every identifier alias each exposes.
pub fn build_identity_map<T: Identifiable + Clone>(entities: &[T]) -> HashMap<String, T> {
    let mut by_id = HashMap::new();
    for entity in entities {
        by_id.insert(entity.internal_id().to_string(), entity.clone());
        if let Some(standard_id) = entity.standard_id() {
            by_id.insert(standard_id.to_string(), entity.clone());
        }
        for external_id in entity.external_ids() {
            by_id.insert(external_id.clone(), entity.clone());
        }
    }
    by_id
}
