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

//! Outcome model: a configured binding between triggers and an outbound
//! connector, plus the typed views of each connector's configuration document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Identifiable;

/// The outbound connectors an outcome can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// In-app notification, persisted through the notification store.
    Ui,
    /// Templated email sent through the mail transport.
    Email,
    /// Templated HTTP call.
    Webhook,
    /// Reserved for forwarding to external connectors.
    External,
}

impl ConnectorKind {
    /// Returns the connector identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::Ui => "ui",
            ConnectorKind::Email => "email",
            ConnectorKind::Webhook => "webhook",
            ConnectorKind::External => "external",
        }
    }

    /// Parses a connector identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ui" => Some(ConnectorKind::Ui),
            "email" => Some(ConnectorKind::Email),
            "webhook" => Some(ConnectorKind::Webhook),
            "external" => Some(ConnectorKind::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted outcome entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Built-in outcomes cannot be deleted through the domain API.
    #[serde(default)]
    pub built_in: bool,
    pub connector: ConnectorKind,
    /// JSON configuration document, validated against the connector schema at
    /// creation/edit time.
    pub configuration: String,
    /// When non-empty, only the listed recipients may use this outcome.
    #[serde(default)]
    pub restricted_user_ids: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Identifiable for Outcome {
    fn internal_id(&self) -> &str {
        &self.id
    }
}

/// Typed view of an email outcome configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfiguration {
    /// Subject template.
    pub title: String,
    /// Body template.
    pub template: String,
}

/// Typed view of a webhook outcome configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfiguration {
    pub url: String,
    /// Body template; the rendered output must parse as JSON.
    pub template: String,
    pub verb: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}
