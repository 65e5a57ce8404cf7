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

//! Externally owned platform records the engine reads through the cache:
//! user accounts and the platform settings document.

use serde::{Deserialize, Serialize};

use super::Identifiable;

/// A platform user account, as resolved for notification purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub internal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_id: Option<String>,
    #[serde(default)]
    pub external_ids: Vec<String>,
    pub user_email: String,
    /// Ids of the groups the user belongs to. Group membership drives trigger
    /// recipient resolution and invalidates the user cache on change.
    #[serde(default)]
    pub group_ids: Vec<String>,
}

impl Identifiable for PlatformUser {
    fn internal_id(&self) -> &str {
        &self.internal_id
    }

    fn standard_id(&self) -> Option<&str> {
        self.standard_id.as_deref()
    }

    fn external_ids(&self) -> &[String] {
        &self.external_ids
    }
}

/// Platform-wide settings consumed when rendering outbound notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Sender address for email outcomes.
    pub platform_email: String,
    /// Base URL of the platform, injected into templates.
    pub platform_url: String,
    /// Dark theme background color, used as the default email background.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_theme_dark_background: Option<String>,
}

impl PlatformSettings {
    /// Background color for rendered templates, without the leading `#`.
    pub fn background_color(&self) -> String {
        self.platform_theme_dark_background
            .as_deref()
            .unwrap_or("#0a1929")
            .trim_start_matches('#')
            .to_string()
    }
}
