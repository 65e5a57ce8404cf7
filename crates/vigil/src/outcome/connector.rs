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

//! Static connector registry.
//!
//! Each supported connector declares a JSON schema for its configuration
//! document. Validation happens once, at outcome creation and edit time, so
//! the publisher can deserialize configurations without re-checking.

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::model::ConnectorKind;
use crate::outcome::domain::OutcomeError;

/// A registered connector and the schema its configuration must satisfy.
pub struct ConnectorDefinition {
    pub kind: ConnectorKind,
    pub schema: Value,
}

static CONNECTORS: Lazy<Vec<ConnectorDefinition>> = Lazy::new(|| {
    vec![
        ConnectorDefinition {
            kind: ConnectorKind::Ui,
            schema: json!({"type": "object"}),
        },
        ConnectorDefinition {
            kind: ConnectorKind::Email,
            schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "template": {"type": "string"},
                },
                "required": ["title", "template"],
            }),
        },
        ConnectorDefinition {
            kind: ConnectorKind::Webhook,
            schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "template": {"type": "string"},
                    "verb": {"type": "string", "enum": ["GET", "POST", "PUT", "DELETE"]},
                    "params": {
                        "type": "object",
                        "additionalProperties": {"type": "string"},
                    },
                    "headers": {
                        "type": "object",
                        "additionalProperties": {"type": "string"},
                    },
                },
                "required": ["url", "template", "verb"],
            }),
        },
        ConnectorDefinition {
            kind: ConnectorKind::External,
            schema: json!({"type": "object"}),
        },
    ]
});

/// All registered connectors.
pub fn registered_connectors() -> &'static [ConnectorDefinition] {
    &CONNECTORS
}

/// The configuration schema of one connector.
pub fn connector_schema(kind: ConnectorKind) -> &'static Value {
    // The registry covers every ConnectorKind variant.
    &CONNECTORS
        .iter()
        .find(|definition| definition.kind == kind)
        .map(|definition| &definition.schema)
        .unwrap_or(&Value::Null)
}

/// Validates a configuration document against its connector schema.
pub fn validate_configuration(
    kind: ConnectorKind,
    configuration: &str,
) -> Result<(), OutcomeError> {
    let document: Value =
        serde_json::from_str(configuration).map_err(|e| OutcomeError::InvalidConfiguration {
            message: format!("configuration is not valid JSON: {e}"),
        })?;
    let schema = jsonschema::JSONSchema::compile(connector_schema(kind)).map_err(|e| {
        OutcomeError::InvalidConfiguration {
            message: format!("connector schema failed to compile: {e}"),
        }
    })?;
    if let Err(errors) = schema.validate(&document) {
        let details: Vec<String> = errors.map(|error| error.to_string()).collect();
        return Err(OutcomeError::InvalidConfiguration {
            message: details.join("; "),
        });
    }
    Ok(())
}
