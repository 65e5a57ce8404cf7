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

//! Outcome management: the connector registry with its configuration schemas
//! and the domain operations for creating, editing and listing outcomes.

pub mod connector;
pub mod domain;

pub use connector::{connector_schema, registered_connectors, validate_configuration};
pub use domain::{OutcomeDomain, OutcomeError, OutcomeInput, OutcomePatch};
