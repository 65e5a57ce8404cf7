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

//! Filter predicate evaluator interface.
//!
//! The predicate language itself is owned by the platform; the matching
//! engine only needs a per-user yes/no answer. Evaluation is per user because
//! filters may reference user-relative context (markings, organization).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::model::PlatformUser;

/// Errors raised by filter evaluation.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter expression: {message}")]
    InvalidExpression { message: String },

    #[error("Filter evaluation failed: {message}")]
    Evaluation { message: String },
}

/// Evaluates a serialized filter predicate tree against an object, in the
/// context of a specific user.
#[async_trait]
pub trait FilterEvaluator: Send + Sync {
    async fn matches(
        &self,
        user: &PlatformUser,
        payload: &Value,
        filters: &Value,
    ) -> Result<bool, FilterError>;
}
