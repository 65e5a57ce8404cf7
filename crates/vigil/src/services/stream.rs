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

//! Platform mutation stream interface (change-data-capture of platform
//! mutations).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ChangeEvent;

/// Where a stream subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// Start from "now": only mutations committed after attachment.
    Live,
    /// Start from a recorded instant.
    From(DateTime<Utc>),
}

/// Errors raised by the mutation stream.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream subscription failed: {message}")]
    Subscribe { message: String },

    #[error("Stream connection lost: {message}")]
    Disconnected { message: String },
}

/// An attached consumer delivering batches of change events in arrival order.
#[async_trait]
pub trait StreamConsumer: Send + Sync {
    /// Waits for the next batch. `Ok(None)` signals an idle timeout with the
    /// stream still healthy; callers simply wait again.
    async fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>, StreamError>;

    /// Detaches the consumer. Must be called during loop cleanup.
    async fn shutdown(&mut self);
}

/// The platform mutation stream.
#[async_trait]
pub trait MutationStream: Send + Sync {
    /// Attaches a consumer at the given position.
    async fn subscribe(
        &self,
        position: StreamPosition,
    ) -> Result<Box<dyn StreamConsumer>, StreamError>;
}
