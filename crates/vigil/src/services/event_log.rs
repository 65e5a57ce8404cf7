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

//! Durable notification event log interface.
//!
//! The sole piece of mutable state shared between the two managers: the
//! notification manager appends, the publisher manager consumes, and the
//! digest scheduler range-reads the lookback window. The log must preserve
//! append order and support range reads by time window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::NotificationLogEvent;
use crate::services::stream::StreamPosition;

/// Errors raised by the notification event log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Event log append failed: {message}")]
    Append { message: String },

    #[error("Event log read failed: {message}")]
    Read { message: String },

    #[error("Event log subscription failed: {message}")]
    Subscribe { message: String },
}

/// An attached consumer of the notification event log.
#[async_trait]
pub trait NotificationLogConsumer: Send + Sync {
    /// Waits for the next batch of log entries; `Ok(None)` is an idle
    /// timeout.
    async fn next_batch(&mut self) -> Result<Option<Vec<NotificationLogEvent>>, LogError>;

    /// Detaches the consumer.
    async fn shutdown(&mut self);
}

/// Append-ordered, time-indexed notification event log.
#[async_trait]
pub trait NotificationLog: Send + Sync {
    /// Appends one generated event, stamped with the current instant.
    async fn append(&self, event: NotificationLogEvent) -> Result<(), LogError>;

    /// Returns the events recorded in `[from, to]`, in append order.
    async fn range_read(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NotificationLogEvent>, LogError>;

    /// Attaches a consumer for the publisher side.
    async fn subscribe(
        &self,
        position: StreamPosition,
    ) -> Result<Box<dyn NotificationLogConsumer>, LogError>;
}
