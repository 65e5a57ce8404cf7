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

//! Collaborator interfaces.
//!
//! The engine only orchestrates; everything that touches the outside world is
//! reached through the traits in this module: the distributed lock service,
//! the platform mutation stream, the durable notification event log, the
//! filter predicate evaluator, the outbound transports and the persistence
//! stores. Production wires platform clients in; tests wire in-memory fakes.

pub mod event_log;
pub mod filtering;
pub mod lock;
pub mod stores;
pub mod stream;
pub mod transport;

pub use event_log::{LogError, NotificationLog, NotificationLogConsumer};
pub use filtering::{FilterError, FilterEvaluator};
pub use lock::{LockError, LockGuard, LockService};
pub use stores::{InAppNotification, NotificationStore, OutcomeStore, StoreError};
pub use stream::{MutationStream, StreamConsumer, StreamError, StreamPosition};
pub use transport::{HttpClient, HttpError, Mail, MailSender, SendError, WebhookRequest};
