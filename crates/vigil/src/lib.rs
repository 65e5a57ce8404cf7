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

//! # Vigil
//!
//! A real-time notification matching and dispatch engine. Vigil consumes a
//! platform's mutation stream, matches every change against user-defined
//! triggers and fans the resulting notifications out through configurable
//! outbound connectors (in-app, email, webhook).
//!
//! ## Architecture
//!
//! The engine is split into two singleton background managers connected by a
//! durable notification event log:
//!
//! - [`manager::NotificationManager`] consumes the mutation stream, runs the
//!   [`matching::MatchingEngine`] over every batch and appends the generated
//!   events to the log. Its digest loop evaluates periodic triggers through
//!   the [`scheduler::DigestScheduler`] on a minute-floored UTC clock.
//! - [`manager::PublisherManager`] consumes the log and dispatches each event
//!   to its recipients' outcomes, capturing every attempt as a
//!   [`manager::DispatchOutcome`].
//!
//! Both managers run as cluster-wide singletons guarded by named locks from
//! the [`services::LockService`]; replicas that lose the lock race skip their
//! tick quietly. Reference data (users, triggers, outcomes, settings) is read
//! through the [`cache::EntityCache`], a typed read-through registry with
//! dependency-aware invalidation.
//!
//! Everything that touches the outside world sits behind the trait seams in
//! [`services`], so the whole engine runs against in-memory fakes in tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vigil::cache::EntityCache;
//! use vigil::manager::{NotificationManager, NotificationManagerConfig};
//! use vigil::matching::MatchingEngine;
//! use vigil::scheduler::DigestScheduler;
//!
//! let cache = Arc::new(EntityCache::new());
//! // register loaders for users, triggers, outcomes, settings ...
//!
//! let manager = Arc::new(NotificationManager::new(
//!     NotificationManagerConfig::default(),
//!     cache,
//!     stream,
//!     log.clone(),
//!     locks,
//!     Arc::new(MatchingEngine::new(evaluator)),
//!     Arc::new(DigestScheduler::new(log)),
//! ));
//! manager.start();
//! ```

pub mod cache;
pub mod manager;
pub mod matching;
pub mod model;
pub mod outcome;
pub mod resolver;
pub mod scheduler;
pub mod services;

pub use cache::{CacheError, CachedValue, EntityCache, EntityKind, EntityLoader};
pub use manager::{
    DispatchOutcome, DispatchResult, ManagerStatus, NotificationManager,
    NotificationManagerConfig, PublisherManager, PublisherManagerConfig,
};
pub use matching::{MatchingEngine, MatchingError};
pub use model::{
    ChangeEvent, DigestEvent, DigestPeriod, EventKind, NotificationEvent, NotificationLogEvent,
    Outcome, PlatformSettings, PlatformUser, Trigger, TriggerKind,
};
pub use outcome::{OutcomeDomain, OutcomeError, OutcomeInput, OutcomePatch};
pub use resolver::{resolve_digest_triggers, resolve_live_triggers, resolve_triggers, ResolvedTrigger};
pub use scheduler::{DigestScheduler, SchedulerError};
