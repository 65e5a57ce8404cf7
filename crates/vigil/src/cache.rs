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

//! Read-through reference data cache.
//!
//! A typed registry mapping entity kinds to a loader, a static list of
//! dependent kinds and an optional cached value. Values are populated lazily
//! on first read and cleared by [`EntityCache::reset`], which also clears
//! every dependent kind: role and group changes invalidate the user cache,
//! trigger and stream collection changes invalidate the resolved filters
//! cache. Nothing here is persisted; the whole cache is rebuildable by
//! replaying loaders.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::model::{build_identity_map, Outcome, PlatformSettings, PlatformUser, Trigger};

/// Entity kinds known to the caching system.
///
/// `Role`, `Group` and `StreamCollection` are invalidation sources only: they
/// appear in the dependency table but carry no loader of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Role,
    Group,
    Trigger,
    StreamCollection,
    Settings,
    Outcome,
    ResolvedFilters,
}

impl EntityKind {
    /// Returns the kind name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Role => "Role",
            EntityKind::Group => "Group",
            EntityKind::Trigger => "Trigger",
            EntityKind::StreamCollection => "StreamCollection",
            EntityKind::Settings => "Settings",
            EntityKind::Outcome => "Outcome",
            EntityKind::ResolvedFilters => "ResolvedFilters",
        }
    }

    /// Static dependency links: resetting a kind also resets every kind
    /// listed here.
    fn dependents(&self) -> &'static [EntityKind] {
        match self {
            // Filters must be reset on stream collection and trigger changes.
            EntityKind::StreamCollection | EntityKind::Trigger => &[EntityKind::ResolvedFilters],
            // Users must be reset on role and group changes.
            EntityKind::Role | EntityKind::Group => &[EntityKind::User],
            _ => &[],
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cached snapshot for one entity kind.
///
/// Entity kinds cache a list; the resolved filters kind caches a map from
/// object id to its resolved representation, because that is the shape its
/// single consumer needs on the hot path.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Users(Arc<Vec<PlatformUser>>),
    Triggers(Arc<Vec<Trigger>>),
    Outcomes(Arc<Vec<Outcome>>),
    Settings(Arc<PlatformSettings>),
    Filters(Arc<HashMap<String, Value>>),
}

impl CachedValue {
    /// The entity kind this value belongs to.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            CachedValue::Users(_) => EntityKind::User,
            CachedValue::Triggers(_) => EntityKind::Trigger,
            CachedValue::Outcomes(_) => EntityKind::Outcome,
            CachedValue::Settings(_) => EntityKind::Settings,
            CachedValue::Filters(_) => EntityKind::ResolvedFilters,
        }
    }
}

/// Errors raised by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The kind has no registered loader. A configuration error, never
    /// retried.
    #[error("{kind} is not supported in cache configuration")]
    NotCacheable { kind: EntityKind },

    /// A loader returned a value whose shape does not match its kind.
    #[error("Loader for {kind} produced a {got} value")]
    ShapeMismatch { kind: EntityKind, got: EntityKind },

    /// The loader itself failed.
    #[error("Loader for {kind} failed: {message}")]
    Loader { kind: EntityKind, message: String },
}

/// Loads the authoritative value for one entity kind.
#[async_trait]
pub trait EntityLoader: Send + Sync {
    async fn load(&self) -> Result<CachedValue, CacheError>;
}

struct CacheSlot {
    loader: Arc<dyn EntityLoader>,
    value: Option<CachedValue>,
}

/// The shared reference data cache.
///
/// Read-shared by all loops; writes are limited to [`EntityCache::reset`]
/// from the owning domain of each entity kind and the narrow
/// [`EntityCache::patch_resolved_filter`] path.
#[derive(Default)]
pub struct EntityCache {
    slots: RwLock<HashMap<EntityKind, CacheSlot>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the loader for an entity kind, making it cacheable.
    pub fn register(&self, kind: EntityKind, loader: Arc<dyn EntityLoader>) {
        let mut slots = self.slots.write();
        slots.insert(kind, CacheSlot {
            loader,
            value: None,
        });
    }

    /// Read-through access: returns the cached value, populating it through
    /// the registered loader on first read after (re)population.
    pub async fn get(&self, kind: EntityKind) -> Result<CachedValue, CacheError> {
        let loader = {
            let slots = self.slots.read();
            let slot = slots
                .get(&kind)
                .ok_or(CacheError::NotCacheable { kind })?;
            if let Some(value) = &slot.value {
                return Ok(value.clone());
            }
            slot.loader.clone()
        };

        // Concurrent first reads may race the loader; last write wins, which
        // is harmless for a snapshot cache.
        let value = loader.load().await?;
        if value.entity_kind() != kind {
            return Err(CacheError::ShapeMismatch {
                kind,
                got: value.entity_kind(),
            });
        }

        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(&kind) {
            slot.value = Some(value.clone());
        }
        debug!(kind = %kind, "Populated cache entry");
        Ok(value)
    }

    /// Replaces the cached value for a registered kind without invoking the
    /// loader.
    pub fn write(&self, kind: EntityKind, value: CachedValue) -> Result<(), CacheError> {
        let mut slots = self.slots.write();
        let slot = slots
            .get_mut(&kind)
            .ok_or(CacheError::NotCacheable { kind })?;
        slot.value = Some(value);
        Ok(())
    }

    /// Clears the cached value for `kind` and for every kind declared
    /// dependent on it. Values are recomputed on next read, not eagerly.
    ///
    /// Resetting a kind outside the caching system is a no-op for that kind
    /// but still clears its dependents.
    pub fn reset(&self, kind: EntityKind) {
        let mut slots = self.slots.write();
        for target in std::iter::once(kind).chain(kind.dependents().iter().copied()) {
            if let Some(slot) = slots.get_mut(&target) {
                slot.value = None;
                debug!(kind = %target, "Reset cache entry");
            }
        }
    }

    /// Patches one entry of the resolved filters map in place, when the entry
    /// is already resolved. Keeps filter hot paths cheap compared to a full
    /// reset.
    pub fn patch_resolved_filter(&self, id: &str, value: Value) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get_mut(&EntityKind::ResolvedFilters) {
            if let Some(CachedValue::Filters(map)) = &mut slot.value {
                if map.contains_key(id) {
                    Arc::make_mut(map).insert(id.to_string(), value);
                }
            }
        }
    }

    /// Cached user list.
    pub async fn users(&self) -> Result<Arc<Vec<PlatformUser>>, CacheError> {
        match self.get(EntityKind::User).await? {
            CachedValue::Users(users) => Ok(users),
            other => Err(CacheError::ShapeMismatch {
                kind: EntityKind::User,
                got: other.entity_kind(),
            }),
        }
    }

    /// Cached trigger list.
    pub async fn triggers(&self) -> Result<Arc<Vec<Trigger>>, CacheError> {
        match self.get(EntityKind::Trigger).await? {
            CachedValue::Triggers(triggers) => Ok(triggers),
            other => Err(CacheError::ShapeMismatch {
                kind: EntityKind::Trigger,
                got: other.entity_kind(),
            }),
        }
    }

    /// Cached outcome list.
    pub async fn outcomes(&self) -> Result<Arc<Vec<Outcome>>, CacheError> {
        match self.get(EntityKind::Outcome).await? {
            CachedValue::Outcomes(outcomes) => Ok(outcomes),
            other => Err(CacheError::ShapeMismatch {
                kind: EntityKind::Outcome,
                got: other.entity_kind(),
            }),
        }
    }

    /// Cached platform settings.
    pub async fn settings(&self) -> Result<Arc<PlatformSettings>, CacheError> {
        match self.get(EntityKind::Settings).await? {
            CachedValue::Settings(settings) => Ok(settings),
            other => Err(CacheError::ShapeMismatch {
                kind: EntityKind::Settings,
                got: other.entity_kind(),
            }),
        }
    }

    /// Cached resolved filters map.
    pub async fn resolved_filters(&self) -> Result<Arc<HashMap<String, Value>>, CacheError> {
        match self.get(EntityKind::ResolvedFilters).await? {
            CachedValue::Filters(map) => Ok(map),
            other => Err(CacheError::ShapeMismatch {
                kind: EntityKind::ResolvedFilters,
                got: other.entity_kind(),
            }),
        }
    }

    /// Cached user index, keyed by every identifier alias.
    pub async fn user_map(&self) -> Result<HashMap<String, PlatformUser>, CacheError> {
        Ok(build_identity_map(&self.users().await?))
    }

    /// Cached trigger index by id.
    pub async fn trigger_map(&self) -> Result<HashMap<String, Trigger>, CacheError> {
        Ok(build_identity_map(&self.triggers().await?))
    }

    /// Cached outcome index by id.
    pub async fn outcome_map(&self) -> Result<HashMap<String, Outcome>, CacheError> {
        Ok(build_identity_map(&self.outcomes().await?))
    }
}
