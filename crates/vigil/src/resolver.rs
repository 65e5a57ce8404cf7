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

//! Trigger recipient resolution.
//!
//! Pure joins over cache snapshots: for every trigger, the subscribed users
//! are the members of any declared group plus the users explicitly listed.
//! Duplicates are intentionally preserved: a user who is both a group member
//! and explicitly listed appears twice and is dispatched to twice.
//! No event stream consumption happens here.

use crate::cache::{CacheError, EntityCache};
use crate::model::{PlatformUser, Trigger};

/// A trigger joined with its subscribed users.
#[derive(Debug, Clone)]
pub struct ResolvedTrigger {
    pub trigger: Trigger,
    pub users: Vec<PlatformUser>,
}

/// Resolves every cached trigger to its subscribed users.
pub async fn resolve_triggers(cache: &EntityCache) -> Result<Vec<ResolvedTrigger>, CacheError> {
    let triggers = cache.triggers().await?;
    let users = cache.users().await?;
    let resolved = triggers
        .iter()
        .map(|trigger| {
            let from_groups = users.iter().filter(|user| {
                user.group_ids
                    .iter()
                    .any(|group_id| trigger.group_ids.contains(group_id))
            });
            let from_ids = users
                .iter()
                .filter(|user| trigger.user_ids.contains(&user.internal_id));
            ResolvedTrigger {
                trigger: trigger.clone(),
                users: from_groups.chain(from_ids).cloned().collect(),
            }
        })
        .collect();
    Ok(resolved)
}

/// Resolved live triggers only.
pub async fn resolve_live_triggers(
    cache: &EntityCache,
) -> Result<Vec<ResolvedTrigger>, CacheError> {
    let resolved = resolve_triggers(cache).await?;
    Ok(resolved.into_iter().filter(|r| r.trigger.is_live()).collect())
}

/// Resolved digest triggers only.
pub async fn resolve_digest_triggers(
    cache: &EntityCache,
) -> Result<Vec<ResolvedTrigger>, CacheError> {
    let resolved = resolve_triggers(cache).await?;
    Ok(resolved
        .into_iter()
        .filter(|r| r.trigger.is_digest())
        .collect())
}
