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

//! Live matching engine.
//!
//! For each incoming change event and each subscribed user of each live
//! trigger, evaluates the trigger's filter against the object before and
//! after the change and classifies the visibility transition: newly visible
//! is reported as `create`, no longer visible as `delete`, still visible
//! passes the original event kind through. Predicate evaluation is delegated
//! to the platform's [`FilterEvaluator`]; this engine owns only the
//! transition classification.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::model::{
    ChangeEvent, EventKind, NotificationEvent, NotificationTarget, NotificationUser,
    PlatformUser, Trigger, NOTIFICATION_EVENT_VERSION,
};
use crate::resolver::ResolvedTrigger;
use crate::services::{FilterError, FilterEvaluator};
use std::sync::Arc;

/// Errors raised while matching a batch.
#[derive(Debug, Error)]
pub enum MatchingError {
    /// A trigger carries a filter document that is not valid JSON.
    #[error("Invalid filter expression on trigger {trigger_id}: {message}")]
    InvalidFilters { trigger_id: String, message: String },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Classifies a change relative to one user's filter.
///
/// Returns `None` when the change is invisible to the user both before and
/// after, i.e. no notification at all.
pub fn classify_transition(
    previously_matched: bool,
    currently_matched: bool,
    kind: EventKind,
) -> Option<EventKind> {
    if previously_matched && !currently_matched {
        // No longer visible.
        Some(EventKind::Delete)
    } else if !previously_matched && currently_matched {
        // Newly visible.
        Some(EventKind::Create)
    } else if currently_matched {
        Some(kind)
    } else {
        None
    }
}

/// The live matching engine.
pub struct MatchingEngine {
    evaluator: Arc<dyn FilterEvaluator>,
}

impl MatchingEngine {
    pub fn new(evaluator: Arc<dyn FilterEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Matches a whole stream batch in arrival order.
    pub async fn match_batch(
        &self,
        events: &[ChangeEvent],
        live_triggers: &[ResolvedTrigger],
    ) -> Result<Vec<NotificationEvent>, MatchingError> {
        let mut generated = Vec::new();
        for event in events {
            generated.extend(self.match_event(event, live_triggers).await?);
        }
        Ok(generated)
    }

    /// Matches one change event against every resolved live trigger,
    /// producing at most one notification event per trigger (the one
    /// aggregating all recipients with a non-empty transition).
    pub async fn match_event(
        &self,
        event: &ChangeEvent,
        live_triggers: &[ResolvedTrigger],
    ) -> Result<Vec<NotificationEvent>, MatchingError> {
        // The pre-image is shared by every trigger evaluating this event.
        let pre_image = match event.kind {
            EventKind::Update => match reconstruct_pre_image(event) {
                Some(previous) => Some(previous),
                // No pre-image means no transition can be classified; the
                // event is treated as unmatched rather than failing the batch.
                None => return Ok(Vec::new()),
            },
            _ => None,
        };

        let mut generated = Vec::new();
        for resolved in live_triggers {
            let Some(spec) = resolved.trigger.live_spec() else {
                continue;
            };
            let filters = parse_filters(&resolved.trigger)?;
            let mut targets = Vec::new();

            match (&event.kind, &pre_image) {
                (EventKind::Update, Some(previous)) => {
                    for user in &resolved.users {
                        let previously_matched = self
                            .evaluator
                            .matches(user, previous, &filters)
                            .await?;
                        let currently_matched = self
                            .evaluator
                            .matches(user, &event.payload, &filters)
                            .await?;
                        let classified =
                            classify_transition(previously_matched, currently_matched, event.kind);
                        if let Some(kind) = classified {
                            if spec.event_types.contains(&kind) {
                                targets.push(target_for(user, &resolved.trigger, kind));
                            }
                        }
                    }
                }
                _ => {
                    // Create and delete carry a single image; the event kind
                    // itself must be allowed before any evaluation.
                    if spec.event_types.contains(&event.kind) {
                        for user in &resolved.users {
                            if self
                                .evaluator
                                .matches(user, &event.payload, &filters)
                                .await?
                            {
                                targets.push(target_for(user, &resolved.trigger, event.kind));
                            }
                        }
                    }
                }
            }

            if !targets.is_empty() {
                generated.push(NotificationEvent {
                    version: NOTIFICATION_EVENT_VERSION.to_string(),
                    notification_id: resolved.trigger.id.clone(),
                    targets,
                    data: event.payload.clone(),
                });
            }
        }
        Ok(generated)
    }
}

fn parse_filters(trigger: &Trigger) -> Result<Value, MatchingError> {
    serde_json::from_str(&trigger.filters).map_err(|e| MatchingError::InvalidFilters {
        trigger_id: trigger.id.clone(),
        message: e.to_string(),
    })
}

fn target_for(user: &PlatformUser, trigger: &Trigger, kind: EventKind) -> NotificationTarget {
    NotificationTarget {
        user: NotificationUser {
            user_id: user.internal_id.clone(),
            user_email: user.user_email.clone(),
            outcomes: trigger.outcomes.clone(),
        },
        kind,
    }
}

/// Applies the reverse patch to the post-image, reconstructing the object as
/// it was before the change. Assumes the patch is a total, invertible
/// description of the change.
fn reconstruct_pre_image(event: &ChangeEvent) -> Option<Value> {
    let Some(reverse_patch) = &event.reverse_patch else {
        warn!("Update event without reverse patch; treating as unmatched");
        return None;
    };
    let mut previous = event.payload.clone();
    match json_patch::patch(&mut previous, reverse_patch) {
        Ok(()) => Some(previous),
        Err(e) => {
            warn!(error = %e, "Reverse patch failed to apply; treating event as unmatched");
            None
        }
    }
}
