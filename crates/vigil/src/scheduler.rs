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

//! Digest scheduler.
//!
//! Decides which periodic triggers are due at a given instant and aggregates
//! the live notification events buffered over their lookback window into one
//! digest event per recipient. Alignment is explicit calendar math on a
//! UTC clock truncated to the minute, compared as formatted strings, so there
//! is no drift from floating point or locale-dependent date arithmetic.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::model::{
    DigestEvent, DigestItem, DigestSpec, NotificationLogEvent, NotificationUser,
    NOTIFICATION_EVENT_VERSION,
};
use crate::resolver::ResolvedTrigger;
use crate::services::{LogError, NotificationLog};

/// Errors raised during digest evaluation.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Truncates an instant to the minute (UTC).
pub fn floor_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

/// Whether a digest trigger is due at `now`.
///
/// `now` must already be floored to the minute. Alignment by period:
/// `hour` fires when the minute is zero; `day` compares the formatted
/// time-of-day; `week` prefixes the ISO weekday (1 = Monday .. 7 = Sunday);
/// `month` prefixes the day of month.
pub fn is_due(spec: &DigestSpec, now: DateTime<Utc>) -> bool {
    use crate::model::DigestPeriod::*;
    let time_of_day = format!("{}Z", now.format("%H:%M:%S%.3f"));
    match spec.period {
        Hour => now.minute() == 0,
        Day => spec.trigger_time == time_of_day,
        Week => {
            let aligned = format!("{}-{}", now.weekday().number_from_monday(), time_of_day);
            spec.trigger_time == aligned
        }
        Month => {
            let aligned = format!("{}-{}", now.day(), time_of_day);
            spec.trigger_time == aligned
        }
    }
}

/// Aggregates buffered live events into digest events for due triggers.
pub struct DigestScheduler {
    log: Arc<dyn NotificationLog>,
}

impl DigestScheduler {
    pub fn new(log: Arc<dyn NotificationLog>) -> Self {
        Self { log }
    }

    /// Evaluates every resolved digest trigger at `now` (floored to the
    /// minute) and returns the digest events to emit. Evaluation only reads;
    /// it is idempotent per minute.
    pub async fn collect_due(
        &self,
        digest_triggers: &[ResolvedTrigger],
        now: DateTime<Utc>,
    ) -> Result<Vec<DigestEvent>, SchedulerError> {
        let mut generated = Vec::new();
        for resolved in digest_triggers {
            let Some(spec) = resolved.trigger.digest_spec() else {
                continue;
            };
            if !is_due(spec, now) {
                continue;
            }
            let Some(from) = spec.period.window_start(now) else {
                warn!(trigger_id = %resolved.trigger.id, "Digest window start out of range");
                continue;
            };

            let range = self.log.range_read(from, now).await?;
            let window: Vec<_> = range
                .iter()
                .filter_map(|entry| match entry {
                    NotificationLogEvent::Live(event)
                        if spec.trigger_ids.contains(&event.notification_id) =>
                    {
                        Some(event)
                    }
                    _ => None,
                })
                .collect();
            if window.is_empty() {
                continue;
            }

            for user in &resolved.users {
                let items: Vec<DigestItem> = window
                    .iter()
                    .filter_map(|event| {
                        let target = event
                            .targets
                            .iter()
                            .find(|t| t.user.user_id == user.internal_id)?;
                        Some(DigestItem {
                            notification_id: event.notification_id.clone(),
                            instance: event.data.clone(),
                            kind: target.kind,
                        })
                    })
                    .collect();
                if items.is_empty() {
                    continue;
                }
                generated.push(DigestEvent {
                    version: NOTIFICATION_EVENT_VERSION.to_string(),
                    notification_id: resolved.trigger.id.clone(),
                    target: NotificationUser {
                        user_id: user.internal_id.clone(),
                        user_email: user.user_email.clone(),
                        outcomes: resolved.trigger.outcomes.clone(),
                    },
                    data: items,
                });
            }
        }
        Ok(generated)
    }
}
