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

//! Trigger model.
//!
//! A trigger is a persisted user subscription. The two kinds share id,
//! recipients, filter and outcome bindings; the variant carries what differs:
//! live triggers declare the event kinds they react to, digest triggers
//! declare their period, alignment time and the live triggers they aggregate.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use super::event::EventKind;
use super::Identifiable;

/// Aggregation period of a digest trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestPeriod {
    Hour,
    Day,
    Week,
    Month,
}

impl DigestPeriod {
    /// Returns the wire representation of the period.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestPeriod::Hour => "hour",
            DigestPeriod::Day => "day",
            DigestPeriod::Week => "week",
            DigestPeriod::Month => "month",
        }
    }

    /// Start of the digest window ending at `until`, i.e. `until - 1·period`.
    ///
    /// Month subtraction is calendar-aware and can only fail at the datetime
    /// range boundaries, in which case `None` is returned.
    pub fn window_start(&self, until: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DigestPeriod::Hour => until.checked_sub_signed(Duration::hours(1)),
            DigestPeriod::Day => until.checked_sub_signed(Duration::days(1)),
            DigestPeriod::Week => until.checked_sub_signed(Duration::weeks(1)),
            DigestPeriod::Month => until.checked_sub_months(Months::new(1)),
        }
    }
}

impl std::fmt::Display for DigestPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Variant-specific fields of a live trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSpec {
    /// Event kinds this trigger reacts to. A classified transition outside
    /// this list is not emitted.
    pub event_types: Vec<EventKind>,
}

/// Variant-specific fields of a digest trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSpec {
    pub period: DigestPeriod,
    /// Alignment time, compared against the formatted clock value:
    /// `"HH:MM:SS.mmmZ"` for `day`, `"<iso-weekday>-HH:MM:SS.mmmZ"` for
    /// `week` (1 = Monday .. 7 = Sunday), `"<day-of-month>-HH:MM:SS.mmmZ"`
    /// for `month`. Unused for `hour`.
    pub trigger_time: String,
    /// Ids of the live triggers whose buffered events feed this digest.
    pub trigger_ids: Vec<String>,
}

/// The two trigger kinds as a sum type over their variant-specific fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "trigger_type", rename_all = "lowercase")]
pub enum TriggerKind {
    Live(LiveSpec),
    Digest(DigestSpec),
}

/// A persisted notification subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub name: String,
    /// Serialized filter predicate tree, evaluated per user by the platform's
    /// filter evaluator.
    pub filters: String,
    /// Users explicitly subscribed.
    pub user_ids: Vec<String>,
    /// Groups whose members are subscribed.
    pub group_ids: Vec<String>,
    /// Outcome ids dispatched for every recipient of this trigger.
    pub outcomes: Vec<String>,
    #[serde(flatten)]
    pub kind: TriggerKind,
}

impl Trigger {
    /// Returns the live variant fields, or `None` for a digest trigger.
    pub fn live_spec(&self) -> Option<&LiveSpec> {
        match &self.kind {
            TriggerKind::Live(spec) => Some(spec),
            TriggerKind::Digest(_) => None,
        }
    }

    /// Returns the digest variant fields, or `None` for a live trigger.
    pub fn digest_spec(&self) -> Option<&DigestSpec> {
        match &self.kind {
            TriggerKind::Live(_) => None,
            TriggerKind::Digest(spec) => Some(spec),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.kind, TriggerKind::Live(_))
    }

    pub fn is_digest(&self) -> bool {
        matches!(self.kind, TriggerKind::Digest(_))
    }

    /// Wire name of the trigger kind.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TriggerKind::Live(_) => "live",
            TriggerKind::Digest(_) => "digest",
        }
    }
}

impl Identifiable for Trigger {
    fn internal_id(&self) -> &str {
        &self.id
    }
}
