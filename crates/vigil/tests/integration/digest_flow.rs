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

//! End-to-end digest flow: live events buffered in the log are aggregated by
//! the scheduler into one digest per recipient and published as a single
//! grouped in-app notification.

use chrono::{Duration as ChronoDuration, Utc};
use serial_test::serial;
use std::sync::Arc;

use vigil::manager::{PublisherManager, PublisherManagerConfig};
use vigil::model::{
    DigestPeriod, DigestSpec, EventKind, NotificationEvent, NotificationLogEvent,
    NotificationTarget, NotificationUser, Trigger, TriggerKind, NOTIFICATION_EVENT_VERSION,
};
use vigil::scheduler::{floor_to_minute, DigestScheduler};
use vigil::services::NotificationLog;
use vigil::ResolvedTrigger;

use crate::fixtures::{self, MemoryLocks, MemoryLog, MemoryNotificationStore, NullHttp, NullMail};

fn daily_digest(due_time: &str) -> Trigger {
    Trigger {
        id: "d1".to_string(),
        name: "Daily digest".to_string(),
        filters: "{}".to_string(),
        user_ids: vec!["u1".to_string()],
        group_ids: vec![],
        outcomes: vec!["o-ui".to_string()],
        kind: TriggerKind::Digest(DigestSpec {
            period: DigestPeriod::Day,
            trigger_time: due_time.to_string(),
            trigger_ids: vec!["t1".to_string()],
        }),
    }
}

fn live_log_event(object_id: &str, name: &str, kind: EventKind) -> NotificationLogEvent {
    NotificationLogEvent::Live(NotificationEvent {
        version: NOTIFICATION_EVENT_VERSION.to_string(),
        notification_id: "t1".to_string(),
        targets: vec![NotificationTarget {
            user: NotificationUser {
                user_id: "u1".to_string(),
                user_email: "u1@example.com".to_string(),
                outcomes: vec!["o-ui".to_string()],
            },
            kind,
        }],
        data: serde_json::json!({"id": object_id, "name": name}),
    })
}

#[tokio::test]
#[serial]
async fn buffered_live_events_become_one_grouped_digest() -> anyhow::Result<()> {
    fixtures::init_tracing();

    let log = Arc::new(MemoryLog::default());
    log.append(live_log_event("obj-1", "first report", EventKind::Create))
        .await?;
    log.append(live_log_event("obj-2", "second report", EventKind::Update))
        .await?;

    // One minute past the appends, so both fall inside the 1-day window.
    let due = floor_to_minute(Utc::now()) + ChronoDuration::minutes(1);
    let due_time = format!("{}Z", due.format("%H:%M:%S%.3f"));

    let digest_trigger = daily_digest(&due_time);
    let resolved = ResolvedTrigger {
        trigger: digest_trigger.clone(),
        users: vec![fixtures::user("u1")],
    };

    let scheduler = DigestScheduler::new(log.clone());
    let digests = scheduler.collect_due(&[resolved], due).await?;

    assert_eq!(digests.len(), 1);
    let digest = &digests[0];
    assert_eq!(digest.notification_id, "d1");
    assert_eq!(digest.target.user_id, "u1");
    assert_eq!(digest.data.len(), 2);
    assert_eq!(digest.data[0].instance["id"], "obj-1");
    assert_eq!(digest.data[0].kind, EventKind::Create);
    assert_eq!(digest.data[1].instance["id"], "obj-2");
    assert_eq!(digest.data[1].kind, EventKind::Update);

    // Publish the digest and check the grouped in-app record.
    let cache = fixtures::cache_with(
        vec![fixtures::user("u1")],
        vec![
            fixtures::live_trigger("t1", "High score", &["u1"], &["o-ui"], vec![EventKind::Create]),
            digest_trigger,
        ],
        vec![fixtures::ui_outcome("o-ui")],
    );
    let store = Arc::new(MemoryNotificationStore::default());
    let publisher = PublisherManager::new(
        PublisherManagerConfig::default(),
        cache,
        log.clone(),
        Arc::new(MemoryLocks::default()),
        Arc::new(NullMail),
        Arc::new(NullHttp),
        store.clone(),
    );

    let report = publisher
        .process_log_event(&NotificationLogEvent::Digest(digest.clone()))
        .await?;
    assert_eq!(report.len(), 1);
    assert!(!report[0].is_failure());

    let records = store.records.lock().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].notification_type, "digest");
    assert_eq!(records[0].user_id, "u1");
    // Both items land in one section titled after the originating trigger.
    assert_eq!(records[0].content.len(), 1);
    assert_eq!(records[0].content[0].title, "High score");
    assert_eq!(records[0].content[0].events.len(), 2);
    assert_eq!(records[0].content[0].events[0].message, "first report");
    assert_eq!(records[0].content[0].events[1].message, "second report");
    Ok(())
}

#[tokio::test]
#[serial]
async fn events_outside_the_window_are_not_digested() -> anyhow::Result<()> {
    fixtures::init_tracing();

    let log = Arc::new(MemoryLog::default());
    log.append(live_log_event("obj-1", "first report", EventKind::Create))
        .await?;

    // Evaluate two days later; the buffered event is older than one period.
    let due = floor_to_minute(Utc::now()) + ChronoDuration::days(2);
    let due_time = format!("{}Z", due.format("%H:%M:%S%.3f"));
    let resolved = ResolvedTrigger {
        trigger: daily_digest(&due_time),
        users: vec![fixtures::user("u1")],
    };

    let scheduler = DigestScheduler::new(log);
    let digests = scheduler.collect_due(&[resolved], due).await?;
    assert!(digests.is_empty());
    Ok(())
}
