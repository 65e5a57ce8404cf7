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

//! End-to-end live flow: one matching mutation flows from the stream through
//! the notification manager, the event log and the publisher manager into a
//! single in-app notification.

use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

use vigil::manager::{
    NotificationManager, NotificationManagerConfig, PublisherManager, PublisherManagerConfig,
};
use vigil::matching::MatchingEngine;
use vigil::model::{
    ChangeEvent, EventKind, NotificationEvent, NotificationLogEvent, NotificationTarget,
    NotificationUser, NOTIFICATION_EVENT_VERSION,
};
use vigil::scheduler::DigestScheduler;
use vigil::services::{FilterEvaluator, NotificationLog};

use crate::fixtures::{
    self, MemoryLocks, MemoryLog, MemoryNotificationStore, MemoryStream, NullHttp, NullMail,
    ScoreEvaluator, SlowEvaluator, SlowNotificationStore,
};

struct Engine {
    notification: Arc<NotificationManager>,
    publisher: Arc<PublisherManager>,
    log: Arc<MemoryLog>,
    store: Arc<MemoryNotificationStore>,
    stream_tx: tokio::sync::mpsc::UnboundedSender<Vec<ChangeEvent>>,
}

fn engine() -> Engine {
    engine_with_evaluator(Arc::new(ScoreEvaluator))
}

fn engine_with_evaluator(evaluator: Arc<dyn FilterEvaluator>) -> Engine {
    let cache = fixtures::cache_with(
        vec![fixtures::user("u1")],
        vec![fixtures::live_trigger(
            "t1",
            "High score",
            &["u1"],
            &["o-ui"],
            vec![EventKind::Create],
        )],
        vec![fixtures::ui_outcome("o-ui")],
    );

    let (stream_tx, stream) = MemoryStream::channel();
    let log = Arc::new(MemoryLog::default());
    let locks = Arc::new(MemoryLocks::default());
    let store = Arc::new(MemoryNotificationStore::default());

    let notification = Arc::new(NotificationManager::new(
        NotificationManagerConfig {
            stream_schedule: Duration::from_millis(20),
            // Digests are exercised by the digest flow suite.
            digest_schedule: Duration::from_secs(3600),
            ..Default::default()
        },
        cache.clone(),
        stream,
        log.clone(),
        locks.clone(),
        Arc::new(MatchingEngine::new(evaluator)),
        Arc::new(DigestScheduler::new(log.clone())),
    ));

    let publisher = Arc::new(PublisherManager::new(
        PublisherManagerConfig {
            stream_schedule: Duration::from_millis(20),
            ..Default::default()
        },
        cache,
        log.clone(),
        locks,
        Arc::new(NullMail),
        Arc::new(NullHttp),
        store.clone(),
    ));

    Engine {
        notification,
        publisher,
        log,
        store,
        stream_tx,
    }
}

#[tokio::test]
#[serial]
async fn matching_mutation_becomes_one_in_app_notification() -> anyhow::Result<()> {
    fixtures::init_tracing();
    let engine = engine();

    engine.publisher.start();
    fixtures::wait_until("publisher attached", || engine.publisher.status().running).await?;
    engine.notification.start();
    fixtures::wait_until("notification manager attached", || {
        engine.notification.status().running
    })
    .await?;
    assert_eq!(engine.publisher.status().smtp_active, Some(true));

    engine.stream_tx.send(vec![ChangeEvent {
        kind: EventKind::Create,
        payload: serde_json::json!({"id": "obj-1", "name": "Malware report", "score": 80}),
        reverse_patch: None,
    }])?;

    fixtures::wait_until("in-app notification persisted", || {
        !engine.store.records.lock().is_empty()
    })
    .await?;

    // Exactly one event was generated for the single matching trigger.
    assert_eq!(engine.log.live_count(), 1);
    let entries = engine.log.entries();
    let NotificationLogEvent::Live(event) = &entries[0] else {
        panic!("expected a live event");
    };
    assert_eq!(event.notification_id, "t1");
    assert_eq!(event.targets.len(), 1);
    assert_eq!(event.targets[0].user.user_id, "u1");
    assert_eq!(event.targets[0].kind, EventKind::Create);

    let records = engine.store.records.lock().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "u1");
    assert_eq!(records[0].notification_type, "live");
    assert_eq!(records[0].content[0].title, "High score");
    assert_eq!(records[0].content[0].events[0].message, "Malware report");

    engine.notification.shutdown().await;
    engine.publisher.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn non_matching_mutation_generates_nothing() -> anyhow::Result<()> {
    fixtures::init_tracing();
    let engine = engine();

    engine.publisher.start();
    engine.notification.start();
    fixtures::wait_until("notification manager attached", || {
        engine.notification.status().running
    })
    .await?;

    engine.stream_tx.send(vec![ChangeEvent {
        kind: EventKind::Create,
        payload: serde_json::json!({"id": "obj-2", "name": "Low score", "score": 5}),
        reverse_patch: None,
    }])?;

    // Give the pipeline time to consume the batch.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.log.live_count(), 0);
    assert!(engine.store.records.lock().is_empty());

    engine.notification.shutdown().await;
    engine.publisher.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn managers_stop_cleanly() -> anyhow::Result<()> {
    fixtures::init_tracing();
    let engine = engine();

    engine.notification.start();
    fixtures::wait_until("notification manager attached", || {
        engine.notification.status().running
    })
    .await?;

    engine.notification.shutdown().await;
    assert!(!engine.notification.status().running);
    engine.publisher.shutdown().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn shutdown_requested_during_a_batch_still_completes() -> anyhow::Result<()> {
    fixtures::init_tracing();
    let engine = engine_with_evaluator(Arc::new(SlowEvaluator(Duration::from_millis(500))));

    engine.notification.start();
    fixtures::wait_until("notification manager attached", || {
        engine.notification.status().running
    })
    .await?;

    engine.stream_tx.send(vec![ChangeEvent {
        kind: EventKind::Create,
        payload: serde_json::json!({"id": "obj-1", "name": "Malware report", "score": 80}),
        reverse_patch: None,
    }])?;
    // Let the batch reach the evaluator before signalling.
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_secs(3), engine.notification.shutdown())
        .await
        .map_err(|_| anyhow::anyhow!("notification manager did not stop"))?;
    assert!(!engine.notification.status().running);
    Ok(())
}

#[tokio::test]
#[serial]
async fn publisher_shutdown_requested_during_a_dispatch_still_completes() -> anyhow::Result<()> {
    fixtures::init_tracing();
    let cache = fixtures::cache_with(
        vec![fixtures::user("u1")],
        vec![fixtures::live_trigger(
            "t1",
            "High score",
            &["u1"],
            &["o-ui"],
            vec![EventKind::Create],
        )],
        vec![fixtures::ui_outcome("o-ui")],
    );
    let log = Arc::new(MemoryLog::default());
    let store = Arc::new(SlowNotificationStore::new(Duration::from_millis(500)));
    let publisher = Arc::new(PublisherManager::new(
        PublisherManagerConfig {
            stream_schedule: Duration::from_millis(20),
            ..Default::default()
        },
        cache,
        log.clone(),
        Arc::new(MemoryLocks::default()),
        Arc::new(NullMail),
        Arc::new(NullHttp),
        store.clone(),
    ));

    publisher.start();
    fixtures::wait_until("publisher attached", || publisher.status().running).await?;

    log.append(NotificationLogEvent::Live(NotificationEvent {
        version: NOTIFICATION_EVENT_VERSION.to_string(),
        notification_id: "t1".to_string(),
        targets: vec![NotificationTarget {
            user: NotificationUser {
                user_id: "u1".to_string(),
                user_email: "u1@example.com".to_string(),
                outcomes: vec!["o-ui".to_string()],
            },
            kind: EventKind::Create,
        }],
        data: serde_json::json!({"id": "obj-1", "name": "Malware report"}),
    }))
    .await?;
    // Let the dispatch reach the store before signalling.
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio::time::timeout(Duration::from_secs(3), publisher.shutdown())
        .await
        .map_err(|_| anyhow::anyhow!("publisher manager did not stop"))?;
    assert!(!publisher.status().running);
    Ok(())
}
