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

//! Shared in-memory fakes and builders for the integration suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use vigil::cache::{CacheError, CachedValue, EntityCache, EntityKind, EntityLoader};
use vigil::model::{ChangeEvent, NotificationLogEvent, Outcome, PlatformSettings, PlatformUser, Trigger};
use vigil::services::{
    FilterError, FilterEvaluator, HttpClient, HttpError, InAppNotification, LockError, LockGuard,
    LockService, LogError, Mail, MailSender, MutationStream, NotificationLog,
    NotificationLogConsumer, NotificationStore, SendError, StoreError, StreamConsumer,
    StreamError, StreamPosition, WebhookRequest,
};

/// Idle timeout used by fake consumers before reporting an empty batch.
const IDLE_TIMEOUT: Duration = Duration::from_millis(25);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls a condition until it holds or the suite-level deadline expires.
pub async fn wait_until(description: &str, condition: impl Fn() -> bool) -> anyhow::Result<()> {
    for _ in 0..200 {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("timed out waiting for: {description}")
}

// ---------------------------------------------------------------------------
// Cache builders
// ---------------------------------------------------------------------------

struct StaticLoader(CachedValue);

#[async_trait]
impl EntityLoader for StaticLoader {
    async fn load(&self) -> Result<CachedValue, CacheError> {
        Ok(self.0.clone())
    }
}

pub fn cache_with(
    users: Vec<PlatformUser>,
    triggers: Vec<Trigger>,
    outcomes: Vec<Outcome>,
) -> Arc<EntityCache> {
    let cache = EntityCache::new();
    cache.register(
        EntityKind::User,
        Arc::new(StaticLoader(CachedValue::Users(Arc::new(users)))),
    );
    cache.register(
        EntityKind::Trigger,
        Arc::new(StaticLoader(CachedValue::Triggers(Arc::new(triggers)))),
    );
    cache.register(
        EntityKind::Outcome,
        Arc::new(StaticLoader(CachedValue::Outcomes(Arc::new(outcomes)))),
    );
    cache.register(
        EntityKind::Settings,
        Arc::new(StaticLoader(CachedValue::Settings(Arc::new(settings())))),
    );
    Arc::new(cache)
}

pub fn settings() -> PlatformSettings {
    PlatformSettings {
        platform_email: "no-reply@vigil.local".to_string(),
        platform_url: "https://vigil.local".to_string(),
        platform_theme_dark_background: None,
    }
}

pub fn user(id: &str) -> PlatformUser {
    PlatformUser {
        internal_id: id.to_string(),
        standard_id: None,
        external_ids: vec![],
        user_email: format!("{id}@example.com"),
        group_ids: vec![],
    }
}

/// Live trigger matching payloads with `score >= 50`, delivered to `user_ids`
/// through `outcomes`.
pub fn live_trigger(
    id: &str,
    name: &str,
    user_ids: &[&str],
    outcomes: &[&str],
    event_types: Vec<vigil::model::EventKind>,
) -> Trigger {
    Trigger {
        id: id.to_string(),
        name: name.to_string(),
        filters: r#"{"min": 50}"#.to_string(),
        user_ids: user_ids.iter().map(|u| u.to_string()).collect(),
        group_ids: vec![],
        outcomes: outcomes.iter().map(|o| o.to_string()).collect(),
        kind: vigil::model::TriggerKind::Live(vigil::model::LiveSpec { event_types }),
    }
}

pub fn ui_outcome(id: &str) -> Outcome {
    let now = Utc::now();
    Outcome {
        id: id.to_string(),
        name: format!("outcome {id}"),
        description: None,
        built_in: false,
        connector: vigil::model::ConnectorKind::Ui,
        configuration: "{}".to_string(),
        restricted_user_ids: vec![],
        created: now,
        updated: now,
    }
}

// ---------------------------------------------------------------------------
// Filter evaluator
// ---------------------------------------------------------------------------

/// Matches when the payload's `score` is at least the filter's `min`.
pub struct ScoreEvaluator;

#[async_trait]
impl FilterEvaluator for ScoreEvaluator {
    async fn matches(
        &self,
        _user: &PlatformUser,
        payload: &Value,
        filters: &Value,
    ) -> Result<bool, FilterError> {
        let score = payload["score"].as_i64().unwrap_or(0);
        let min = filters["min"].as_i64().unwrap_or(0);
        Ok(score >= min)
    }
}

/// `ScoreEvaluator` that holds every evaluation for a fixed delay, so a test
/// can request shutdown while a batch is still being matched.
pub struct SlowEvaluator(pub Duration);

#[async_trait]
impl FilterEvaluator for SlowEvaluator {
    async fn matches(
        &self,
        user: &PlatformUser,
        payload: &Value,
        filters: &Value,
    ) -> Result<bool, FilterError> {
        tokio::time::sleep(self.0).await;
        ScoreEvaluator.matches(user, payload, filters).await
    }
}

// ---------------------------------------------------------------------------
// Lock service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

struct MemoryLockGuard {
    names: Vec<String>,
    held: Arc<Mutex<HashSet<String>>>,
}

#[async_trait]
impl LockGuard for MemoryLockGuard {
    async fn release(&self) -> Result<(), LockError> {
        let mut held = self.held.lock();
        for name in &self.names {
            held.remove(name);
        }
        Ok(())
    }
}

#[async_trait]
impl LockService for MemoryLocks {
    async fn acquire(
        &self,
        names: &[String],
        _retry_count: u32,
    ) -> Result<Box<dyn LockGuard>, LockError> {
        let mut held = self.held.lock();
        if let Some(name) = names.iter().find(|name| held.contains(*name)) {
            return Err(LockError::AlreadyLocked { name: name.clone() });
        }
        for name in names {
            held.insert(name.clone());
        }
        Ok(Box::new(MemoryLockGuard {
            names: names.to_vec(),
            held: self.held.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Mutation stream
// ---------------------------------------------------------------------------

pub struct MemoryStream {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<ChangeEvent>>>>,
}

impl MemoryStream {
    pub fn channel() -> (mpsc::UnboundedSender<Vec<ChangeEvent>>, Arc<MemoryStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Arc::new(MemoryStream {
                rx: Mutex::new(Some(rx)),
            }),
        )
    }
}

struct MemoryStreamConsumer {
    rx: mpsc::UnboundedReceiver<Vec<ChangeEvent>>,
}

#[async_trait]
impl StreamConsumer for MemoryStreamConsumer {
    async fn next_batch(&mut self) -> Result<Option<Vec<ChangeEvent>>, StreamError> {
        match tokio::time::timeout(IDLE_TIMEOUT, self.rx.recv()).await {
            Ok(Some(batch)) => Ok(Some(batch)),
            Ok(None) => Err(StreamError::Disconnected {
                message: "sender dropped".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }

    async fn shutdown(&mut self) {
        self.rx.close();
    }
}

#[async_trait]
impl MutationStream for MemoryStream {
    async fn subscribe(
        &self,
        _position: StreamPosition,
    ) -> Result<Box<dyn StreamConsumer>, StreamError> {
        let rx = self.rx.lock().take().ok_or_else(|| StreamError::Subscribe {
            message: "stream already attached".to_string(),
        })?;
        Ok(Box::new(MemoryStreamConsumer { rx }))
    }
}

// ---------------------------------------------------------------------------
// Notification event log
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<(DateTime<Utc>, NotificationLogEvent)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<NotificationLogEvent>>>,
}

impl MemoryLog {
    pub fn entries(&self) -> Vec<NotificationLogEvent> {
        self.entries
            .lock()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|entry| matches!(entry, NotificationLogEvent::Live(_)))
            .count()
    }
}

struct MemoryLogConsumer {
    rx: mpsc::UnboundedReceiver<NotificationLogEvent>,
}

#[async_trait]
impl NotificationLogConsumer for MemoryLogConsumer {
    async fn next_batch(&mut self) -> Result<Option<Vec<NotificationLogEvent>>, LogError> {
        match tokio::time::timeout(IDLE_TIMEOUT, self.rx.recv()).await {
            Ok(Some(entry)) => Ok(Some(vec![entry])),
            Ok(None) => Err(LogError::Read {
                message: "log closed".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }

    async fn shutdown(&mut self) {
        self.rx.close();
    }
}

#[async_trait]
impl NotificationLog for MemoryLog {
    async fn append(&self, event: NotificationLogEvent) -> Result<(), LogError> {
        self.entries.lock().push((Utc::now(), event.clone()));
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        Ok(())
    }

    async fn range_read(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<NotificationLogEvent>, LogError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(at, _)| *at >= from && *at <= to)
            .map(|(_, event)| event.clone())
            .collect())
    }

    async fn subscribe(
        &self,
        _position: StreamPosition,
    ) -> Result<Box<dyn NotificationLogConsumer>, LogError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(Box::new(MemoryLogConsumer { rx }))
    }
}

// ---------------------------------------------------------------------------
// Transports and stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct NullMail;

#[async_trait]
impl MailSender for NullMail {
    async fn send(&self, _mail: Mail) -> Result<(), SendError> {
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct NullHttp;

#[async_trait]
impl HttpClient for NullHttp {
    async fn call(&self, _request: WebhookRequest) -> Result<(), HttpError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    pub records: Mutex<Vec<InAppNotification>>,
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn add_notification(&self, notification: InAppNotification) -> Result<(), StoreError> {
        self.records.lock().push(notification);
        Ok(())
    }
}

/// Notification store that holds every write for a fixed delay, so a test can
/// request shutdown while a dispatch is still being persisted.
pub struct SlowNotificationStore {
    delay: Duration,
    pub records: Mutex<Vec<InAppNotification>>,
}

impl SlowNotificationStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            records: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl NotificationStore for SlowNotificationStore {
    async fn add_notification(&self, notification: InAppNotification) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.records.lock().push(notification);
        Ok(())
    }
}
