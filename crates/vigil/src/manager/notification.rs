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

//! Notification manager.
//!
//! Owns two background loops. The stream loop acquires the manager lock,
//! attaches to the platform mutation stream and runs every batch through the
//! live matching engine, appending the generated events to the notification
//! event log. The digest loop evaluates digest triggers once per interval on
//! a minute-floored clock, under its own lock key so digest emission stays a
//! cluster singleton independently of stream consumption.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheError, EntityCache};
use crate::manager::ManagerStatus;
use crate::matching::{MatchingEngine, MatchingError};
use crate::model::{ChangeEvent, NotificationLogEvent};
use crate::resolver::{resolve_digest_triggers, resolve_live_triggers};
use crate::scheduler::{floor_to_minute, DigestScheduler, SchedulerError};
use crate::services::{LockService, LogError, MutationStream, NotificationLog, StreamPosition};

/// Stable identifier reported in status and used as the default lock key.
pub const NOTIFICATION_MANAGER_ID: &str = "NOTIFICATION_MANAGER";

/// Errors raised by one manager tick. Always caught at the loop boundary and
/// logged; a failed tick never takes the loop down.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Matching(#[from] MatchingError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Notification manager configuration.
#[derive(Debug, Clone)]
pub struct NotificationManagerConfig {
    /// Whether the manager starts its loops at all.
    pub enabled: bool,
    /// Cluster lock key. The digest loop derives its own key by suffixing
    /// `_digest`.
    pub lock_key: String,
    /// Interval between stream lock attempts.
    pub stream_schedule: Duration,
    /// Interval between digest evaluations.
    pub digest_schedule: Duration,
}

impl Default for NotificationManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_key: "notification_manager".to_string(),
            stream_schedule: Duration::from_secs(10),
            digest_schedule: Duration::from_secs(60),
        }
    }
}

/// The notification manager service object.
pub struct NotificationManager {
    config: NotificationManagerConfig,
    cache: Arc<EntityCache>,
    stream: Arc<dyn MutationStream>,
    log: Arc<dyn NotificationLog>,
    locks: Arc<dyn LockService>,
    engine: Arc<MatchingEngine>,
    scheduler: Arc<DigestScheduler>,
    running: AtomicBool,
    stopping: AtomicBool,
    shutdown: Notify,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationManager {
    pub fn new(
        config: NotificationManagerConfig,
        cache: Arc<EntityCache>,
        stream: Arc<dyn MutationStream>,
        log: Arc<dyn NotificationLog>,
        locks: Arc<dyn LockService>,
        engine: Arc<MatchingEngine>,
        scheduler: Arc<DigestScheduler>,
    ) -> Self {
        Self {
            config,
            cache,
            stream,
            log,
            locks,
            engine,
            scheduler,
            running: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            shutdown: Notify::new(),
            handles: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Starts the stream and digest loops. A disabled manager logs and does
    /// nothing.
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            info!("Notification manager disabled by configuration");
            return;
        }
        info!(
            stream_interval = ?self.config.stream_schedule,
            digest_interval = ?self.config.digest_schedule,
            "Starting notification manager"
        );

        let manager = Arc::clone(self);
        let stream_handle = tokio::spawn(async move {
            manager.run_stream_loop().await;
        });

        let manager = Arc::clone(self);
        let digest_handle = tokio::spawn(async move {
            manager.run_digest_loop().await;
        });

        let mut handles = self.handles.lock();
        handles.push(stream_handle);
        handles.push(digest_handle);
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            id: NOTIFICATION_MANAGER_ID,
            enabled: self.config.enabled,
            running: self.running.load(Ordering::SeqCst),
            smtp_active: None,
        }
    }

    /// Signals both loops and waits for them to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down notification manager");
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Notification manager task ended abnormally");
            }
        }
        info!("Notification manager stopped");
    }

    async fn run_stream_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.stream_schedule);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while !self.stopping.load(Ordering::SeqCst) {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = ticker.tick() => self.stream_tick().await,
            }
        }
        debug!("Notification stream loop exited");
    }

    /// One stream tick: lock, attach, consume until the stream errors or the
    /// manager shuts down, then detach and release.
    async fn stream_tick(&self) {
        let guard = match self
            .locks
            .acquire(std::slice::from_ref(&self.config.lock_key), 0)
            .await
        {
            Ok(guard) => guard,
            Err(e) if e.is_contention() => {
                debug!("Notification manager already started by another replica");
                return;
            }
            Err(e) => {
                error!(error = %e, "Notification manager failed to acquire lock");
                return;
            }
        };

        let mut consumer = match self.stream.subscribe(StreamPosition::Live).await {
            Ok(consumer) => consumer,
            Err(e) => {
                error!(error = %e, "Notification manager failed to attach to mutation stream");
                self.release(guard.as_ref()).await;
                return;
            }
        };

        self.running.store(true, Ordering::SeqCst);
        info!("Notification manager attached to mutation stream");

        // Pinned once: a shutdown signal arriving while a batch is in flight
        // stays registered and is observed on the next iteration. The flag
        // covers a signal raised before the loop was entered.
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        while !self.stopping.load(Ordering::SeqCst) {
            tokio::select! {
                _ = &mut shutdown => break,
                batch = consumer.next_batch() => match batch {
                    Ok(Some(events)) => {
                        if let Err(e) = self.process_batch(&events).await {
                            // A bad batch is logged and dropped; consumption
                            // continues from the next batch.
                            error!(error = %e, "Notification batch processing failed");
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        error!(error = %e, "Mutation stream failed, detaching until next tick");
                        break;
                    }
                },
            }
        }

        consumer.shutdown().await;
        self.running.store(false, Ordering::SeqCst);
        self.release(guard.as_ref()).await;
        debug!("Notification manager detached from mutation stream");
    }

    /// Matches one stream batch and appends every generated event to the log.
    async fn process_batch(&self, events: &[ChangeEvent]) -> Result<(), ManagerError> {
        let live_triggers = resolve_live_triggers(&self.cache).await?;
        if live_triggers.is_empty() {
            return Ok(());
        }
        let generated = self.engine.match_batch(events, &live_triggers).await?;
        for event in generated {
            self.log.append(NotificationLogEvent::Live(event)).await?;
        }
        Ok(())
    }

    async fn run_digest_loop(&self) {
        // Each iteration sleeps to the next wall-clock boundary of the
        // schedule instead of free-running an interval, so a slow tick cannot
        // shift later evaluations off their minute or evaluate one twice.
        while !self.stopping.load(Ordering::SeqCst) {
            let delay = delay_to_next_boundary(Utc::now(), self.config.digest_schedule);
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = tokio::time::sleep(delay) => self.digest_tick().await,
            }
        }
        debug!("Notification digest loop exited");
    }

    /// One digest tick: lock under the digest key, evaluate due triggers on a
    /// minute-floored clock, append the generated digest events.
    async fn digest_tick(&self) {
        let digest_lock = format!("{}_digest", self.config.lock_key);
        let guard = match self.locks.acquire(std::slice::from_ref(&digest_lock), 0).await {
            Ok(guard) => guard,
            Err(e) if e.is_contention() => {
                debug!("Digest evaluation already running on another replica");
                return;
            }
            Err(e) => {
                error!(error = %e, "Digest evaluation failed to acquire lock");
                return;
            }
        };

        let now = floor_to_minute(Utc::now());
        if let Err(e) = self.evaluate_digests(now).await {
            error!(error = %e, "Digest evaluation failed");
        }
        self.release(guard.as_ref()).await;
    }

    async fn evaluate_digests(&self, now: DateTime<Utc>) -> Result<(), ManagerError> {
        let digest_triggers = resolve_digest_triggers(&self.cache).await?;
        if digest_triggers.is_empty() {
            return Ok(());
        }
        let digests = self.scheduler.collect_due(&digest_triggers, now).await?;
        let count = digests.len();
        for digest in digests {
            self.log.append(NotificationLogEvent::Digest(digest)).await?;
        }
        if count > 0 {
            debug!(count, "Appended digest notification events");
        }
        Ok(())
    }

    async fn release(&self, guard: &dyn crate::services::LockGuard) {
        if let Err(e) = guard.release().await {
            // Expiry on the lock service reclaims it eventually.
            warn!(error = %e, "Failed to release notification manager lock");
        }
    }
}

/// Duration until the next wall-clock instant aligned to `period`. The result
/// is always strictly positive, so a tick finishing within its own period
/// sleeps to the following boundary rather than firing again immediately.
fn delay_to_next_boundary(now: DateTime<Utc>, period: Duration) -> Duration {
    let period_ms = (period.as_millis() as i64).max(1);
    let since_epoch = now.timestamp_millis();
    let next = (since_epoch.div_euclid(period_ms) + 1) * period_ms;
    Duration::from_millis((next - since_epoch) as u64)
}
