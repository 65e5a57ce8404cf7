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

//! Publisher manager.
//!
//! Consumes the notification event log and fans each event out through the
//! outcomes bound to its recipients: in-app records, templated emails and
//! templated webhook calls. Delivery is best-effort with per-dispatch
//! isolation; every attempt is captured as a [`DispatchOutcome`] so a failed
//! email never blocks the webhook bound to the same recipient.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheError, EntityCache};
use crate::manager::ManagerStatus;
use crate::model::{
    ConnectorKind, ContentEvent, ContentSection, DigestItem, EmailConfiguration,
    NotificationEvent, NotificationLogEvent, NotificationTarget, NotificationUser, Outcome,
    PlatformSettings, Trigger, WebhookConfiguration,
};
use crate::services::{
    HttpClient, InAppNotification, LockService, LogError, Mail, MailSender, NotificationLog,
    NotificationStore, StreamPosition, WebhookRequest,
};

/// Stable identifier reported in status.
pub const PUBLISHER_MANAGER_ID: &str = "PUBLISHER_MANAGER";

/// Errors raised while processing one log event. Caught at the loop boundary.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DispatchResult {
    Delivered,
    Skipped { reason: String },
    Failed { error: String },
}

/// One recipient × outcome dispatch attempt, captured for the per-event
/// report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchOutcome {
    pub user_id: String,
    pub outcome_id: String,
    /// Absent when the outcome id no longer resolves to an entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<ConnectorKind>,
    pub result: DispatchResult,
}

impl DispatchOutcome {
    /// Whether this attempt ended in failure.
    pub fn is_failure(&self) -> bool {
        matches!(self.result, DispatchResult::Failed { .. })
    }
}

/// Publisher manager configuration.
#[derive(Debug, Clone)]
pub struct PublisherManagerConfig {
    pub enabled: bool,
    pub lock_key: String,
    /// Interval between lock attempts.
    pub stream_schedule: Duration,
}

impl Default for PublisherManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_key: "publisher_manager".to_string(),
            stream_schedule: Duration::from_secs(10),
        }
    }
}

/// The publisher manager service object.
pub struct PublisherManager {
    config: PublisherManagerConfig,
    cache: Arc<EntityCache>,
    log: Arc<dyn NotificationLog>,
    locks: Arc<dyn LockService>,
    mail: Arc<dyn MailSender>,
    http: Arc<dyn HttpClient>,
    notifications: Arc<dyn NotificationStore>,
    templates: handlebars::Handlebars<'static>,
    running: AtomicBool,
    smtp_active: AtomicBool,
    stopping: AtomicBool,
    shutdown: Notify,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl PublisherManager {
    pub fn new(
        config: PublisherManagerConfig,
        cache: Arc<EntityCache>,
        log: Arc<dyn NotificationLog>,
        locks: Arc<dyn LockService>,
        mail: Arc<dyn MailSender>,
        http: Arc<dyn HttpClient>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            config,
            cache,
            log,
            locks,
            mail,
            http,
            notifications,
            templates: handlebars::Handlebars::new(),
            running: AtomicBool::new(false),
            smtp_active: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            shutdown: Notify::new(),
            handles: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Starts the consumption loop. The mail transport is probed once here so
    /// status can report SMTP liveness.
    pub fn start(self: &Arc<Self>) {
        if !self.config.enabled {
            info!("Publisher manager disabled by configuration");
            return;
        }
        info!(interval = ?self.config.stream_schedule, "Starting publisher manager");

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let alive = manager.mail.is_alive().await;
            manager.smtp_active.store(alive, Ordering::SeqCst);
            if !alive {
                warn!("Mail transport unreachable, email outcomes will fail");
            }
            manager.run_loop().await;
        });
        self.handles.lock().push(handle);
    }

    /// Current lifecycle state, including the SMTP liveness probe result.
    pub fn status(&self) -> ManagerStatus {
        ManagerStatus {
            id: PUBLISHER_MANAGER_ID,
            enabled: self.config.enabled,
            running: self.running.load(Ordering::SeqCst),
            smtp_active: Some(self.smtp_active.load(Ordering::SeqCst)),
        }
    }

    /// Signals the loop and waits for it to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down publisher manager");
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Publisher manager task ended abnormally");
            }
        }
        info!("Publisher manager stopped");
    }

    async fn run_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.stream_schedule);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while !self.stopping.load(Ordering::SeqCst) {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        debug!("Publisher loop exited");
    }

    /// One tick: lock, attach to the notification event log, dispatch every
    /// entry until the stream errors or the manager shuts down.
    async fn tick(&self) {
        let guard = match self
            .locks
            .acquire(std::slice::from_ref(&self.config.lock_key), 0)
            .await
        {
            Ok(guard) => guard,
            Err(e) if e.is_contention() => {
                debug!("Publisher manager already started by another replica");
                return;
            }
            Err(e) => {
                error!(error = %e, "Publisher manager failed to acquire lock");
                return;
            }
        };

        let mut consumer = match self.log.subscribe(StreamPosition::Live).await {
            Ok(consumer) => consumer,
            Err(e) => {
                error!(error = %e, "Publisher manager failed to attach to event log");
                self.release(guard.as_ref()).await;
                return;
            }
        };

        self.running.store(true, Ordering::SeqCst);
        info!("Publisher manager attached to notification event log");

        // Pinned once: a shutdown signal arriving while entries are being
        // dispatched stays registered and is observed on the next iteration.
        // The flag covers a signal raised before the loop was entered.
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        while !self.stopping.load(Ordering::SeqCst) {
            tokio::select! {
                _ = &mut shutdown => break,
                batch = consumer.next_batch() => match batch {
                    Ok(Some(entries)) => {
                        for entry in entries {
                            match self.process_log_event(&entry).await {
                                Ok(report) => {
                                    for attempt in report.iter().filter(|a| a.is_failure()) {
                                        warn!(
                                            user_id = %attempt.user_id,
                                            outcome_id = %attempt.outcome_id,
                                            result = ?attempt.result,
                                            "Notification dispatch failed"
                                        );
                                    }
                                }
                                Err(e) => {
                                    error!(error = %e, "Failed to process notification event");
                                }
                            }
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        error!(error = %e, "Event log stream failed, detaching until next tick");
                        break;
                    }
                },
            }
        }

        consumer.shutdown().await;
        self.running.store(false, Ordering::SeqCst);
        self.release(guard.as_ref()).await;
        debug!("Publisher manager detached from event log");
    }

    /// Dispatches one log entry to every recipient × outcome pair, returning
    /// the per-event report. An event whose trigger no longer exists is stale
    /// and dropped.
    pub async fn process_log_event(
        &self,
        entry: &NotificationLogEvent,
    ) -> Result<Vec<DispatchOutcome>, PublisherError> {
        let trigger_map = self.cache.trigger_map().await?;
        let Some(trigger) = trigger_map.get(entry.notification_id()) else {
            debug!(
                notification_id = %entry.notification_id(),
                "Dropping event for deleted trigger"
            );
            return Ok(Vec::new());
        };
        let outcome_map = self.cache.outcome_map().await?;
        let settings = self.cache.settings().await?;

        let mut report = Vec::new();
        match entry {
            NotificationLogEvent::Live(event) => {
                for target in &event.targets {
                    let content = live_content(trigger, target, event);
                    report.extend(
                        self.dispatch_recipient(
                            trigger,
                            "live",
                            &target.user,
                            &content,
                            &event.data,
                            &outcome_map,
                            &settings,
                        )
                        .await,
                    );
                }
            }
            NotificationLogEvent::Digest(event) => {
                let content = digest_content(&trigger_map, trigger, &event.data);
                let data = serde_json::to_value(&event.data).unwrap_or_default();
                report.extend(
                    self.dispatch_recipient(
                        trigger,
                        "digest",
                        &event.target,
                        &content,
                        &data,
                        &outcome_map,
                        &settings,
                    )
                    .await,
                );
            }
        }
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_recipient(
        &self,
        trigger: &Trigger,
        notification_type: &str,
        recipient: &NotificationUser,
        content: &[ContentSection],
        data: &serde_json::Value,
        outcome_map: &HashMap<String, Outcome>,
        settings: &PlatformSettings,
    ) -> Vec<DispatchOutcome> {
        let mut attempts = Vec::new();
        for outcome_id in &recipient.outcomes {
            let Some(outcome) = outcome_map.get(outcome_id) else {
                debug!(outcome_id = %outcome_id, "Outcome no longer exists, skipping dispatch");
                attempts.push(DispatchOutcome {
                    user_id: recipient.user_id.clone(),
                    outcome_id: outcome_id.clone(),
                    connector: None,
                    result: DispatchResult::Skipped {
                        reason: "outcome no longer exists".to_string(),
                    },
                });
                continue;
            };
            let result = self
                .dispatch_one(outcome, trigger, notification_type, recipient, content, data, settings)
                .await;
            attempts.push(DispatchOutcome {
                user_id: recipient.user_id.clone(),
                outcome_id: outcome_id.clone(),
                connector: Some(outcome.connector),
                result,
            });
        }
        attempts
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_one(
        &self,
        outcome: &Outcome,
        trigger: &Trigger,
        notification_type: &str,
        recipient: &NotificationUser,
        content: &[ContentSection],
        data: &serde_json::Value,
        settings: &PlatformSettings,
    ) -> DispatchResult {
        match outcome.connector {
            ConnectorKind::Ui => {
                let now = chrono::Utc::now();
                let record = InAppNotification {
                    name: trigger.name.clone(),
                    notification_type: notification_type.to_string(),
                    user_id: recipient.user_id.clone(),
                    content: content.to_vec(),
                    created: now,
                    created_at: now,
                    updated_at: now,
                    is_read: false,
                };
                match self.notifications.add_notification(record).await {
                    Ok(()) => DispatchResult::Delivered,
                    Err(e) => DispatchResult::Failed {
                        error: e.to_string(),
                    },
                }
            }
            ConnectorKind::Email => {
                let configuration: EmailConfiguration =
                    match serde_json::from_str(&outcome.configuration) {
                        Ok(configuration) => configuration,
                        Err(e) => {
                            return DispatchResult::Failed {
                                error: format!("invalid email configuration: {e}"),
                            }
                        }
                    };
                let context =
                    template_context(trigger, notification_type, recipient, content, data, settings);
                let subject = match self.templates.render_template(&configuration.title, &context) {
                    Ok(subject) => subject,
                    Err(e) => {
                        return DispatchResult::Failed {
                            error: format!("subject template failed: {e}"),
                        }
                    }
                };
                let html = match self.templates.render_template(&configuration.template, &context) {
                    Ok(html) => html,
                    Err(e) => {
                        return DispatchResult::Failed {
                            error: format!("body template failed: {e}"),
                        }
                    }
                };
                let mail = Mail {
                    from: settings.platform_email.clone(),
                    to: recipient.user_email.clone(),
                    subject,
                    html,
                };
                match self.mail.send(mail).await {
                    Ok(()) => DispatchResult::Delivered,
                    Err(e) => DispatchResult::Failed {
                        error: e.to_string(),
                    },
                }
            }
            ConnectorKind::Webhook => {
                let configuration: WebhookConfiguration =
                    match serde_json::from_str(&outcome.configuration) {
                        Ok(configuration) => configuration,
                        Err(e) => {
                            return DispatchResult::Failed {
                                error: format!("invalid webhook configuration: {e}"),
                            }
                        }
                    };
                let context =
                    template_context(trigger, notification_type, recipient, content, data, settings);
                let rendered =
                    match self.templates.render_template(&configuration.template, &context) {
                        Ok(rendered) => rendered,
                        Err(e) => {
                            return DispatchResult::Failed {
                                error: format!("body template failed: {e}"),
                            }
                        }
                    };
                let body: serde_json::Value = match serde_json::from_str(&rendered) {
                    Ok(body) => body,
                    Err(e) => {
                        return DispatchResult::Failed {
                            error: format!("webhook template did not render valid JSON: {e}"),
                        }
                    }
                };
                let request = WebhookRequest {
                    url: configuration.url,
                    verb: configuration.verb,
                    params: configuration.params,
                    headers: configuration.headers,
                    body,
                };
                match self.http.call(request).await {
                    Ok(()) => DispatchResult::Delivered,
                    Err(e) => DispatchResult::Failed {
                        error: e.to_string(),
                    },
                }
            }
            ConnectorKind::External => DispatchResult::Skipped {
                reason: "external connectors are forwarded by the platform".to_string(),
            },
        }
    }

    async fn release(&self, guard: &dyn crate::services::LockGuard) {
        if let Err(e) = guard.release().await {
            warn!(error = %e, "Failed to release publisher manager lock");
        }
    }
}

/// Template context shared by email and webhook rendering.
fn template_context(
    trigger: &Trigger,
    notification_type: &str,
    recipient: &NotificationUser,
    content: &[ContentSection],
    data: &serde_json::Value,
    settings: &PlatformSettings,
) -> serde_json::Value {
    serde_json::json!({
        "content": content,
        "notification": {
            "name": trigger.name,
            "trigger_type": notification_type,
        },
        "settings": settings,
        "user": {
            "user_id": recipient.user_id,
            "user_email": recipient.user_email,
        },
        "data": data,
        "doc_uri": format!("{}/docs", settings.platform_url),
        "platform_uri": settings.platform_url,
        "background_color": settings.background_color(),
    })
}

/// One section carrying the single matched object of a live event.
fn live_content(
    trigger: &Trigger,
    target: &NotificationTarget,
    event: &NotificationEvent,
) -> Vec<ContentSection> {
    vec![ContentSection {
        title: trigger.name.clone(),
        events: vec![ContentEvent {
            operation: target.kind.to_string(),
            message: instance_message(&event.data),
            instance_id: instance_id(&event.data),
        }],
    }]
}

/// Digest items grouped into one section per originating trigger, preserving
/// recorded order within and across sections.
fn digest_content(
    trigger_map: &HashMap<String, Trigger>,
    digest_trigger: &Trigger,
    items: &[DigestItem],
) -> Vec<ContentSection> {
    let mut sections: Vec<ContentSection> = Vec::new();
    for item in items {
        let title = trigger_map
            .get(&item.notification_id)
            .map(|origin| origin.name.clone())
            .unwrap_or_else(|| digest_trigger.name.clone());
        let event = ContentEvent {
            operation: item.kind.to_string(),
            message: instance_message(&item.instance),
            instance_id: instance_id(&item.instance),
        };
        match sections.iter_mut().find(|section| section.title == title) {
            Some(section) => section.events.push(event),
            None => sections.push(ContentSection {
                title,
                events: vec![event],
            }),
        }
    }
    sections
}

/// Human-readable one-liner for a changed object.
fn instance_message(data: &serde_json::Value) -> String {
    data["representative"]["main"]
        .as_str()
        .or_else(|| data["name"].as_str())
        .or_else(|| data["id"].as_str())
        .unwrap_or("unknown")
        .to_string()
}

fn instance_id(data: &serde_json::Value) -> String {
    data["id"]
        .as_str()
        .or_else(|| data["internal_id"].as_str())
        .unwrap_or_default()
        .to_string()
}
