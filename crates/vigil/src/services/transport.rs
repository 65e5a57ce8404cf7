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

//! Outbound transport interfaces: mail and HTTP.
//!
//! Delivery is best-effort; a transport failure is recorded in the dispatch
//! report and logged, never retried.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// An outbound email message.
#[derive(Debug, Clone)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Errors raised by the mail transport.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Mail delivery failed: {message}")]
    Delivery { message: String },
}

/// SMTP-like mail transport.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), SendError>;

    /// Liveness probe, surfaced through the publisher manager status.
    async fn is_alive(&self) -> bool;
}

/// An outbound webhook call.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub verb: String,
    pub params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Errors raised by the HTTP transport.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP call failed: {message}")]
    Call { message: String },
}

/// HTTP client used for webhook outcomes.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn call(&self, request: WebhookRequest) -> Result<(), HttpError>;
}
