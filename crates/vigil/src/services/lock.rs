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

//! Cluster-wide lock service interface.
//!
//! Each singleton loop acquires a named lock with zero retries before doing
//! work. Contention is the normal case on a multi-replica deployment and is
//! reported as [`LockError::AlreadyLocked`], which callers treat as a quiet
//! skip rather than a failure.

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by the lock service.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder already owns one of the requested locks. Expected under
    /// normal multi-replica operation.
    #[error("Lock already held: {name}")]
    AlreadyLocked { name: String },

    /// The lock service itself failed.
    #[error("Lock service failure: {message}")]
    Service { message: String },
}

impl LockError {
    /// Whether the error is the expected "another replica is active" case.
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::AlreadyLocked { .. })
    }
}

/// A held cluster-wide lock. Dropping the guard without calling
/// [`LockGuard::release`] leaves reclamation to the service's own expiry.
#[async_trait]
pub trait LockGuard: Send + Sync {
    /// Releases the lock.
    async fn release(&self) -> Result<(), LockError>;
}

/// Distributed mutual exclusion service.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Attempts to acquire all named locks, retrying at most `retry_count`
    /// times on contention before giving up with
    /// [`LockError::AlreadyLocked`].
    async fn acquire(
        &self,
        names: &[String],
        retry_count: u32,
    ) -> Result<Box<dyn LockGuard>, LockError>;
}
