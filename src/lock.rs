// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Named lease lock.
//!
//! Acquired with `SET key token NX PX lease`, polled every tenth of the lease
//! until the wait budget runs out, released by deleting the key only while it
//! still holds our token. Expiry bounds how long a crashed holder blocks
//! others.
//!
//! The grid and compilers never take this lock; it is offered to callers that
//! want to serialize their own multi-step grid edits.
//!
//! ```rust,no_run
//! # use docgrid::lock::LeaseLock;
//! # use docgrid::storage::Backend;
//! # use std::time::Duration;
//! # async fn example(backend: Backend) -> docgrid::DocResult<()> {
//! let lock = LeaseLock::acquire(&backend, "docgrid:", "people", Duration::from_secs(30), Duration::from_secs(10)).await?;
//! // ... reorder rows ...
//! lock.release().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DocError, DocResult};
use crate::metrics;
use crate::storage::{Backend, Command, Reply};

const MIN_POLL: Duration = Duration::from_millis(1);

/// A held lease. Dropping it without [`release`](Self::release) leaves the
/// key to expire on its own.
#[derive(Debug)]
pub struct LeaseLock {
    backend: Backend,
    key: String,
    token: String,
    lease: Duration,
}

impl LeaseLock {
    #[must_use]
    pub fn lock_key(prefix: &str, name: &str) -> String {
        format!("{}lock:{}", prefix, name)
    }

    /// One SET NX PX attempt.
    pub async fn try_acquire(backend: &Backend, prefix: &str, name: &str, lease: Duration) -> DocResult<Option<Self>> {
        let key = Self::lock_key(prefix, name);
        let token = Uuid::new_v4().to_string();
        let reply = backend
            .run(Command::SetNxPx {
                key: key.clone(),
                value: token.clone(),
                ttl_ms: u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1),
            })
            .await?;
        if reply == Reply::Nil {
            return Ok(None);
        }
        Ok(Some(Self {
            backend: backend.clone(),
            key,
            token,
            lease,
        }))
    }

    /// Poll until the lock is ours or `wait` has elapsed.
    pub async fn acquire(backend: &Backend, prefix: &str, name: &str, lease: Duration, wait: Duration) -> DocResult<Self> {
        let poll = (lease / 10).max(MIN_POLL);
        let deadline = Instant::now() + wait;
        loop {
            if let Some(lock) = Self::try_acquire(backend, prefix, name, lease).await? {
                metrics::record_lock("acquired");
                debug!(key = %lock.key, lease_ms = lease.as_millis() as u64, "Lease lock acquired");
                return Ok(lock);
            }
            if Instant::now() + poll > deadline {
                metrics::record_lock("timeout");
                return Err(DocError::Lock(format!(
                    "{} still held after {}ms",
                    Self::lock_key(prefix, name),
                    wait.as_millis()
                )));
            }
            sleep(poll).await;
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Release the lease. `false` means it had expired and possibly been
    /// taken by someone else, whose lock is left untouched.
    pub async fn release(self) -> DocResult<bool> {
        let reply = self
            .backend
            .run(Command::CompareAndDelete {
                key: self.key.clone(),
                token: self.token.clone(),
            })
            .await?;
        let released = reply.as_int() > 0;
        if released {
            metrics::record_lock("released");
            debug!(key = %self.key, "Lease lock released");
        } else {
            metrics::record_lock("lost");
            warn!(key = %self.key, "Lease expired before release");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryExecutor;
    use std::sync::Arc;

    fn backend() -> Backend {
        Backend::new(Arc::new(InMemoryExecutor::new()))
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let backend = backend();
        let lock = LeaseLock::acquire(&backend, "t:", "grid", Duration::from_secs(5), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(lock.key(), "t:lock:grid");
        assert!(LeaseLock::try_acquire(&backend, "t:", "grid", Duration::from_secs(5))
            .await
            .unwrap()
            .is_none());
        assert!(lock.release().await.unwrap());
        assert!(LeaseLock::try_acquire(&backend, "t:", "grid", Duration::from_secs(5))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_timeout_while_held() {
        let backend = backend();
        let _held = LeaseLock::try_acquire(&backend, "t:", "g", Duration::from_secs(5)).await.unwrap().unwrap();
        let err = LeaseLock::acquire(&backend, "t:", "g", Duration::from_millis(100), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::Lock(_)));
    }

    #[tokio::test]
    async fn test_acquire_after_expiry() {
        let backend = backend();
        let _stale = LeaseLock::try_acquire(&backend, "t:", "g", Duration::from_millis(20)).await.unwrap().unwrap();
        let lock = LeaseLock::acquire(&backend, "t:", "g", Duration::from_millis(20), Duration::from_millis(500))
            .await
            .unwrap();
        assert!(lock.release().await.unwrap());
    }

    #[tokio::test]
    async fn test_release_after_takeover_is_lost() {
        let backend = backend();
        let stale = LeaseLock::try_acquire(&backend, "t:", "g", Duration::from_millis(10)).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let fresh = LeaseLock::try_acquire(&backend, "t:", "g", Duration::from_secs(5)).await.unwrap().unwrap();
        assert!(!stale.release().await.unwrap());
        assert!(fresh.release().await.unwrap());
    }
}
