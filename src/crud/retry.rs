//! Retrying - wraps any CRUD service with exponential backoff.
//!
//! Retry is a cross-cutting policy applied uniformly to every remote call.
//! The optimistic list never retries on its own; wrap the service instead:
//!
//! ```ignore
//! let remote = Retrying::new(HttpTodoClient::new(base_url), RetryPolicy::default());
//! let todos = OptimisticList::new(cache, remote, options);
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{CrudError, CrudOperations};
use crate::entity::ListEntity;

/// How often and how patiently to retry a failed remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    async fn run<R, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<R, CrudError>
    where
        R: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<R, CrudError>> + Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    let delay = self.delay(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// A [`CrudOperations`] decorator that retries retryable failures.
pub struct Retrying<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> Retrying<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: ListEntity, C: CrudOperations<T>> CrudOperations<T> for Retrying<C> {
    async fn fetch(&self) -> Result<Vec<T>, CrudError> {
        self.policy.run("fetch", || self.inner.fetch()).await
    }

    async fn create(&self, draft: T::Draft) -> Result<T, CrudError> {
        self.policy
            .run("create", || self.inner.create(draft.clone()))
            .await
    }

    async fn update(&self, id: T::Id, patch: T::Patch) -> Result<T, CrudError> {
        self.policy
            .run("update", || self.inner.update(id.clone(), patch.clone()))
            .await
    }

    async fn delete(&self, id: T::Id) -> Result<bool, CrudError> {
        self.policy
            .run("delete", || self.inner.delete(id.clone()))
            .await
    }
}
