//! Remote CRUD contract consumed by optimistic lists.

mod retry;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::ListEntity;

pub use retry::{RetryPolicy, Retrying};

/// Error returned by a remote CRUD service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrudError {
    /// The request never produced a response (connection refused, reset...).
    Transport(String),
    /// The service answered with a non-success status.
    Status { code: u16, message: String },
    /// The target entity does not exist remotely.
    NotFound(String),
    /// The response could not be decoded.
    Decode(String),
    Other(String),
}

impl CrudError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrudError::Transport(_) => true,
            CrudError::Status { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrudError::Transport(msg) => write!(f, "transport error: {}", msg),
            CrudError::Status { code, message } => {
                write!(f, "remote returned status {}: {}", code, message)
            }
            CrudError::NotFound(id) => write!(f, "remote entity not found: {}", id),
            CrudError::Decode(msg) => write!(f, "could not decode response: {}", msg),
            CrudError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CrudError {}

/// Async fetch/create/update/delete over one entity type.
///
/// The service assigns real ids on create. Those ids must be non-negative
/// (see [`crate::OptimisticId`]).
#[async_trait]
pub trait CrudOperations<T: ListEntity>: Send + Sync {
    async fn fetch(&self) -> Result<Vec<T>, CrudError>;

    async fn create(&self, draft: T::Draft) -> Result<T, CrudError>;

    async fn update(&self, id: T::Id, patch: T::Patch) -> Result<T, CrudError>;

    async fn delete(&self, id: T::Id) -> Result<bool, CrudError>;
}

#[async_trait]
impl<T: ListEntity, C: CrudOperations<T> + ?Sized> CrudOperations<T> for Arc<C> {
    async fn fetch(&self) -> Result<Vec<T>, CrudError> {
        (**self).fetch().await
    }

    async fn create(&self, draft: T::Draft) -> Result<T, CrudError> {
        (**self).create(draft).await
    }

    async fn update(&self, id: T::Id, patch: T::Patch) -> Result<T, CrudError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: T::Id) -> Result<bool, CrudError> {
        (**self).delete(id).await
    }
}
