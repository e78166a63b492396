mod cache;
mod crud;
mod entity;
mod error;
mod list;

pub mod todo;

pub use cache::{
    CacheError, CacheEvent, CacheKey, FetchTicket, InMemoryQueryCache, QueryCache, Snapshot,
    Versioned, ABSENT,
};
pub use crud::{CrudError, CrudOperations, RetryPolicy, Retrying};
pub use entity::{IdSeed, ListEntity, OptimisticId};
pub use error::{OptimisticError, Rollback};
pub use list::{
    AutoRefetch, FormState, ListConfig, ListOptions, OptimisticList, RefetchStats,
    DEFAULT_STALE_TIME,
};

// Re-export async_trait so CrudOperations can be implemented without a direct dependency
pub use async_trait::async_trait;
