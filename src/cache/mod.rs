//! Query cache - keyed, versioned list snapshots shared by readers and mutators.
//!
//! The cache is the single source of truth for what the UI shows. Every write
//! is stamped with a version token; a mutation remembers the token it wrote
//! and later asks "is my write still the current one?" by comparing tokens
//! instead of comparing list contents.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use optimistic_list::{CacheKey, InMemoryQueryCache, QueryCache};
//!
//! let cache = InMemoryQueryCache::new();
//! let key = CacheKey::from(["todos"]);
//! let version = cache.set(&key, Arc::new(vec![todo]))?;
//! let snapshot = QueryCache::<Todo>::get(&cache, &key)?.unwrap();
//! assert_eq!(snapshot.version, version);
//! ```

mod in_memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use in_memory::InMemoryQueryCache;

/// Ordered string segments identifying one cached list, e.g. `["todos"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new(segments: Vec<String>) -> Self {
        CacheKey(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<Vec<String>> for CacheKey {
    fn from(segments: Vec<String>) -> Self {
        CacheKey(segments)
    }
}

impl From<&[&str]> for CacheKey {
    fn from(segments: &[&str]) -> Self {
        CacheKey(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CacheKey {
    fn from(segments: [&str; N]) -> Self {
        CacheKey(segments.iter().map(|s| s.to_string()).collect())
    }
}

/// A value together with the version token it was written under.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

/// A cached list and its version token.
pub type Snapshot<T> = Versioned<Arc<Vec<T>>>;

/// Version token meaning "nothing stored under this key".
pub const ABSENT: u64 = 0;

/// Proof that a refetch was started at a given fetch generation.
///
/// Cancelling in-flight fetches bumps the generation, so a ticket taken
/// before the cancel can no longer complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub(crate) generation: u64,
}

/// Notification emitted by a cache after a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated { key: CacheKey, version: u64 },
    Invalidated { key: CacheKey },
    Cancelled { key: CacheKey },
}

impl CacheEvent {
    pub fn key(&self) -> &CacheKey {
        match self {
            CacheEvent::Updated { key, .. }
            | CacheEvent::Invalidated { key }
            | CacheEvent::Cancelled { key } => key,
        }
    }
}

/// Error type for cache store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The store's lock was poisoned by a panicking writer.
    LockPoisoned(&'static str),
    /// A conditional write found a different version than expected.
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },
    /// The key holds a snapshot of a different entity type.
    TypeMismatch { key: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::LockPoisoned(operation) => {
                write!(f, "cache lock poisoned during {}", operation)
            }
            CacheError::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "cache entry {} changed (expected version {}, actual {})",
                key, expected, actual
            ),
            CacheError::TypeMismatch { key } => {
                write!(f, "cache entry {} holds a different type", key)
            }
        }
    }
}

impl std::error::Error for CacheError {}

/// Keyed snapshot store shared by every list controller in the process.
///
/// All methods are individually atomic. Nothing is held across calls, so
/// consistency across an await point relies on version tokens.
pub trait QueryCache<T>: Send + Sync {
    /// Current snapshot under `key`, if any.
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot<T>>, CacheError>;

    /// Unconditionally store `data` under `key`. Returns the new version.
    fn set(&self, key: &CacheKey, data: Arc<Vec<T>>) -> Result<u64, CacheError>;

    /// Store `data` only if the current version is `expected` ([`ABSENT`]
    /// for an empty slot). Returns the new version, or
    /// [`CacheError::VersionConflict`].
    fn replace_if_current(
        &self,
        key: &CacheKey,
        expected: u64,
        data: Arc<Vec<T>>,
    ) -> Result<u64, CacheError>;

    /// Put `data` back under the `version` it was read at, if the current
    /// version is `current`. Fails with [`CacheError::VersionConflict`]
    /// otherwise.
    ///
    /// `data` must be the snapshot that was stored under `version`, so a
    /// token keeps naming the same contents. Writers that computed their
    /// list from that snapshot then still see it as current.
    fn restore(
        &self,
        key: &CacheKey,
        current: u64,
        data: Arc<Vec<T>>,
        version: u64,
    ) -> Result<(), CacheError>;

    /// Mark the entry stale so it is refetched in the background.
    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Suppress any refetch of `key` that is currently in flight.
    fn cancel_in_flight(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Register a refetch of `key`.
    fn begin_fetch(&self, key: &CacheKey) -> Result<FetchTicket, CacheError>;

    /// Store fetched data, unless the fetch was cancelled after `ticket` was
    /// taken. Returns the new version, or `None` if the result was dropped.
    fn complete_fetch(
        &self,
        key: &CacheKey,
        ticket: FetchTicket,
        data: Arc<Vec<T>>,
    ) -> Result<Option<u64>, CacheError>;

    /// True if `key` is absent, invalidated, or older than `stale_time`.
    fn is_stale(&self, key: &CacheKey, stale_time: Duration) -> Result<bool, CacheError>;
}

impl<T, C: QueryCache<T> + ?Sized> QueryCache<T> for Arc<C> {
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot<T>>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &CacheKey, data: Arc<Vec<T>>) -> Result<u64, CacheError> {
        (**self).set(key, data)
    }

    fn replace_if_current(
        &self,
        key: &CacheKey,
        expected: u64,
        data: Arc<Vec<T>>,
    ) -> Result<u64, CacheError> {
        (**self).replace_if_current(key, expected, data)
    }

    fn restore(
        &self,
        key: &CacheKey,
        current: u64,
        data: Arc<Vec<T>>,
        version: u64,
    ) -> Result<(), CacheError> {
        (**self).restore(key, current, data, version)
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        (**self).invalidate(key)
    }

    fn cancel_in_flight(&self, key: &CacheKey) -> Result<(), CacheError> {
        (**self).cancel_in_flight(key)
    }

    fn begin_fetch(&self, key: &CacheKey) -> Result<FetchTicket, CacheError> {
        (**self).begin_fetch(key)
    }

    fn complete_fetch(
        &self,
        key: &CacheKey,
        ticket: FetchTicket,
        data: Arc<Vec<T>>,
    ) -> Result<Option<u64>, CacheError> {
        (**self).complete_fetch(key, ticket, data)
    }

    fn is_stale(&self, key: &CacheKey, stale_time: Duration) -> Result<bool, CacheError> {
        (**self).is_stale(key, stale_time)
    }
}
