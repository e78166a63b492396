//! Entity contract for records held in an optimistic list.

use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A record that can live in an optimistic list.
///
/// Besides its own shape, an entity names the payload used to create it
/// (`Draft`, the entity without its id) and the partial payload used to
/// update it (`Patch`).
pub trait ListEntity: Clone + Debug + Send + Sync + 'static {
    type Id: OptimisticId;
    type Draft: Clone + Debug + Send + Sync + 'static;
    type Patch: Clone + Debug + Send + Sync + 'static;

    /// Returns the unique identifier for this entity.
    fn id(&self) -> &Self::Id;

    /// Builds an entity from a draft and an id.
    fn from_draft(id: Self::Id, draft: Self::Draft) -> Self;

    /// The draft this entity would have been created from.
    fn to_draft(&self) -> Self::Draft;

    /// Shallow merge: fields present in `patch` win, everything else is kept.
    fn merge(&self, patch: &Self::Patch) -> Self;
}

/// Identifier types that can stand in for a not-yet-confirmed entity.
///
/// Optimistic ids are negative. Servers MUST only issue non-negative ids,
/// otherwise an optimistic entity could collide with a confirmed one.
/// Unsigned id types cannot implement this trait.
pub trait OptimisticId: Clone + PartialEq + Debug + Display + Send + Sync + 'static {
    /// Build the synthetic id for the given seed (milliseconds since epoch).
    fn optimistic(seed: u64) -> Self;

    /// True if this id was produced by [`OptimisticId::optimistic`].
    fn is_optimistic(&self) -> bool;
}

impl OptimisticId for String {
    fn optimistic(seed: u64) -> Self {
        format!("-{}", seed)
    }

    fn is_optimistic(&self) -> bool {
        self.starts_with('-')
    }
}

impl OptimisticId for i64 {
    fn optimistic(seed: u64) -> Self {
        -(seed.min(i64::MAX as u64) as i64)
    }

    fn is_optimistic(&self) -> bool {
        *self < 0
    }
}

/// Monotonic millisecond seeds.
///
/// Normally the current time. If two seeds are requested within the same
/// millisecond (or the clock steps back), the previous seed plus one is
/// returned instead, so seeds never repeat.
#[derive(Debug, Default)]
pub struct IdSeed {
    last: AtomicU64,
}

impl IdSeed {
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> u64 {
        let now = now_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.last.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Seeds for optimistic ids, shared by every list in the process so two
/// lists writing to the same cache key never mint the same id.
pub(crate) static OPTIMISTIC_SEEDS: IdSeed = IdSeed::new();

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
