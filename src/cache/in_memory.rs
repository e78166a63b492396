//! InMemoryQueryCache - HashMap-backed query cache shared across the process.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use super::{CacheError, CacheEvent, CacheKey, FetchTicket, QueryCache, Snapshot, Versioned, ABSENT};

const EVENT_CAPACITY: usize = 256;

type Erased = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct CacheEntry {
    data: Option<Erased>,
    version: u64,
    updated_at: Option<Instant>,
    invalidated: bool,
    invalidations: u64,
    fetch_generation: u64,
}

/// In-memory query cache backed by a HashMap.
///
/// Values are type-erased so one cache can hold lists of different entity
/// types under different keys. Version tokens come from a single counter
/// shared by all keys and are never reused. Clone-friendly via Arc.
#[derive(Clone)]
pub struct InMemoryQueryCache {
    storage: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    versions: Arc<AtomicU64>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for InMemoryQueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueryCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            versions: Arc::new(AtomicU64::new(ABSENT)),
            events,
        }
    }

    /// Receive every subsequent [`CacheEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// How many times `key` has been invalidated.
    pub fn invalidation_count(&self, key: &CacheKey) -> Result<u64, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::LockPoisoned("cache read"))?;
        Ok(storage.get(key).map(|e| e.invalidations).unwrap_or(0))
    }

    /// Current version under `key`, [`ABSENT`] if nothing is stored.
    pub fn version(&self, key: &CacheKey) -> Result<u64, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::LockPoisoned("cache read"))?;
        Ok(storage
            .get(key)
            .filter(|e| e.data.is_some())
            .map(|e| e.version)
            .unwrap_or(ABSENT))
    }

    /// Drop the entry under `key`. Returns true if data was stored.
    pub fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::LockPoisoned("cache write"))?;
        Ok(storage.remove(key).and_then(|e| e.data).is_some())
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn store(&self, entry: &mut CacheEntry, data: Erased) -> u64 {
        let version = self.next_version();
        store_at(entry, data, version);
        version
    }
}

fn store_at(entry: &mut CacheEntry, data: Erased, version: u64) {
    entry.data = Some(data);
    entry.version = version;
    entry.updated_at = Some(Instant::now());
    entry.invalidated = false;
}

fn current_version(entry: &CacheEntry) -> u64 {
    if entry.data.is_some() {
        entry.version
    } else {
        ABSENT
    }
}

fn downcast<T: Send + Sync + 'static>(
    key: &CacheKey,
    entry: &CacheEntry,
) -> Result<Option<Snapshot<T>>, CacheError> {
    let Some(data) = &entry.data else {
        return Ok(None);
    };
    let list = data
        .clone()
        .downcast::<Vec<T>>()
        .map_err(|_| CacheError::TypeMismatch {
            key: key.to_string(),
        })?;
    Ok(Some(Versioned {
        data: list,
        version: entry.version,
    }))
}

impl<T: Send + Sync + 'static> QueryCache<T> for InMemoryQueryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot<T>>, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::LockPoisoned("cache read"))?;
        match storage.get(key) {
            Some(entry) => downcast(key, entry),
            None => Ok(None),
        }
    }

    fn set(&self, key: &CacheKey, data: Arc<Vec<T>>) -> Result<u64, CacheError> {
        let version = {
            let mut storage = self
                .storage
                .write()
                .map_err(|_| CacheError::LockPoisoned("cache write"))?;
            let entry = storage.entry(key.clone()).or_default();
            self.store(entry, data)
        };
        self.emit(CacheEvent::Updated {
            key: key.clone(),
            version,
        });
        Ok(version)
    }

    fn replace_if_current(
        &self,
        key: &CacheKey,
        expected: u64,
        data: Arc<Vec<T>>,
    ) -> Result<u64, CacheError> {
        let version = {
            let mut storage = self
                .storage
                .write()
                .map_err(|_| CacheError::LockPoisoned("cache write"))?;
            let entry = storage.entry(key.clone()).or_default();
            let actual = current_version(entry);
            if actual != expected {
                return Err(CacheError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    actual,
                });
            }
            self.store(entry, data)
        };
        self.emit(CacheEvent::Updated {
            key: key.clone(),
            version,
        });
        Ok(version)
    }

    fn restore(
        &self,
        key: &CacheKey,
        current: u64,
        data: Arc<Vec<T>>,
        version: u64,
    ) -> Result<(), CacheError> {
        {
            let mut storage = self
                .storage
                .write()
                .map_err(|_| CacheError::LockPoisoned("cache write"))?;
            let entry = storage.entry(key.clone()).or_default();
            let actual = current_version(entry);
            if actual != current {
                return Err(CacheError::VersionConflict {
                    key: key.to_string(),
                    expected: current,
                    actual,
                });
            }
            store_at(entry, data, version);
        }
        self.emit(CacheEvent::Updated {
            key: key.clone(),
            version,
        });
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        {
            let mut storage = self
                .storage
                .write()
                .map_err(|_| CacheError::LockPoisoned("cache write"))?;
            let entry = storage.entry(key.clone()).or_default();
            entry.invalidated = true;
            entry.invalidations += 1;
        }
        self.emit(CacheEvent::Invalidated { key: key.clone() });
        Ok(())
    }

    fn cancel_in_flight(&self, key: &CacheKey) -> Result<(), CacheError> {
        {
            let mut storage = self
                .storage
                .write()
                .map_err(|_| CacheError::LockPoisoned("cache write"))?;
            let entry = storage.entry(key.clone()).or_default();
            entry.fetch_generation += 1;
        }
        self.emit(CacheEvent::Cancelled { key: key.clone() });
        Ok(())
    }

    fn begin_fetch(&self, key: &CacheKey) -> Result<FetchTicket, CacheError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| CacheError::LockPoisoned("cache write"))?;
        let entry = storage.entry(key.clone()).or_default();
        Ok(FetchTicket {
            generation: entry.fetch_generation,
        })
    }

    fn complete_fetch(
        &self,
        key: &CacheKey,
        ticket: FetchTicket,
        data: Arc<Vec<T>>,
    ) -> Result<Option<u64>, CacheError> {
        let version = {
            let mut storage = self
                .storage
                .write()
                .map_err(|_| CacheError::LockPoisoned("cache write"))?;
            let entry = storage.entry(key.clone()).or_default();
            if entry.fetch_generation != ticket.generation {
                return Ok(None);
            }
            self.store(entry, data)
        };
        self.emit(CacheEvent::Updated {
            key: key.clone(),
            version,
        });
        Ok(Some(version))
    }

    fn is_stale(&self, key: &CacheKey, stale_time: Duration) -> Result<bool, CacheError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| CacheError::LockPoisoned("cache read"))?;
        let Some(entry) = storage.get(key) else {
            return Ok(true);
        };
        if entry.data.is_none() || entry.invalidated {
            return Ok(true);
        }
        Ok(entry
            .updated_at
            .map(|at| at.elapsed() >= stale_time)
            .unwrap_or(true))
    }
}
