//! Background refetching for optimistic lists.
//!
//! Mutations only *invalidate* their key when they settle. This task is what
//! turns an invalidation (or plain staleness) into a refetch.

use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::controller::OptimisticList;
use crate::cache::{CacheEvent, QueryCache};
use crate::crud::CrudOperations;
use crate::entity::ListEntity;

/// Statistics from the auto-refetch task.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefetchStats {
    pub refetches: usize,
    pub failures: usize,
    pub polls: usize,
}

/// A background task that keeps one list in sync with its remote.
///
/// ## Example
///
/// ```ignore
/// let cache = InMemoryQueryCache::new();
/// let todos = OptimisticList::new(cache.clone(), remote, options);
///
/// let refetch = AutoRefetch::spawn(todos.clone(), cache.subscribe(), Duration::from_secs(1));
///
/// // ... mutate ...
///
/// let stats = refetch.stop().await;
/// println!("Refetched {} times", stats.refetches);
/// ```
pub struct AutoRefetch {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<RefetchStats>>,
}

impl AutoRefetch {
    /// Spawn the task on the current tokio runtime.
    ///
    /// The list is refetched whenever `events` reports its key invalidated,
    /// and whenever a poll every `poll_interval` finds it stale. The first
    /// poll happens immediately, which loads an empty cache.
    pub fn spawn<T, Q, C>(
        list: OptimisticList<T, Q, C>,
        mut events: broadcast::Receiver<CacheEvent>,
        poll_interval: Duration,
    ) -> Self
    where
        T: ListEntity,
        Q: QueryCache<T> + 'static,
        C: CrudOperations<T> + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut stats = RefetchStats::default();
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut events_open = true;

            loop {
                let refetch = tokio::select! {
                    _ = &mut stop_rx => break,
                    event = events.recv(), if events_open => match event {
                        Ok(CacheEvent::Invalidated { key }) => &key == list.key(),
                        Ok(_) => false,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(key = %list.key(), skipped, "cache events lagged, refetching");
                            true
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events_open = false;
                            false
                        }
                    },
                    _ = ticker.tick() => {
                        stats.polls += 1;
                        list.is_stale().unwrap_or(true)
                    }
                };

                if !refetch {
                    continue;
                }

                match list.refresh().await {
                    Ok(_) => stats.refetches += 1,
                    Err(err) => {
                        warn!(key = %list.key(), error = %err, "background refetch failed");
                        stats.failures += 1;
                    }
                }
            }

            stats
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signal the task to stop and wait for it to finish.
    /// Returns the task statistics.
    pub async fn stop(mut self) -> RefetchStats {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => RefetchStats::default(),
        }
    }
}

impl Drop for AutoRefetch {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        // Don't await on drop - the task finishes on its own
    }
}
