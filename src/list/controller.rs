//! OptimisticList - speculative create/update/delete over a cached list.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::form::FormState;
use super::options::ListOptions;
use crate::cache::{CacheError, CacheKey, QueryCache, Snapshot, ABSENT};
use crate::crud::CrudOperations;
use crate::entity::{ListEntity, OptimisticId, OPTIMISTIC_SEEDS};
use crate::error::{OptimisticError, Rollback};

/// What a mutation wrote to the cache before its remote call started.
///
/// Owned by exactly one in-flight mutation and dropped when it settles.
#[derive(Debug, Clone)]
struct MutationContext<T> {
    old_list: Arc<Vec<T>>,
    /// Version token `old_list` was read under.
    old_version: u64,
    /// Version token of the speculative list this mutation wrote.
    new_version: u64,
    /// The optimistic entity, for creates.
    new_item: Option<T>,
}

/// A cached list of `T` with optimistic mutations.
///
/// Every mutation follows the same lifecycle:
///
/// 1. **optimistic**: compute the speculative list from whatever the cache
///    holds right now, cancel competing refetches, write it.
/// 2. **remote**: issue the real request. The only suspension point.
/// 3. **success**: patch the confirmed entity in place (create, update).
/// 4. **error**: restore the pre-mutation list under its original version,
///    but only if the cache still holds this mutation's write. Otherwise a
///    newer write won the race and is left alone. Stacked mutations that
///    fail newest-first therefore unwind one after another.
/// 5. **settle**: invalidate the key exactly once so a refetch reconciles
///    with the server.
///
/// Mutations are not serialized. Clones share the same cache, remote and
/// form, so a clone can be moved into a spawned task.
pub struct OptimisticList<T: ListEntity, Q, C> {
    inner: Arc<Inner<T, Q, C>>,
}

struct Inner<T: ListEntity, Q, C> {
    cache: Q,
    remote: C,
    options: ListOptions<T::Draft>,
    form: FormState<T::Draft>,
}

impl<T: ListEntity, Q, C> Clone for OptimisticList<T, Q, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, Q, C> OptimisticList<T, Q, C>
where
    T: ListEntity,
    Q: QueryCache<T>,
    C: CrudOperations<T>,
{
    pub fn new(cache: Q, remote: C, options: ListOptions<T::Draft>) -> Self {
        let form = FormState::new(options.default_draft.clone());
        Self {
            inner: Arc::new(Inner {
                cache,
                remote,
                options,
                form,
            }),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.inner.options.cache_key
    }

    pub fn options(&self) -> &ListOptions<T::Draft> {
        &self.inner.options
    }

    /// The draft form this list resets and restores around creates.
    pub fn form(&self) -> &FormState<T::Draft> {
        &self.inner.form
    }

    pub fn cache(&self) -> &Q {
        &self.inner.cache
    }

    pub fn remote(&self) -> &C {
        &self.inner.remote
    }

    /// Whatever the cache holds right now, without fetching.
    pub fn snapshot(&self) -> Result<Option<Snapshot<T>>, OptimisticError> {
        Ok(self.inner.cache.get(self.key())?)
    }

    pub fn is_stale(&self) -> Result<bool, OptimisticError> {
        Ok(self
            .inner
            .cache
            .is_stale(self.key(), self.inner.options.stale_time)?)
    }

    // ========================================================================
    // List
    // ========================================================================

    /// The cached list if it is still fresh, otherwise a refetch.
    pub async fn list(&self) -> Result<Arc<Vec<T>>, OptimisticError> {
        if !self.is_stale()? {
            if let Some(snapshot) = self.snapshot()? {
                return Ok(snapshot.data);
            }
        }
        self.refresh().await
    }

    /// Fetch from the remote and store the result.
    ///
    /// If a mutation cancels this refetch while it is in flight, the fetched
    /// list is dropped and the cache's current (speculative) list returned.
    pub async fn refresh(&self) -> Result<Arc<Vec<T>>, OptimisticError> {
        let inner = &self.inner;
        let key = self.key();

        let ticket = inner.cache.begin_fetch(key)?;
        let items = Arc::new(inner.remote.fetch().await.map_err(|err| {
            error!(key = %key, error = %err, "list fetch failed");
            OptimisticError::Fetch(err)
        })?);

        match inner.cache.complete_fetch(key, ticket, items.clone())? {
            Some(version) => {
                debug!(key = %key, version, count = items.len(), "list fetched");
                Ok(items)
            }
            None => {
                debug!(key = %key, "refetch cancelled by a mutation, keeping cached list");
                Ok(self.snapshot()?.map(|s| s.data).unwrap_or(items))
            }
        }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Append an optimistic entity built from `draft`, then create it remotely.
    ///
    /// The draft form is reset before anything else so the next item can be
    /// composed immediately. On failure it is restored to the attempted draft.
    pub async fn create(&self, draft: T::Draft) -> Result<T, OptimisticError> {
        let inner = &self.inner;
        inner.form.reset();

        let optimistic_id = <T::Id as OptimisticId>::optimistic(OPTIMISTIC_SEEDS.next());
        let item = T::from_draft(optimistic_id, draft.clone());
        let context = self.begin("create", Some(item.clone()), |list| {
            let mut next = Vec::with_capacity(list.len() + 1);
            next.extend_from_slice(list);
            next.push(item.clone());
            Some(next)
        });

        let outcome = match inner.remote.create(draft.clone()).await {
            Ok(created) => {
                if self.inner.options.verbose {
                    info!(key = %self.key(), "updating optimistic item with server data");
                }
                if let Some(optimistic) = context.as_ref().and_then(|c| c.new_item.as_ref()) {
                    self.confirm(optimistic.id(), &created);
                }
                Ok(created)
            }
            Err(source) => {
                let rollback = self.rollback(context.as_ref());
                let attempted = context
                    .as_ref()
                    .and_then(|c| c.new_item.as_ref())
                    .map(|item| item.to_draft())
                    .unwrap_or(draft);
                inner.form.set(attempted);
                error!(key = %self.key(), error = %source, rollback = %rollback, "create failed");
                Err(OptimisticError::Remote { source, rollback })
            }
        };

        self.settle();
        outcome
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Shallow-merge `patch` into the cached entry, then update it remotely.
    ///
    /// A missing entry skips the optimistic phase; the request is still sent.
    pub async fn update(&self, id: T::Id, patch: T::Patch) -> Result<T, OptimisticError> {
        let context = self.begin("update", None, |list| {
            let index = list.iter().position(|item| item.id() == &id)?;
            let mut next = list.to_vec();
            next[index] = list[index].merge(&patch);
            Some(next)
        });

        let outcome = match self.inner.remote.update(id.clone(), patch).await {
            Ok(updated) => {
                if context.is_some() {
                    self.confirm(&id, &updated);
                }
                Ok(updated)
            }
            Err(source) => {
                let rollback = self.rollback(context.as_ref());
                error!(key = %self.key(), id = %id, error = %source, rollback = %rollback, "update failed");
                Err(OptimisticError::Remote { source, rollback })
            }
        };

        self.settle();
        outcome
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove the cached entry, then delete it remotely.
    ///
    /// A missing entry leaves the cache untouched; the request is still sent.
    pub async fn delete(&self, id: T::Id) -> Result<bool, OptimisticError> {
        let context = self.begin("delete", None, |list| {
            let index = list.iter().position(|item| item.id() == &id)?;
            let mut next = list.to_vec();
            next.remove(index);
            Some(next)
        });

        let outcome = match self.inner.remote.delete(id.clone()).await {
            Ok(deleted) => Ok(deleted),
            Err(source) => {
                let rollback = self.rollback(context.as_ref());
                error!(key = %self.key(), id = %id, error = %source, rollback = %rollback, "delete failed");
                Err(OptimisticError::Remote { source, rollback })
            }
        };

        self.settle();
        outcome
    }

    // ========================================================================
    // Lifecycle phases
    // ========================================================================

    /// Optimistic phase. `transform` returns `None` when there is nothing to
    /// change (target missing), in which case no context is produced.
    fn begin<F>(
        &self,
        operation: &'static str,
        new_item: Option<T>,
        transform: F,
    ) -> Option<MutationContext<T>>
    where
        F: Fn(&[T]) -> Option<Vec<T>>,
    {
        match self.write_optimistic(&transform) {
            Ok(Some((old_list, old_version, new_version))) => {
                if self.inner.options.verbose {
                    info!(key = %self.key(), operation, version = new_version, "updating cache with new optimistic list");
                }
                Some(MutationContext {
                    old_list,
                    old_version,
                    new_version,
                    new_item,
                })
            }
            Ok(None) => {
                if self.inner.options.verbose {
                    info!(key = %self.key(), operation, "target not in cache, skipping optimistic update");
                }
                None
            }
            Err(err) => {
                warn!(key = %self.key(), operation, error = %err, "optimistic update failed, sending request anyway");
                None
            }
        }
    }

    fn write_optimistic<F>(
        &self,
        transform: &F,
    ) -> Result<Option<(Arc<Vec<T>>, u64, u64)>, CacheError>
    where
        F: Fn(&[T]) -> Option<Vec<T>>,
    {
        let cache = &self.inner.cache;
        let key = self.key();
        let mut cancelled = false;

        // Each pass reads, transforms and writes conditionally, so the
        // speculative list is always derived from the list it replaces.
        loop {
            let (old_list, expected) = match cache.get(key)? {
                Some(snapshot) => (snapshot.data, snapshot.version),
                None => (Arc::new(Vec::new()), ABSENT),
            };
            let Some(new_list) = transform(old_list.as_slice()) else {
                return Ok(None);
            };
            if !cancelled {
                cache.cancel_in_flight(key)?;
                cancelled = true;
            }
            match cache.replace_if_current(key, expected, Arc::new(new_list)) {
                Ok(new_version) => return Ok(Some((old_list, expected, new_version))),
                Err(CacheError::VersionConflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Replace the entry with id `target` by the server's `confirmed` entity,
    /// keeping its position. Nothing happens if the entry is gone.
    fn confirm(&self, target: &T::Id, confirmed: &T) {
        let cache = &self.inner.cache;
        let key = self.key();

        let result = loop {
            let snapshot = match cache.get(key) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => break Ok(false),
                Err(err) => break Err(err),
            };
            let Some(index) = snapshot.data.iter().position(|item| item.id() == target) else {
                break Ok(false);
            };
            let mut next = snapshot.data.to_vec();
            next[index] = confirmed.clone();
            match cache.replace_if_current(key, snapshot.version, Arc::new(next)) {
                Ok(_) => break Ok(true),
                Err(CacheError::VersionConflict { .. }) => continue,
                Err(err) => break Err(err),
            }
        };

        match result {
            Ok(true) => {}
            Ok(false) => debug!(key = %key, id = %target, "entry no longer cached, nothing to confirm"),
            Err(err) => warn!(key = %key, error = %err, "could not patch confirmed entity into cache"),
        }
    }

    fn rollback(&self, context: Option<&MutationContext<T>>) -> Rollback {
        let Some(context) = context else {
            return Rollback::NoContext;
        };
        if self.inner.options.verbose {
            warn!(key = %self.key(), "rolling back optimistic update");
        }
        match self.inner.cache.restore(
            self.key(),
            context.new_version,
            context.old_list.clone(),
            context.old_version,
        ) {
            Ok(_) => Rollback::Restored,
            Err(CacheError::VersionConflict { actual, .. }) => {
                debug!(
                    key = %self.key(),
                    written = context.new_version,
                    current = actual,
                    "cache changed since optimistic write, skipping rollback"
                );
                Rollback::SkippedStale
            }
            Err(err) => Rollback::Failed(err),
        }
    }

    fn settle(&self) {
        if self.inner.options.verbose {
            info!(key = %self.key(), "invalidating to refetch the new data");
        }
        if let Err(err) = self.inner.cache.invalidate(self.key()) {
            error!(key = %self.key(), error = %err, "could not invalidate after mutation");
        }
    }
}
