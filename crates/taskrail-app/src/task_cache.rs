//! Locally cached view of the task collection and its invalidation protocol.
//!
//! The remote store is the source of truth; the coordinator owns the derived
//! [`TaskCollectionView`] and [`TaskStats`] caches and guarantees that after
//! any confirmed mutation, readers eventually observe the post-mutation
//! server state. Overlapping refetches of the same scope are tolerated: each
//! fetch is tagged with a monotonically increasing sequence number taken
//! under the cache lock, and a completed fetch only commits when its number
//! is newer than the last applied one, so a reordered older response can
//! never overwrite a newer one.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use taskrail_core::{ApiError, Task, TaskFilter, TaskStats};

use crate::gateway::RemoteGateway;

/// Cache scopes that can be invalidated and refetched independently.
///
/// `Tasks` is a single global scope regardless of filter: every mutation
/// invalidates the whole list. This mirrors the coarse invalidation of the
/// original application and is intentional, not an omission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// The cached task collection.
    Tasks,
    /// The cached aggregate statistics.
    TaskStats,
}

/// Cached ordered task collection plus the filter it was fetched with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCollectionView {
    /// Tasks in server order.
    pub tasks: Vec<Task>,
    /// Total matching tasks across all pages.
    pub total: u64,
    /// Filter the view was fetched under.
    pub filter: TaskFilter,
}

#[derive(Debug, Default)]
struct ScopeEntry<T> {
    value: Option<T>,
    stale: bool,
    applied_seq: u64,
}

impl<T> ScopeEntry<T> {
    const fn invalidate(&mut self) {
        self.stale = true;
    }

    fn fresh(&self) -> Option<&T> {
        if self.stale { None } else { self.value.as_ref() }
    }

    fn commit(&mut self, seq: u64, value: T) -> bool {
        if seq <= self.applied_seq {
            return false;
        }
        self.applied_seq = seq;
        self.value = Some(value);
        self.stale = false;
        true
    }
}

#[derive(Debug, Default)]
struct CacheState {
    tasks: ScopeEntry<TaskCollectionView>,
    stats: ScopeEntry<TaskStats>,
    next_seq: u64,
}

/// Owner of the cached task collection and statistics.
///
/// All mutation of the cached views is funneled through this type; callers
/// share it via `Arc`.
pub struct TaskCacheCoordinator<G> {
    gateway: Arc<G>,
    state: Mutex<CacheState>,
}

impl<G: RemoteGateway> TaskCacheCoordinator<G> {
    /// Create a coordinator over the given gateway.
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Return the cached collection for `filter`, fetching when the cache is
    /// stale, empty, or was populated under a different filter.
    ///
    /// # Errors
    /// Propagates gateway failures; the cache is left untouched on error.
    pub async fn read(&self, filter: &TaskFilter) -> Result<TaskCollectionView, ApiError> {
        {
            let state = self.state.lock().await;
            if let Some(view) = state.tasks.fresh()
                && view.filter == *filter
            {
                return Ok(view.clone());
            }
        }
        self.refetch_tasks(filter).await
    }

    /// Return the cached statistics, fetching when stale or empty.
    ///
    /// # Errors
    /// Propagates gateway failures; the cache is left untouched on error.
    pub async fn stats(&self) -> Result<TaskStats, ApiError> {
        {
            let state = self.state.lock().await;
            if let Some(stats) = state.stats.fresh() {
                return Ok(*stats);
            }
        }
        self.refetch_stats().await
    }

    /// Mark the named scope stale. Idempotent.
    pub async fn invalidate(&self, scope: CacheScope) {
        let mut state = self.state.lock().await;
        match scope {
            CacheScope::Tasks => state.tasks.invalidate(),
            CacheScope::TaskStats => state.stats.invalidate(),
        }
    }

    /// Force an immediate fetch of the task collection, replacing the cached
    /// entry atomically when this fetch is still the newest one.
    ///
    /// # Errors
    /// Propagates gateway failures; the cache is left untouched on error.
    pub async fn refetch_tasks(&self, filter: &TaskFilter) -> Result<TaskCollectionView, ApiError> {
        let seq = self.begin_fetch().await;
        let page = self.gateway.list_tasks(filter).await?;
        let view = TaskCollectionView {
            tasks: page.tasks,
            total: page.total,
            filter: filter.clone(),
        };
        Ok(self.commit_tasks(seq, view).await)
    }

    /// Force an immediate fetch of the aggregate statistics.
    ///
    /// There is no dedicated stats endpoint; the coordinator derives the
    /// counters from an unfiltered list fetch.
    ///
    /// # Errors
    /// Propagates gateway failures; the cache is left untouched on error.
    pub async fn refetch_stats(&self) -> Result<TaskStats, ApiError> {
        let seq = self.begin_fetch().await;
        let page = self.gateway.list_tasks(&TaskFilter::default()).await?;
        let stats = TaskStats::from_tasks(&page.tasks);
        Ok(self.commit_stats(seq, stats).await)
    }

    /// Invalidate and refetch both scopes, as required after every confirmed
    /// mutation. The tasks scope is refetched under the filter of the current
    /// cached view so the visible list stays on the user's selection.
    ///
    /// # Errors
    /// Propagates the first gateway failure; failed scopes stay stale-marked
    /// so the next read refetches them.
    pub async fn refresh_after_mutation(&self) -> Result<(), ApiError> {
        let filter = {
            let mut state = self.state.lock().await;
            state.tasks.invalidate();
            state.stats.invalidate();
            state
                .tasks
                .value
                .as_ref()
                .map_or_else(TaskFilter::default, |view| view.filter.clone())
        };
        self.refetch_tasks(&filter).await?;
        self.refetch_stats().await?;
        Ok(())
    }

    /// Drop every cached value, e.g. on logout.
    ///
    /// Also advances the applied sequence numbers past any fetch currently in
    /// flight, so a response dispatched before the purge cannot resurrect the
    /// cache afterwards.
    pub async fn purge(&self) {
        let mut state = self.state.lock().await;
        state.next_seq += 1;
        let fence = state.next_seq;
        state.tasks = ScopeEntry {
            value: None,
            stale: false,
            applied_seq: fence,
        };
        state.stats = ScopeEntry {
            value: None,
            stale: false,
            applied_seq: fence,
        };
        debug!(fence, "task cache purged");
    }

    async fn begin_fetch(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.next_seq += 1;
        state.next_seq
    }

    async fn commit_tasks(&self, seq: u64, view: TaskCollectionView) -> TaskCollectionView {
        let mut state = self.state.lock().await;
        if state.tasks.commit(seq, view.clone()) {
            return view;
        }
        debug!(seq, "discarded stale task fetch");
        // Either a newer fetch already landed (hand back the newer view) or a
        // purge fenced this fetch off; a purged entry must never leak the
        // superseded response, notably one from a logged-out account.
        state.tasks.value.clone().unwrap_or_default()
    }

    async fn commit_stats(&self, seq: u64, stats: TaskStats) -> TaskStats {
        let mut state = self.state.lock().await;
        if state.stats.commit(seq, stats) {
            return stats;
        }
        debug!(seq, "discarded stale stats fetch");
        state.stats.value.unwrap_or_default()
    }
}
