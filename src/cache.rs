//! Two-tier metadata cache: single-flight `OperationCache` plus a
//! lock-free memoization fast path, `WalkerCache`, layered on top.

use crate::error::ResolveError;
use crate::package::PackageDependencyInfo;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Result type shared by every waiter on a given operation-cache key.
pub type SharedFetchResult = Result<Arc<PackageDependencyInfo>, Arc<ResolveError>>;

type SharedFuture = Shared<BoxFuture<'static, SharedFetchResult>>;

/// Tunables for both cache tiers, mirroring the teacher's
/// `ResolverConfig`-style knobs: nothing here is hard-coded so callers can
/// adjust TTL/eviction to match their own source's latency profile.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long a published entry stays valid when read.
    pub ttl: Duration,
    /// How long after publication a completed entry is removed, even if
    /// never re-read. Kept separate from `ttl` because eviction is purely
    /// about shedding memory, while TTL is about freshness of the result.
    pub eviction_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            eviction_delay: Duration::from_secs(5),
        }
    }
}

struct OperationEntry {
    future: SharedFuture,
    published_at: parking_lot::Mutex<Option<Instant>>,
}

/// Single-flight, TTL'd fetch deduplication. At most one call to the
/// supplied fetcher runs per key; every other caller observes the same
/// `Shared` future, success or error alike.
#[derive(Clone)]
pub struct OperationCache {
    entries: Arc<DashMap<String, Arc<OperationEntry>>>,
    config: CacheConfig,
}

impl OperationCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Run `fetcher` for `key`, deduplicated against any other in-flight or
    /// cached call for the same key.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Cancelled` if `token` fires before the fetch
    /// (this caller's or another's) completes. Returns the fetcher's own
    /// error, shared identically to every other waiter, if the fetch fails.
    pub async fn get_or_start<F, Fut>(
        &self,
        key: &str,
        token: &CancellationToken,
        fetcher: F,
    ) -> SharedFetchResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = SharedFetchResult> + Send + 'static,
    {
        loop {
            if let Some(entry) = self.entries.get(key) {
                let entry = entry.clone();
                let stale = entry
                    .published_at
                    .lock()
                    .is_some_and(|at| at.elapsed() > self.config.ttl);
                if stale {
                    trace!(key, "operation cache entry stale, retrying");
                    self.entries.remove(key);
                    continue;
                }
                return Self::await_with_cancellation(entry, token).await;
            }

            let fresh = Arc::new(OperationEntry {
                future: Box::pin(async move { fetcher().await }).shared(),
                published_at: parking_lot::Mutex::new(None),
            });
            // DashMap::entry gives atomic insert-or-get so a race between
            // two first-callers still only starts one fetch.
            let entry = match self.entries.entry(key.to_string()) {
                Entry::Occupied(existing) => existing.get().clone(),
                Entry::Vacant(slot) => {
                    slot.insert(fresh.clone());
                    fresh
                }
            };

            let result = Self::await_with_cancellation(entry.clone(), token).await;
            *entry.published_at.lock() = Some(Instant::now());
            self.schedule_eviction(key.to_string());
            return result;
        }
    }

    async fn await_with_cancellation(
        entry: Arc<OperationEntry>,
        token: &CancellationToken,
    ) -> SharedFetchResult {
        tokio::select! {
            result = entry.future.clone() => result,
            () = token.cancelled() => Err(Arc::new(ResolveError::Cancelled)),
        }
    }

    /// Fire-and-forget: removes the entry after `eviction_delay`, tolerant
    /// of the entry (or even the whole `Resolver`) being long gone by then.
    fn schedule_eviction(&self, key: String) {
        let entries = self.entries.clone();
        let delay = self.config.eviction_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            entries.remove(&key);
        });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Lock-free memoization over `OperationCache`. Pure fast path: a hit here
/// skips the single-flight machinery entirely; a miss always falls through
/// to `OperationCache::get_or_start`, which still handles concurrent
/// first-callers correctly even if several threads miss the fast path at
/// once.
#[derive(Clone)]
pub struct WalkerCache {
    completed: Arc<DashMap<String, Arc<PackageDependencyInfo>>>,
    operations: OperationCache,
}

impl WalkerCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            completed: Arc::new(DashMap::new()),
            operations: OperationCache::new(config),
        }
    }

    /// Fetch `key`, using the fast path if already completed, otherwise
    /// delegating to the operation cache and publishing the result.
    ///
    /// # Errors
    ///
    /// Propagates `ResolveError` from the fetcher or cancellation.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        token: &CancellationToken,
        fetcher: F,
    ) -> SharedFetchResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = SharedFetchResult> + Send + 'static,
    {
        if let Some(hit) = self.completed.get(key) {
            trace!(key, "walker cache fast-path hit");
            return Ok(hit.clone());
        }
        let result = self.operations.get_or_start(key, token, fetcher).await;
        if let Ok(info) = &result {
            self.completed.insert(key.to_string(), info.clone());
        }
        result
    }

    #[cfg(test)]
    fn fast_path_len(&self) -> usize {
        self.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::NuGetVersion;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_info() -> SharedFetchResult {
        Ok(Arc::new(PackageDependencyInfo::new(
            "Pkg",
            NuGetVersion::new(1, 0, 0, 0),
        )))
    }

    #[tokio::test]
    async fn concurrent_callers_trigger_one_fetch() {
        let cache = OperationCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let token = CancellationToken::new();
                cache
                    .get_or_start("Pkg|[1.0.0,)|net8.0", &token, move || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            ok_info()
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_affect_survivors() {
        let cache = OperationCache::new(CacheConfig::default());
        let token = CancellationToken::new();
        let cancel_token = token.clone();

        let slow = tokio::spawn({
            let cache = cache.clone();
            async move {
                let token = CancellationToken::new();
                cache
                    .get_or_start("Pkg|1.0.0|net8.0", &token, || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        ok_info()
                    })
                    .await
            }
        });

        let cancelled = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_start("Pkg|1.0.0|net8.0", &cancel_token, || async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        ok_info()
                    })
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        token.cancel();

        assert!(cancelled.await.unwrap().is_err());
        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn walker_cache_fast_path_populated_after_fetch() {
        let cache = WalkerCache::new(CacheConfig::default());
        let token = CancellationToken::new();
        cache
            .get_or_fetch("Pkg|1.0.0|net8.0", &token, || async move { ok_info() })
            .await
            .unwrap();
        assert_eq!(cache.fast_path_len(), 1);
    }
}
