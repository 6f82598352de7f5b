//! Resolution façade: walk, then detect conflicts/cycles, diagnose
//! unresolved packages, and pick winners.
//!
//! `Resolver` wraps one `DependencyWalker` with the bookkeeping (stats,
//! cache, config) a caller actually wants; `ParallelResolver` bounds how
//! many `Resolver::resolve` calls run concurrently, for callers resolving
//! many independent package sets at once.

use crate::cache::{CacheConfig, WalkerCache};
use crate::client::PackageMetadataClient;
use crate::conflict::{ConflictDetector, ConflictResolver};
use crate::cycle::CycleAnalyzer;
use crate::diagnose::UnresolvedDiagnoser;
use crate::error::ResolveError;
use crate::framework::Framework;
use crate::graph::{GraphArena, NodeId, ResolutionResult, ResolvedPackage};
use crate::package::PackageDependency;
use crate::version::VersionRange;
use crate::walker::{DependencyWalker, WalkerConfig};
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Resolver statistics for monitoring and debugging.
#[derive(Debug, Default)]
pub struct ResolverStats {
    /// Nodes materialized across every `resolve` call on this resolver.
    pub nodes_walked: AtomicU64,
    /// Total wall-clock time spent in the walk phase, in milliseconds.
    pub walk_time_ms: AtomicU64,
    /// Total wall-clock time spent in the detect/diagnose phase, in milliseconds.
    pub analysis_time_ms: AtomicU64,
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Target framework every resolution is performed against.
    pub target_framework: Framework,
    /// Package sources, queried in order; the first to yield a satisfying
    /// candidate for a dependency wins.
    pub sources: Vec<Arc<str>>,
    /// Cache tuning (TTL, eviction delay) shared by every resolve call.
    pub cache: CacheConfig,
}

impl ResolverConfig {
    #[must_use]
    pub fn new(target_framework: Framework, sources: Vec<Arc<str>>) -> Self {
        Self {
            target_framework,
            sources,
            cache: CacheConfig::default(),
        }
    }
}

/// Resolves a package's full dependency graph: walk, detect conflicts and
/// cycles, diagnose anything unresolved, and flatten to one winner per id.
pub struct Resolver<C: PackageMetadataClient> {
    client: Arc<C>,
    config: ResolverConfig,
    cache: WalkerCache,
    stats: Arc<ResolverStats>,
}

impl<C: PackageMetadataClient> std::fmt::Debug for Resolver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<C: PackageMetadataClient + 'static> Resolver<C> {
    #[must_use]
    pub fn new(client: Arc<C>, config: ResolverConfig) -> Self {
        let cache = WalkerCache::new(config.cache);
        Self {
            client,
            config,
            cache,
            stats: Arc::new(ResolverStats::default()),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// Resolve a single root package, recursively.
    ///
    /// # Errors
    ///
    /// Returns the shared `ResolveError` that aborted the walk: a
    /// malformed root range, a non-"not found" fetch failure, or
    /// cancellation.
    pub async fn resolve(
        &self,
        id: &str,
        range: &str,
    ) -> Result<ResolutionResult, Arc<ResolveError>> {
        self.resolve_with(id, range, true, &CancellationToken::new())
            .await
    }

    /// Resolve a single root package without walking its transitive
    /// dependencies: only the root's direct dependencies are materialized.
    ///
    /// # Errors
    ///
    /// Same as `resolve`.
    pub async fn resolve_non_recursive(
        &self,
        id: &str,
        range: &str,
    ) -> Result<ResolutionResult, Arc<ResolveError>> {
        self.resolve_with(id, range, false, &CancellationToken::new())
            .await
    }

    /// Resolve a single root package, recursively, observing `token`: a
    /// cancellation fired before the walk completes aborts it and returns
    /// `ResolveError::Cancelled`.
    ///
    /// # Errors
    ///
    /// Same as `resolve`.
    pub async fn resolve_cancellable(
        &self,
        id: &str,
        range: &str,
        token: &CancellationToken,
    ) -> Result<ResolutionResult, Arc<ResolveError>> {
        self.resolve_with(id, range, true, token).await
    }

    async fn resolve_with(
        &self,
        id: &str,
        range: &str,
        recursive: bool,
        token: &CancellationToken,
    ) -> Result<ResolutionResult, Arc<ResolveError>> {
        let version_range = VersionRange::parse(range).map_err(|_| {
            Arc::new(ResolveError::InvalidRange {
                id: Arc::from(id),
                range: Arc::from(range),
            })
        })?;
        let root_dep = PackageDependency::new(id, version_range);

        let walk_start = Instant::now();
        let mut walker_config = WalkerConfig::new(self.config.target_framework.clone(), self.config.sources.clone());
        if !recursive {
            walker_config = walker_config.non_recursive();
        }
        let walker = self.walker(walker_config);
        let arena = walker.walk(root_dep, token).await?;
        self.stats
            .walk_time_ms
            .fetch_add(walk_start.elapsed().as_millis() as u64, Ordering::Relaxed);
        self.stats
            .nodes_walked
            .fetch_add(arena.len() as u64, Ordering::Relaxed);

        info!(nodes = arena.len(), walk_ms = walk_start.elapsed().as_millis(), "walk complete");

        let result = self.analyze_excluding(&arena, None).await;

        info!(
            packages = result.packages.len(),
            conflicts = result.conflicts.len(),
            cycles = result.cycles.len(),
            unresolved = result.unresolved.len(),
            "resolution complete"
        );
        Ok(result)
    }

    /// Resolve several independent roots together under a synthetic
    /// project node, as a build-time project reference list would.
    ///
    /// # Errors
    ///
    /// Same as `resolve`.
    pub async fn resolve_project(
        &self,
        roots: &[(String, String)],
    ) -> Result<ResolutionResult, Arc<ResolveError>> {
        let token = CancellationToken::new();
        let mut deps = Vec::with_capacity(roots.len());
        for (id, range) in roots {
            let version_range = VersionRange::parse(range).map_err(|_| {
                Arc::new(ResolveError::InvalidRange {
                    id: Arc::from(id.as_str()),
                    range: Arc::from(range.as_str()),
                })
            })?;
            deps.push(PackageDependency::new(id.as_str(), version_range));
        }

        let walker_config = WalkerConfig::new(self.config.target_framework.clone(), self.config.sources.clone());
        let walker = self.walker(walker_config);
        let (arena, synthetic_root) = walker.walk_project(deps, &token).await?;
        Ok(self.analyze_excluding(&arena, Some(synthetic_root)).await)
    }

    fn walker(&self, config: WalkerConfig) -> DependencyWalker<C> {
        DependencyWalker::new(self.client.clone(), self.cache.clone(), config, None)
    }

    /// Shared by `resolve` and `resolve_project`: `exclude` is `Some` only
    /// for the synthetic project root `resolve_project` introduces to hold
    /// multiple independent roots together — it never corresponds to a real
    /// package and must never appear in `packages`. A single real root (the
    /// `resolve`/`resolve_non_recursive`/`resolve_cancellable` path) passes
    /// `None`: NuGet includes the root itself in the resolved package set.
    async fn analyze_excluding(
        &self,
        arena: &GraphArena,
        exclude: Option<NodeId>,
    ) -> ResolutionResult {
        let analysis_start = Instant::now();

        let (conflicts, downgrades) = ConflictDetector::detect(arena);
        let cycles = CycleAnalyzer::analyze(arena);
        let unresolved = UnresolvedDiagnoser::diagnose(
            arena,
            self.client.as_ref(),
            &self.config.sources,
            &self.config.target_framework,
        )
        .await;

        let packages = if conflicts.is_empty() {
            flatten_depth_first(arena, exclude)
        } else {
            pick_winners(arena, exclude, &conflicts)
        };

        self.stats.analysis_time_ms.fetch_add(
            analysis_start.elapsed().as_millis() as u64,
            Ordering::Relaxed,
        );

        ResolutionResult {
            packages,
            conflicts,
            downgrades,
            cycles,
            unresolved,
        }
    }
}

/// Depth-first flatten of the whole tree, deduped by `item.key()`, skipping
/// unresolved and placeholder nodes. Used when no id has conflicting
/// versions, so plain tree order already matches resolution order.
///
/// `exclude`, when set, is the synthetic project root: it is walked (its
/// children are still visited) but never itself emitted. A real root is
/// never excluded.
fn flatten_depth_first(arena: &GraphArena, exclude: Option<NodeId>) -> Vec<ResolvedPackage> {
    let mut seen: AHashMap<Arc<str>, ()> = AHashMap::new();
    let mut out = Vec::new();
    let mut stack = vec![NodeId(0)];
    while let Some(node_id) = stack.pop() {
        let node = arena.node(node_id);
        if Some(node_id) != exclude {
            if let Some(item) = &node.item {
                if !item.is_unresolved && seen.insert(item.key.clone(), ()).is_none() {
                    out.push(ResolvedPackage {
                        id: item.id.clone(),
                        version: item.version.clone(),
                        depth: node.depth,
                    });
                }
            }
        }
        for &child in node.inner_nodes.iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// When conflicts exist, group every node by id and run `ConflictResolver`
/// per id to pick the single winner; ids with no conflict just take their
/// one occurrence.
fn pick_winners(
    arena: &GraphArena,
    exclude: Option<NodeId>,
    conflicts: &[crate::graph::VersionConflict],
) -> Vec<ResolvedPackage> {
    let conflicted_ids: AHashSet<&str> = conflicts.iter().map(|c| c.id.as_ref()).collect();

    let mut by_id: AHashMap<Arc<str>, Vec<NodeId>> = AHashMap::new();
    for (node_id, node) in arena.iter_nodes() {
        if Some(node_id) == exclude {
            continue;
        }
        if let Some(item) = &node.item {
            if !item.is_unresolved {
                by_id.entry(item.id.clone()).or_default().push(node_id);
            }
        }
    }

    let mut out = Vec::new();
    for (id, nodes) in by_id {
        let winner = if conflicted_ids.contains(id.as_ref()) {
            ConflictResolver::resolve_winner(arena, &nodes)
        } else {
            nodes.first().copied()
        };
        if let Some(winner) = winner {
            let node = arena.node(winner);
            if let Some(item) = &node.item {
                out.push(ResolvedPackage {
                    id: item.id.clone(),
                    version: item.version.clone(),
                    depth: node.depth,
                });
            }
        }
    }
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// Bounds how many `Resolver::resolve` calls run concurrently, for a
/// caller resolving many independent package sets at once.
pub struct ParallelResolver<C: PackageMetadataClient> {
    resolver: Arc<Resolver<C>>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    high_water_mark: Arc<AtomicUsize>,
}

impl<C: PackageMetadataClient + 'static> ParallelResolver<C> {
    #[must_use]
    pub fn new(resolver: Arc<Resolver<C>>, max_workers: usize) -> Self {
        Self {
            resolver,
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            high_water_mark: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The largest number of concurrently in-flight resolves observed so
    /// far, for tests asserting the concurrency bound was respected.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::SeqCst)
    }

    /// Resolve one root, queued behind the worker semaphore.
    ///
    /// # Errors
    ///
    /// Same as `Resolver::resolve`.
    pub async fn resolve(&self, id: &str, range: &str) -> Result<ResolutionResult, Arc<ResolveError>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("semaphore is never closed while a ParallelResolver is alive");
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water_mark.fetch_max(current, Ordering::SeqCst);
        let result = self.resolver.resolve(id, range).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Resolve `packages` in fixed-size windows, awaiting each window
    /// before starting the next.
    ///
    /// # Errors
    ///
    /// Same as `resolve`, for whichever package first fails within its
    /// window.
    pub async fn resolve_batch(
        &self,
        packages: &[(String, String)],
        batch_size: usize,
    ) -> Vec<Result<ResolutionResult, Arc<ResolveError>>> {
        let mut out = Vec::with_capacity(packages.len());
        for window in packages.chunks(batch_size.max(1)) {
            let futures = window
                .iter()
                .map(|(id, range)| self.resolve(id, range));
            out.extend(futures::future::join_all(futures).await);
        }
        out
    }
}
