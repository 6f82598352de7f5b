//! Stack-based, parallel-fetching dependency walker.
//!
//! Builds the graph starting at a root (or, for `walk_project`, a
//! synthetic project node) using an explicit `Vec`-backed frame stack —
//! never language-level recursion. Each frame fetches every sibling
//! dependency concurrently, classifies each as a cycle or an acceptable
//! candidate by scanning the edge chain, and pushes newly created child
//! frames back onto the stack so traversal stays depth-first.

use crate::cache::{SharedFetchResult, WalkerCache};
use crate::client::PackageMetadataClient;
use crate::error::ResolveError;
use crate::framework::Framework;
use crate::graph::{Disposition, GraphArena, NodeId, NodeItem};
use crate::package::{PackageDependency, PackageDependencyInfo};
use crate::selector::FrameworkSelector;
use crate::version::NuGetVersion;
use ahash::AHashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Per-walk tunables. `recursive = false` materializes only the root's
/// direct dependencies: their own dependencies are never fetched.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub target_framework: Framework,
    pub sources: Vec<Arc<str>>,
    pub recursive: bool,
}

impl WalkerConfig {
    #[must_use]
    pub fn new(target_framework: Framework, sources: Vec<Arc<str>>) -> Self {
        Self {
            target_framework,
            sources,
            recursive: true,
        }
    }

    #[must_use]
    pub fn non_recursive(mut self) -> Self {
        self.recursive = false;
        self
    }
}

enum Planned {
    Cycle(PackageDependency),
    Fetch(PackageDependency),
}

struct Frame {
    node: NodeId,
    outer_edge: Option<crate::graph::EdgeId>,
    info: Arc<PackageDependencyInfo>,
}

/// Builds a dependency graph one root (or synthetic project root) at a
/// time, fetching metadata through a `WalkerCache`.
pub struct DependencyWalker<C: PackageMetadataClient> {
    client: Arc<C>,
    cache: WalkerCache,
    config: WalkerConfig,
    semaphore: Option<Arc<Semaphore>>,
}

impl<C: PackageMetadataClient + 'static> DependencyWalker<C> {
    #[must_use]
    pub fn new(
        client: Arc<C>,
        cache: WalkerCache,
        config: WalkerConfig,
        semaphore: Option<Arc<Semaphore>>,
    ) -> Self {
        Self {
            client,
            cache,
            config,
            semaphore,
        }
    }

    /// Walk a single root dependency to completion.
    ///
    /// # Errors
    ///
    /// Returns the shared `ResolveError` from a failed fetch or a
    /// cancellation, which aborts the walk outright.
    pub async fn walk(
        &self,
        root_dep: PackageDependency,
        token: &CancellationToken,
    ) -> Result<GraphArena, Arc<ResolveError>> {
        let mut arena = GraphArena::new();
        let root_info = self.fetch_raw(&root_dep, token).await?;
        let root_id = arena.push_root(Some(to_node_item(&root_info)));
        debug!(id = %root_dep.id, unresolved = root_info.is_unresolved, "root fetched");
        if !root_info.is_unresolved {
            self.run(&mut arena, root_id, None, root_info, token).await?;
        }
        Ok(arena)
    }

    /// Walk several roots at once under a synthetic `"__project__"` node,
    /// as if they were its direct dependencies. Returns the arena plus the
    /// id of the synthetic root (callers exclude it from final output).
    ///
    /// # Errors
    ///
    /// Same as `walk`.
    pub async fn walk_project(
        &self,
        roots: Vec<PackageDependency>,
        token: &CancellationToken,
    ) -> Result<(GraphArena, NodeId), Arc<ResolveError>> {
        let mut arena = GraphArena::new();
        let synthetic_item = NodeItem::resolved("__project__", NuGetVersion::new(1, 0, 0, 0));
        let root_id = arena.push_root(Some(synthetic_item));
        let synthetic_info = Arc::new(
            PackageDependencyInfo::new("__project__", NuGetVersion::new(1, 0, 0, 0))
                .with_dependencies(roots),
        );
        self.run(&mut arena, root_id, None, synthetic_info, token)
            .await?;
        Ok((arena, root_id))
    }

    async fn run(
        &self,
        arena: &mut GraphArena,
        node: NodeId,
        outer_edge: Option<crate::graph::EdgeId>,
        info: Arc<PackageDependencyInfo>,
        token: &CancellationToken,
    ) -> Result<(), Arc<ResolveError>> {
        let mut stack = vec![Frame {
            node,
            outer_edge,
            info,
        }];

        while let Some(frame) = stack.pop() {
            if token.is_cancelled() {
                return Err(Arc::new(ResolveError::Cancelled));
            }

            let suppressed = frame
                .outer_edge
                .is_some_and(|e| arena.edge(e).dependency.suppress_parent.is_all());
            if suppressed {
                trace!(id = %frame.info.id, "dependencies suppressed, skipping emission");
                continue;
            }
            if !self.config.recursive && arena.node(frame.node).depth >= 1 {
                continue;
            }

            let deps = select_dependencies(&frame.info, &self.config.target_framework);
            if deps.is_empty() {
                continue;
            }

            let current_id = frame.info.id.clone();
            let planned: Vec<Planned> = deps
                .iter()
                .map(|dep| {
                    let is_cycle = dep.id.as_ref() == current_id.as_ref()
                        || arena.ancestor_chain_contains_id(frame.outer_edge, &dep.id);
                    if is_cycle {
                        Planned::Cycle(dep.clone())
                    } else {
                        Planned::Fetch(dep.clone())
                    }
                })
                .collect();

            let mut in_flight = FuturesUnordered::new();
            for (i, p) in planned.iter().enumerate() {
                if let Planned::Fetch(dep) = p {
                    let dep = dep.clone();
                    in_flight.push(async move {
                        let result = self.fetch_raw(&dep, token).await;
                        (i, result)
                    });
                }
            }
            let mut fetched: AHashMap<usize, SharedFetchResult> = AHashMap::new();
            while let Some((i, result)) = in_flight.next().await {
                fetched.insert(i, result);
            }

            let mut new_frames = Vec::new();
            for (i, p) in planned.into_iter().enumerate() {
                match p {
                    Planned::Cycle(dep) => {
                        let edge = arena.push_edge(frame.node, dep);
                        arena.push_child(frame.node, edge, None, Disposition::Cycle);
                    }
                    Planned::Fetch(dep) => {
                        let edge = arena.push_edge(frame.node, dep);
                        match fetched.remove(&i).expect("every Fetch has a result") {
                            Err(e) => return Err(e),
                            Ok(child_info) => {
                                let item = to_node_item(&child_info);
                                let child = arena.push_child(
                                    frame.node,
                                    edge,
                                    Some(item),
                                    Disposition::Acceptable,
                                );
                                if !child_info.is_unresolved {
                                    new_frames.push(Frame {
                                        node: child,
                                        outer_edge: Some(edge),
                                        info: child_info,
                                    });
                                }
                            }
                        }
                    }
                }
            }
            for f in new_frames.into_iter().rev() {
                stack.push(f);
            }
        }

        Ok(())
    }

    /// Resolve one dependency: query sources in order, keep the highest
    /// version satisfying the requested range, stop at the first source
    /// that yields any satisfying candidate.
    async fn fetch_raw(
        &self,
        dep: &PackageDependency,
        token: &CancellationToken,
    ) -> SharedFetchResult {
        let _permit = match &self.semaphore {
            Some(sem) => Some(
                sem.clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed while a Resolver is alive"),
            ),
            None => None,
        };

        let key = format!(
            "{}|{}|{}",
            dep.id,
            dep.version_range.as_str(),
            self.config.target_framework
        );
        let sources = self.config.sources.clone();
        let client = self.client.clone();
        let dep = dep.clone();
        self.cache
            .get_or_fetch(&key, token, move || async move {
                for source in &sources {
                    let candidates = client
                        .get_package_metadata(source, &dep.id)
                        .await
                        .map_err(Arc::new)?;
                    if let Some(best) = candidates
                        .into_iter()
                        .filter(|c| dep.version_range.matches(&c.version))
                        .max_by(|a, b| a.version.cmp(&b.version))
                    {
                        return Ok(Arc::new(best));
                    }
                }
                Ok(Arc::new(PackageDependencyInfo::unresolved(
                    dep.id.clone(),
                    dep.version_range.as_str(),
                )))
            })
            .await
    }

}

fn to_node_item(info: &PackageDependencyInfo) -> NodeItem {
    if info.is_unresolved {
        NodeItem::unresolved(
            info.id.clone(),
            info.requested_range.clone().unwrap_or_else(|| Arc::from("")),
        )
    } else {
        NodeItem::resolved(info.id.clone(), info.version.clone())
    }
}

fn select_dependencies<'a>(
    info: &'a PackageDependencyInfo,
    target: &Framework,
) -> &'a [PackageDependency] {
    if info.dependency_groups.is_empty() {
        &info.dependencies
    } else {
        FrameworkSelector::select(target, &info.dependency_groups).unwrap_or(&[])
    }
}
