//! Post-walk conflict detection and winner selection.
//!
//! Two passes over the finished graph: `ConflictDetector` finds every id
//! that resolved to more than one distinct version (plus any node flagged
//! `PotentiallyDowngraded`), and `ConflictResolver` picks a single winner
//! per conflicting id by depth-then-version precedence.

use crate::graph::{DowngradeWarning, Disposition, GraphArena, NodeId, VersionConflict};
use ahash::AHashMap;
use std::sync::Arc;

/// Walks the finished arena once, grouping resolved (non-placeholder)
/// nodes by package id.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Find every id with more than one distinct version in the graph, and
    /// every node flagged as potentially shadowing a higher version
    /// requested elsewhere.
    #[must_use]
    pub fn detect(arena: &GraphArena) -> (Vec<VersionConflict>, Vec<DowngradeWarning>) {
        let mut by_id: AHashMap<Arc<str>, Vec<NodeId>> = AHashMap::new();
        let mut downgrades = Vec::new();

        for (id, node) in arena.iter_nodes() {
            let Some(item) = &node.item else { continue };
            if node.disposition == Disposition::PotentiallyDowngraded {
                downgrades.push(DowngradeWarning {
                    id: item.id.clone(),
                    target_version: item.version.clone(),
                    current_version: None,
                    path: path_to(arena, id),
                });
            }
            by_id.entry(item.id.clone()).or_default().push(id);
        }

        let mut conflicts = Vec::new();
        for (id, nodes) in by_id {
            let mut versions: Vec<_> = nodes
                .iter()
                .filter_map(|n| arena.node(*n).item.as_ref())
                .map(|item| item.version.clone())
                .collect();
            versions.sort();
            versions.dedup();
            if versions.len() > 1 {
                let paths = nodes.iter().map(|n| path_to(arena, *n)).collect();
                conflicts.push(VersionConflict {
                    id,
                    versions,
                    paths,
                });
            }
        }
        // Stable, deterministic ordering for callers/tests.
        conflicts.sort_by(|a, b| a.id.cmp(&b.id));
        downgrades.sort_by(|a, b| a.id.cmp(&b.id));
        (conflicts, downgrades)
    }
}

fn path_to(arena: &GraphArena, node: NodeId) -> Vec<String> {
    let mut path: Vec<String> = std::iter::once(node)
        .chain(arena.ancestors(node))
        .filter_map(|n| {
            arena
                .node(n)
                .item
                .as_ref()
                .map(|item| format!("{} {}", item.id, item.version))
        })
        .collect();
    path.reverse();
    path
}

/// Picks the single winning node per conflicting package id.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Order `nodes` by `(depth ascending, version descending)` and return
    /// the winner. Nodes without a materialized item (placeholders) sort
    /// last at their depth and never win when any resolved node competes.
    #[must_use]
    pub fn resolve_winner(arena: &GraphArena, nodes: &[NodeId]) -> Option<NodeId> {
        let mut candidates: Vec<NodeId> = nodes.to_vec();
        candidates.sort_by(|&a, &b| {
            let na = arena.node(a);
            let nb = arena.node(b);
            na.depth.cmp(&nb.depth).then_with(|| {
                match (&na.item, &nb.item) {
                    (Some(ia), Some(ib)) => ib.version.cmp(&ia.version),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            })
        });
        candidates.into_iter().find(|n| arena.node(*n).item.is_some())
    }
}
