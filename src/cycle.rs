//! Post-walk cycle reporting.
//!
//! The walker never halts on a cycle: it drops a `Disposition::Cycle`
//! placeholder the moment an id reappears on its own ancestor chain and
//! moves on. `CycleAnalyzer` turns those placeholders into human-readable
//! reports after the walk finishes.

use crate::graph::{CycleReport, Disposition, GraphArena};

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleAnalyzer;

impl CycleAnalyzer {
    /// Collect one `CycleReport` per `Disposition::Cycle` placeholder in
    /// the graph.
    #[must_use]
    pub fn analyze(arena: &GraphArena) -> Vec<CycleReport> {
        let mut reports = Vec::new();
        for (node_id, node) in arena.iter_nodes() {
            if node.disposition != Disposition::Cycle {
                continue;
            }
            let edge_id = node
                .outer_edge
                .expect("a cycle placeholder is always attached via an edge");
            let package_id = arena.edge(edge_id).dependency.id.clone();

            let mut path_to_self: Vec<String> = arena
                .ancestors(node_id)
                .filter_map(|n| {
                    arena
                        .node(n)
                        .item
                        .as_ref()
                        .map(|item| format!("{} {}", item.id, item.version))
                })
                .collect();
            path_to_self.reverse();

            let mut description = path_to_self.join(" -> ");
            if !description.is_empty() {
                description.push_str(" -> ");
            }
            description.push_str(&package_id);
            description = format!("Circular dependency: {description}");

            reports.push(CycleReport {
                package_id,
                path_to_self,
                depth: node.depth,
                description,
            });
        }
        reports
    }
}
