//! Arena-backed dependency graph.
//!
//! Nodes and edges live in flat `Vec`s indexed by `NodeId`/`EdgeId` rather
//! than behind `Rc<RefCell<_>>`: the walk tree only ever grows, parent
//! pointers are plain indices, and cycle detection walks an index chain
//! instead of re-dereferencing shared owners.

use crate::package::PackageDependency;
use crate::version::NuGetVersion;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Index into `GraphArena::nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Index into `GraphArena::edges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Classification assigned to a node once the walker decides how to treat
/// the dependency that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    /// Default: a normal, walkable node.
    Acceptable,
    /// Reserved for a future eclipse policy; never produced today.
    Rejected,
    /// Reserved for a future eclipse policy; never produced today.
    Accepted,
    /// Flagged by the conflict detector as shadowing a higher version
    /// requested elsewhere in the graph.
    PotentiallyDowngraded,
    /// A placeholder standing in for a dependency whose id already appears
    /// on its own ancestor chain.
    Cycle,
}

/// Materialized package info attached to a non-placeholder node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeItem {
    /// Canonical `"{id}|{version}"` key.
    pub key: Arc<str>,
    /// Package id.
    pub id: Arc<str>,
    /// Resolved version, or the requested range string for unresolved nodes.
    pub version: NuGetVersion,
    /// Whether this item stands in for a package that could not be found.
    pub is_unresolved: bool,
    /// Verbatim requested range, preserved for unresolved nodes.
    pub requested_range: Option<Arc<str>>,
}

impl NodeItem {
    #[must_use]
    pub fn resolved(id: impl Into<Arc<str>>, version: NuGetVersion) -> Self {
        let id = id.into();
        let key = Arc::from(format!("{id}|{version}"));
        Self {
            key,
            id,
            version,
            is_unresolved: false,
            requested_range: None,
        }
    }

    #[must_use]
    pub fn unresolved(id: impl Into<Arc<str>>, requested_range: impl Into<Arc<str>>) -> Self {
        let id = id.into();
        let requested_range = requested_range.into();
        let key = Arc::from(format!("{id}|{requested_range}"));
        Self {
            key,
            id,
            version: NuGetVersion::zero(),
            is_unresolved: true,
            requested_range: Some(requested_range),
        }
    }
}

/// A node in the walk tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Materialized info, or `None` for a cycle placeholder.
    pub item: Option<NodeItem>,
    /// Tree parent; `None` only for the root.
    pub outer_node: Option<NodeId>,
    /// Tree children, in declaration order.
    pub inner_nodes: Vec<NodeId>,
    /// All parents when this node is shared across more than one edge.
    /// Populated only by callers that explicitly attach a resolved node to
    /// a second parent; the walker itself always creates fresh nodes.
    pub parent_nodes: SmallVec<[NodeId; 1]>,
    /// Back-chain pointer distinct from `outer_node`, used for the O(depth)
    /// ancestor scan in cycle detection.
    pub outer_edge: Option<EdgeId>,
    /// Disposition assigned once the node is fully processed.
    pub disposition: Disposition,
    /// Distance from the root (root is 0).
    pub depth: u32,
}

impl GraphNode {
    /// The node's canonical key, or the synthetic `"{id}|cycle"` key for a
    /// placeholder (placeholders have no materialized item).
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.item.as_ref().map(|i| i.key.as_ref())
    }
}

/// A back-chain edge: the dependency that induced a node plus the item on
/// the node that declared it. Distinct from `outer_node` so cycle testing
/// never needs to re-dereference the owning tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// The node this edge originates from (the parent).
    pub from: NodeId,
    /// The dependency that produced the child.
    pub dependency: PackageDependency,
    /// The parent edge of `from`, forming the ancestor chain.
    pub parent_edge: Option<EdgeId>,
}

/// Arena owning every node and edge created during a walk.
#[derive(Debug, Default)]
pub struct GraphArena {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl GraphArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the root node (depth 0, no parent, no outer edge).
    pub fn push_root(&mut self, item: Option<NodeItem>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(GraphNode {
            item,
            outer_node: None,
            inner_nodes: Vec::new(),
            parent_nodes: SmallVec::new(),
            outer_edge: None,
            disposition: Disposition::Acceptable,
            depth: 0,
        });
        id
    }

    /// Insert a child of `parent`, linked by `edge` (already pushed via
    /// `push_edge`), and register it in `parent`'s `inner_nodes`.
    pub fn push_child(
        &mut self,
        parent: NodeId,
        outer_edge: EdgeId,
        item: Option<NodeItem>,
        disposition: Disposition,
    ) -> NodeId {
        let depth = self.node(parent).depth + 1;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(GraphNode {
            item,
            outer_node: Some(parent),
            inner_nodes: Vec::new(),
            parent_nodes: SmallVec::new(),
            outer_edge: Some(outer_edge),
            disposition,
            depth,
        });
        self.node_mut(parent).inner_nodes.push(id);
        id
    }

    /// Push a new edge originating at `from`, chained onto `from`'s own
    /// `outer_edge` so the ancestor scan can follow it transitively.
    pub fn push_edge(&mut self, from: NodeId, dependency: PackageDependency) -> EdgeId {
        let parent_edge = self.node(from).outer_edge;
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(GraphEdge {
            from,
            dependency,
            parent_edge,
        });
        id
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id.0 as usize]
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &GraphEdge {
        &self.edges[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node in arena (insertion) order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Ancestor ids of `node`, nearest first, following `outer_node`.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.node(node).outer_node, |n| self.node(*n).outer_node)
    }

    /// Algorithm A: does the edge chain reachable from `outer_edge` contain
    /// an item whose id equals `id`? Placeholders (edges whose originating
    /// node has no item) are transparent — the scan only inspects each
    /// edge's *origin node* item, which the walker always has for the node
    /// that declared a dependency (only the cycle placeholder itself lacks
    /// one, and it is never the origin of an edge).
    #[must_use]
    pub fn ancestor_chain_contains_id(&self, mut edge: Option<EdgeId>, id: &str) -> bool {
        while let Some(e) = edge {
            let edge_ref = self.edge(e);
            if let Some(item) = &self.node(edge_ref.from).item {
                if item.id.as_ref() == id {
                    return true;
                }
            }
            edge = edge_ref.parent_edge;
        }
        false
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A version conflict: the same id resolved to more than one distinct
/// version somewhere in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConflict {
    pub id: Arc<str>,
    pub versions: Vec<NuGetVersion>,
    /// One path per occurrence, root-to-node, each entry `"{id} {version}"`.
    pub paths: Vec<Vec<String>>,
}

/// A node flagged as potentially shadowing a higher version requested
/// elsewhere. `current_version` is left empty: the walker's current
/// eclipse policy does not yet compute it (see the Open Question on
/// downgrade classification).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowngradeWarning {
    pub id: Arc<str>,
    pub target_version: NuGetVersion,
    pub current_version: Option<NuGetVersion>,
    pub path: Vec<String>,
}

/// A detected cycle: the point where an id reappears on its own ancestor
/// chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub package_id: Arc<str>,
    pub path_to_self: Vec<String>,
    pub depth: u32,
    pub description: String,
}

/// Stable error-code taxonomy for unresolved packages, styled after a
/// small `enum`-with-code convention rather than raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NuErrorCode {
    /// No source has any version of the package.
    Nu1101,
    /// Versions exist but none satisfies the requested range.
    Nu1102,
    /// Reserved: only prerelease versions exist while stable was requested.
    /// Never constructed by the current diagnoser.
    Nu1103,
}

impl fmt::Display for NuErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Nu1101 => "NU1101",
            Self::Nu1102 => "NU1102",
            Self::Nu1103 => "NU1103",
        };
        write!(f, "{s}")
    }
}

/// A diagnosed unresolved package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedPackage {
    pub id: Arc<str>,
    pub version_range: Arc<str>,
    pub target_framework: Option<Arc<str>>,
    pub error_code: NuErrorCode,
    pub message: String,
    pub sources: Vec<Arc<str>>,
    pub available_versions: Vec<NuGetVersion>,
    pub nearest_version: Option<NuGetVersion>,
}

/// A winning package in a finished resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub id: Arc<str>,
    pub version: NuGetVersion,
    pub depth: u32,
}

/// The outcome of a `Resolver::resolve` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub packages: Vec<ResolvedPackage>,
    pub conflicts: Vec<VersionConflict>,
    pub downgrades: Vec<DowngradeWarning>,
    pub cycles: Vec<CycleReport>,
    pub unresolved: Vec<UnresolvedPackage>,
}

impl ResolutionResult {
    /// Whether every requested package was satisfied.
    #[must_use]
    pub fn success(&self) -> bool {
        self.unresolved.is_empty()
    }
}
