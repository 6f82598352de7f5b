//! NuGet-compatible dependency resolver.
//!
//! This crate provides:
//! - NuGet version and version-range parsing (`version`)
//! - Target framework parsing and compatibility (`framework`)
//! - Package dependency request/metadata types (`package`)
//! - An arena-backed dependency graph (`graph`)
//! - A two-tier single-flight metadata cache (`cache`)
//! - The registry client boundary (`client`)
//! - Framework-aware dependency group selection (`selector`)
//! - A stack-based, parallel-fetching dependency walker (`walker`)
//! - Post-walk conflict, cycle, and unresolved-package diagnosis
//!   (`conflict`, `cycle`, `diagnose`)
//! - The top-level resolution façade (`resolver`)

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod client;
pub mod conflict;
pub mod cycle;
pub mod diagnose;
pub mod error;
pub mod framework;
pub mod graph;
pub mod package;
pub mod resolver;
pub mod selector;
pub mod version;
pub mod walker;

pub use cache::{CacheConfig, OperationCache, WalkerCache};
pub use client::{InMemoryPackageClient, PackageMetadataClient};
pub use error::ResolveError;
pub use framework::{Framework, FrameworkParseError, get_nearest};
pub use graph::{
    CycleReport, Disposition, DowngradeWarning, EdgeId, GraphArena, GraphEdge, GraphNode,
    NodeId, NodeItem, NuErrorCode, ResolutionResult, ResolvedPackage, UnresolvedPackage,
    VersionConflict,
};
pub use package::{
    AssetFlags, DependencyGroup, DependencyList, PackageDependency, PackageDependencyInfo,
    SuppressParent,
};
pub use resolver::{ParallelResolver, Resolver, ResolverConfig, ResolverStats};
pub use selector::FrameworkSelector;
pub use version::{NuGetVersion, RangeParseError, VersionParseError, VersionRange};
pub use walker::{DependencyWalker, WalkerConfig};

// Re-export commonly used concurrency primitives, mirroring the stack the
// rest of this crate is built on.
pub use ahash::{AHashMap, AHashSet};
pub use dashmap::DashMap;
pub use parking_lot::{Mutex, RwLock};
