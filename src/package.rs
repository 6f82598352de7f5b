//! Package identifiers and dependency requests.
//!
//! This module defines the request-side types the walker consumes:
//! - `PackageDependency`: one edge of a requirement (id + range + flags)
//! - `DependencyGroup`: a target-framework-scoped list of dependencies
//! - `PackageDependencyInfo`: materialized metadata for an id/version pair

use crate::framework::Framework;
use crate::version::{NuGetVersion, VersionRange};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Bitmask of asset kinds a dependency may include or exclude
/// (compile-time references, runtime assets, content files, build props,
/// analyzers, native assets). Mirrors NuGet's `IncludeAssets`/`ExcludeAssets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetFlags(u16);

impl AssetFlags {
    /// No assets.
    pub const NONE: Self = Self(0);
    /// Compile-time reference assemblies.
    pub const COMPILE: Self = Self(1 << 0);
    /// Runtime assemblies.
    pub const RUNTIME: Self = Self(1 << 1);
    /// Content files.
    pub const CONTENT_FILES: Self = Self(1 << 2);
    /// Build-time MSBuild props/targets.
    pub const BUILD: Self = Self(1 << 3);
    /// Source analyzers.
    pub const ANALYZERS: Self = Self(1 << 4);
    /// Native assets.
    pub const NATIVE: Self = Self(1 << 5);
    /// Every asset kind.
    pub const ALL: Self = Self(
        Self::COMPILE.0
            | Self::RUNTIME.0
            | Self::CONTENT_FILES.0
            | Self::BUILD.0
            | Self::ANALYZERS.0
            | Self::NATIVE.0,
    );

    /// Whether `other` is fully contained in this mask.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for AssetFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for AssetFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for AssetFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Which of a dependency's own transitive dependencies are suppressed from
/// the walk. `ALL` is the one value the walker special-cases: the
/// dependency itself is still attached to the graph, but its children are
/// never fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuppressParent(u16);

impl SuppressParent {
    /// Nothing suppressed (default).
    pub const NONE: Self = Self(0);
    /// Every transitive dependency of this package is suppressed.
    pub const ALL: Self = Self(u16::MAX);

    /// Whether this flag suppresses the entire subtree.
    #[must_use]
    pub const fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }
}

impl Default for SuppressParent {
    fn default() -> Self {
        Self::NONE
    }
}

/// A single dependency request: package id, acceptable version range, and
/// the flags that modify how the walker treats it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDependency {
    /// The requested package id (case-insensitive in NuGet; stored as given).
    pub id: Arc<str>,
    /// The acceptable version range, in NuGet range syntax.
    pub version_range: VersionRange,
    /// Optional target-framework constraint on this specific dependency.
    #[serde(default)]
    pub target_framework: Option<Framework>,
    /// Assets to include from the resolved package.
    #[serde(default)]
    pub include_assets: AssetFlags,
    /// Assets to exclude from the resolved package.
    #[serde(default)]
    pub exclude_assets: AssetFlags,
    /// Suppression of this dependency's own transitive dependencies.
    #[serde(default)]
    pub suppress_parent: SuppressParent,
}

impl PackageDependency {
    /// Create a minimal dependency with default asset/suppression flags.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>, version_range: VersionRange) -> Self {
        Self {
            id: id.into(),
            version_range,
            target_framework: None,
            include_assets: AssetFlags::default(),
            exclude_assets: AssetFlags::NONE,
            suppress_parent: SuppressParent::NONE,
        }
    }

    /// Builder: suppress all of this dependency's own transitive dependencies.
    #[must_use]
    pub fn with_suppressed_children(mut self) -> Self {
        self.suppress_parent = SuppressParent::ALL;
        self
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version_range)
    }
}

/// A target-framework-scoped list of dependencies. An empty
/// `target_framework` means "applies to all frameworks".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGroup {
    /// The declared target framework, or `None` for an untargeted group.
    pub target_framework: Option<Framework>,
    /// Dependencies declared under this framework.
    pub dependencies: DependencyList,
}

impl DependencyGroup {
    /// Create an untargeted group (applies to every framework).
    #[must_use]
    pub fn untargeted(dependencies: impl Into<DependencyList>) -> Self {
        Self {
            target_framework: None,
            dependencies: dependencies.into(),
        }
    }

    /// Create a group scoped to a specific framework.
    #[must_use]
    pub fn for_framework(framework: Framework, dependencies: impl Into<DependencyList>) -> Self {
        Self {
            target_framework: Some(framework),
            dependencies: dependencies.into(),
        }
    }
}

/// Materialized package metadata as returned by a `PackageMetadataClient`.
///
/// Exactly one of `dependencies` / `dependency_groups` is meaningful for a
/// given package: most registries publish per-framework dependency groups,
/// but a flat `dependencies` list is accepted as a fallback when the source
/// does not split by framework (the framework selector falls back to it
/// when `dependency_groups` is empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDependencyInfo {
    /// Package id.
    pub id: Arc<str>,
    /// Resolved version, as returned by the source.
    pub version: NuGetVersion,
    /// Flat dependency list, used when no per-framework groups are present.
    #[serde(default)]
    pub dependencies: DependencyList,
    /// Per-framework dependency groups.
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
    /// Set when this info stands in for a package that could not be found.
    #[serde(default)]
    pub is_unresolved: bool,
    /// The literal requested range string, preserved verbatim for unresolved
    /// nodes so the diagnoser can report exactly what was asked for.
    #[serde(default)]
    pub requested_range: Option<Arc<str>>,
}

impl PackageDependencyInfo {
    /// Create resolved metadata with an empty dependency list.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>, version: NuGetVersion) -> Self {
        Self {
            id: id.into(),
            version,
            dependencies: DependencyList::new(),
            dependency_groups: Vec::new(),
            is_unresolved: false,
            requested_range: None,
        }
    }

    /// Create a placeholder for a dependency that could not be satisfied
    /// from any configured source. The requested range string is preserved
    /// verbatim in `requested_range` so later diagnosis can report exactly
    /// what was asked for.
    #[must_use]
    pub fn unresolved(id: impl Into<Arc<str>>, requested_range: impl Into<Arc<str>>) -> Self {
        Self {
            id: id.into(),
            version: NuGetVersion::zero(),
            dependencies: DependencyList::new(),
            dependency_groups: Vec::new(),
            is_unresolved: true,
            requested_range: Some(requested_range.into()),
        }
    }

    /// The canonical cache/dedup key: `"{id}|{version}"`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}|{}", self.id, self.version)
    }

    /// Builder: attach a flat dependency list.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl Into<DependencyList>) -> Self {
        self.dependencies = dependencies.into();
        self
    }

    /// Builder: attach per-framework dependency groups.
    #[must_use]
    pub fn with_dependency_groups(mut self, groups: Vec<DependencyGroup>) -> Self {
        self.dependency_groups = groups;
        self
    }
}

/// A small inline list of dependencies, sized for the common case of a
/// handful of direct requirements per package version.
pub type DependencyList = SmallVec<[PackageDependency; 8]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        let info = PackageDependencyInfo::new("Newtonsoft.Json", NuGetVersion::new(13, 0, 3, 0));
        assert_eq!(info.key(), "Newtonsoft.Json|13.0.3");
    }

    #[test]
    fn suppress_parent_all_detected() {
        let dep = PackageDependency::new("A", VersionRange::parse("[1.0.0, )").unwrap())
            .with_suppressed_children();
        assert!(dep.suppress_parent.is_all());
    }

    #[test]
    fn asset_flags_contains() {
        let mask = AssetFlags::COMPILE | AssetFlags::RUNTIME;
        assert!(mask.contains(AssetFlags::COMPILE));
        assert!(!mask.contains(AssetFlags::BUILD));
    }

    #[test]
    fn unresolved_preserves_requested_range() {
        let info = PackageDependencyInfo::unresolved("Missing.Pkg", "[5.0.0, )");
        assert!(info.is_unresolved);
        assert_eq!(info.requested_range.as_deref(), Some("[5.0.0, )"));
    }
}
