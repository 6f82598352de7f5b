//! NuGet version and version-range handling.
//!
//! This module provides:
//!
//! - `NuGetVersion`: a 4-component version (`major.minor.patch.revision`)
//!   with an optional SemVer2 prerelease label and build metadata, ordered
//!   per NuGet's comparison rules (numeric components first, then
//!   prerelease precedence, with a release always outranking any
//!   prerelease of the same numeric version).
//! - `VersionRange`: NuGet's bracket/parenthesis interval syntax
//!   (`[1.0.0,2.0.0)`, `1.0.0` as a minimum-inclusive floor, `(,2.0.0]`),
//!   backed by `version_ranges::Ranges` for the interval algebra.

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use version_ranges::Ranges;

/// Cache for parsed versions to avoid repeated parsing of the same string
/// (manifests routinely repeat identical version/range strings across many
/// dependents).
static VERSION_CACHE: LazyLock<RwLock<ahash::AHashMap<Arc<str>, NuGetVersion>>> =
    LazyLock::new(|| RwLock::new(ahash::AHashMap::with_capacity(4096)));

/// Cache for parsed ranges.
static RANGE_CACHE: LazyLock<RwLock<ahash::AHashMap<Arc<str>, VersionRange>>> =
    LazyLock::new(|| RwLock::new(ahash::AHashMap::with_capacity(4096)));

/// Maximum cache size before a blanket eviction.
const MAX_CACHE_SIZE: usize = 16384;

fn evict_if_full<K, V>(map: &mut ahash::AHashMap<K, V>) {
    if map.len() > MAX_CACHE_SIZE {
        map.clear();
    }
}

/// A prerelease label component, ordered the way NuGet/SemVer2 orders
/// dot-separated identifiers: numeric identifiers compare numerically and
/// sort before alphanumeric ones, which compare as ASCII strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PreReleaseId {
    Numeric(u64),
    Alphanumeric(Arc<str>),
}

impl PreReleaseId {
    fn parse(segment: &str) -> Self {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = segment.parse::<u64>() {
                return Self::Numeric(n);
            }
        }
        Self::Alphanumeric(Arc::from(segment))
    }
}

impl PartialOrd for PreReleaseId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PreReleaseId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Alphanumeric(a), Self::Alphanumeric(b)) => a.cmp(b),
            // Numeric identifiers always have lower precedence than alphanumeric ones.
            (Self::Numeric(_), Self::Alphanumeric(_)) => Ordering::Less,
            (Self::Alphanumeric(_), Self::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for PreReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Alphanumeric(s) => write!(f, "{s}"),
        }
    }
}

/// A NuGet version: `major.minor.patch[.revision][-prerelease][+metadata]`.
///
/// Comparison ignores build metadata entirely (per SemVer2) and treats a
/// missing `revision` as `0`. The packed `sort_key` lets common
/// comparisons (the overwhelming majority of which are between two stable
/// releases) skip the prerelease path.
#[derive(Debug, Clone)]
pub struct NuGetVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub revision: u16,
    prerelease: SmallPreRelease,
    metadata: Option<Arc<str>>,
    /// `major << 48 | minor << 32 | patch << 16 | revision`, used as the
    /// first sort key so two stable versions never touch prerelease logic.
    sort_key: u64,
}

/// Inline storage for a prerelease label's dot-separated identifiers.
type SmallPreRelease = smallvec::SmallVec<[PreReleaseId; 2]>;

impl NuGetVersion {
    /// Build a version from its numeric components with no prerelease tag.
    #[must_use]
    pub fn new(major: u16, minor: u16, patch: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
            prerelease: SmallPreRelease::new(),
            metadata: None,
            sort_key: pack(major, minor, patch, revision),
        }
    }

    /// `0.0.0.0`, used as a placeholder for unresolved packages.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Whether this version carries a prerelease label.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Parse a version string, using and populating the process-wide cache.
    ///
    /// # Errors
    ///
    /// Returns `VersionParseError` if `s` is not a valid NuGet version.
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let key: Arc<str> = Arc::from(s.trim());
        if let Some(cached) = VERSION_CACHE.read().get(&key) {
            return Ok(cached.clone());
        }
        let parsed = Self::parse_uncached(&key)?;
        let mut cache = VERSION_CACHE.write();
        evict_if_full(&mut cache);
        cache.insert(key, parsed.clone());
        Ok(parsed)
    }

    fn parse_uncached(s: &str) -> Result<Self, VersionParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionParseError(s.to_string()));
        }

        let (core_and_pre, metadata) = match s.split_once('+') {
            Some((head, meta)) => (head, Some(Arc::from(meta))),
            None => (s, None),
        };
        let (core, prerelease_str) = match core_and_pre.split_once('-') {
            Some((head, pre)) => (head, Some(pre)),
            None => (core_and_pre, None),
        };

        let mut parts = core.split('.');
        let major = parts
            .next()
            .ok_or_else(|| VersionParseError(s.to_string()))?
            .parse()
            .map_err(|_| VersionParseError(s.to_string()))?;
        let minor = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| VersionParseError(s.to_string()))?;
        let patch = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|_| VersionParseError(s.to_string()))?;
        let revision = match parts.next() {
            Some(r) => r.parse().map_err(|_| VersionParseError(s.to_string()))?,
            None => 0,
        };
        if parts.next().is_some() {
            return Err(VersionParseError(s.to_string()));
        }

        let prerelease = prerelease_str.map_or_else(SmallPreRelease::new, |pre| {
            pre.split('.').map(PreReleaseId::parse).collect()
        });

        Ok(Self {
            major,
            minor,
            patch,
            revision,
            prerelease,
            metadata,
            sort_key: pack(major, minor, patch, revision),
        })
    }
}

const fn pack(major: u16, minor: u16, patch: u16, revision: u16) -> u64 {
    ((major as u64) << 48) | ((minor as u64) << 32) | ((patch as u64) << 16) | (revision as u64)
}

impl PartialEq for NuGetVersion {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key == other.sort_key && self.prerelease == other.prerelease
    }
}

impl Eq for NuGetVersion {}

impl Hash for NuGetVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key.hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for NuGetVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NuGetVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key.cmp(&other.sort_key).then_with(|| {
            match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
                (true, true) => Ordering::Equal,
                // A release always outranks any prerelease of the same numeric version.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.prerelease.cmp(&other.prerelease),
            }
        })
    }
}

impl fmt::Display for NuGetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision != 0 {
            write!(f, ".{}", self.revision)?;
        }
        if !self.prerelease.is_empty() {
            write!(f, "-")?;
            for (i, id) in self.prerelease.iter().enumerate() {
                if i > 0 {
                    write!(f, ".")?;
                }
                write!(f, "{id}")?;
            }
        }
        if let Some(meta) = &self.metadata {
            write!(f, "+{meta}")?;
        }
        Ok(())
    }
}

impl FromStr for NuGetVersion {
    type Err = VersionParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NuGetVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NuGetVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

/// Error parsing a version string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid NuGet version: {0}")]
pub struct VersionParseError(pub String);

/// A NuGet version range: `[1.0.0,2.0.0)`, a bare `1.0.0` (minimum
/// inclusive, unbounded above), or `(,2.0.0]` (unbounded below).
///
/// Backed by `version_ranges::Ranges`, which gives set-style `intersection`
/// and `contains` operations for free; NuGet-specific bracket syntax is
/// parsed by hand since the underlying crate is syntax-agnostic.
#[derive(Debug, Clone)]
pub struct VersionRange {
    ranges: Ranges<NuGetVersion>,
    source: Arc<str>,
}

impl VersionRange {
    /// Parse NuGet range syntax.
    ///
    /// # Errors
    ///
    /// Returns `RangeParseError` if the bracket syntax is malformed or
    /// either bound fails to parse as a `NuGetVersion`.
    pub fn parse(s: &str) -> Result<Self, RangeParseError> {
        let key: Arc<str> = Arc::from(s.trim());
        if let Some(cached) = RANGE_CACHE.read().get(&key) {
            return Ok(cached.clone());
        }
        let parsed = Self::parse_uncached(&key)?;
        let mut cache = RANGE_CACHE.write();
        evict_if_full(&mut cache);
        cache.insert(key, parsed.clone());
        Ok(parsed)
    }

    fn parse_uncached(raw: &str) -> Result<Self, RangeParseError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(RangeParseError(raw.to_string()));
        }

        let ranges = if s.starts_with('[') || s.starts_with('(') {
            let inner = s;
            let lower_inclusive = s.starts_with('[');
            let upper_inclusive = s.ends_with(']');
            if !(s.ends_with(']') || s.ends_with(')')) {
                return Err(RangeParseError(raw.to_string()));
            }
            let body = &inner[1..inner.len() - 1];
            let mut parts = body.splitn(2, ',');
            let lower = parts.next().unwrap_or("").trim();
            let upper = parts.next();

            match upper {
                None => {
                    // `[1.0.0]`: exact version match.
                    let v = NuGetVersion::parse(lower)
                        .map_err(|_| RangeParseError(raw.to_string()))?;
                    Ranges::singleton(v)
                }
                Some(upper) => {
                    let upper = upper.trim();
                    let lower_bound = if lower.is_empty() {
                        None
                    } else {
                        Some(
                            NuGetVersion::parse(lower)
                                .map_err(|_| RangeParseError(raw.to_string()))?,
                        )
                    };
                    let upper_bound = if upper.is_empty() {
                        None
                    } else {
                        Some(
                            NuGetVersion::parse(upper)
                                .map_err(|_| RangeParseError(raw.to_string()))?,
                        )
                    };
                    bounded_ranges(lower_bound, lower_inclusive, upper_bound, upper_inclusive)
                }
            }
        } else {
            // Bare version: minimum-inclusive, unbounded above.
            let v = NuGetVersion::parse(s).map_err(|_| RangeParseError(raw.to_string()))?;
            Ranges::higher_than(v)
        };

        Ok(Self {
            ranges,
            source: Arc::from(raw),
        })
    }

    /// Whether `version` satisfies this range.
    #[must_use]
    pub fn matches(&self, version: &NuGetVersion) -> bool {
        self.ranges.contains(version)
    }

    /// Intersect two ranges (used when the same package is required twice
    /// with different ranges along one path — not currently exercised by
    /// the walker, which takes nearest-wins instead, but kept for callers
    /// that want strict intersection semantics).
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            ranges: self.ranges.intersection(&other.ranges),
            source: Arc::from(format!("{} && {}", self.source, other.source)),
        }
    }

    /// The original range string as supplied to `parse`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn bounded_ranges(
    lower: Option<NuGetVersion>,
    lower_inclusive: bool,
    upper: Option<NuGetVersion>,
    upper_inclusive: bool,
) -> Ranges<NuGetVersion> {
    let lower_set = match lower {
        None => Ranges::full(),
        Some(l) if lower_inclusive => Ranges::higher_than(l),
        Some(l) => Ranges::strictly_higher_than(l),
    };
    let upper_set = match upper {
        None => Ranges::full(),
        Some(u) if upper_inclusive => Ranges::strictly_lower_than(next_after(&u)),
        Some(u) => Ranges::strictly_lower_than(u),
    };
    lower_set.intersection(&upper_set)
}

/// The version immediately above `v` in the space this resolver cares
/// about, used to turn an inclusive/exclusive bound into a single
/// `strictly_lower_than`/`higher_than` comparison against `Ranges`.
fn next_after(v: &NuGetVersion) -> NuGetVersion {
    let mut next = v.clone();
    next.revision = next.revision.saturating_add(1);
    next.sort_key = pack(next.major, next.minor, next.patch, next.revision);
    next
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

/// Error parsing a version range string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid NuGet version range: {0}")]
pub struct RangeParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    mod version {
        use super::*;

        #[test]
        fn parses_three_and_four_component() {
            let a = NuGetVersion::parse("1.2.3").unwrap();
            assert_eq!((a.major, a.minor, a.patch, a.revision), (1, 2, 3, 0));
            let b = NuGetVersion::parse("1.2.3.4").unwrap();
            assert_eq!((b.major, b.minor, b.patch, b.revision), (1, 2, 3, 4));
        }

        #[test]
        fn release_outranks_prerelease() {
            let stable = NuGetVersion::parse("1.0.0").unwrap();
            let pre = NuGetVersion::parse("1.0.0-beta").unwrap();
            assert!(stable > pre);
        }

        #[test]
        fn prerelease_numeric_precedes_alphanumeric() {
            let a = NuGetVersion::parse("1.0.0-alpha.1").unwrap();
            let b = NuGetVersion::parse("1.0.0-alpha.beta").unwrap();
            assert!(a < b);
        }

        #[test]
        fn prerelease_ordered_lexically_within_kind() {
            let a = NuGetVersion::parse("1.0.0-alpha.1").unwrap();
            let b = NuGetVersion::parse("1.0.0-alpha.2").unwrap();
            assert!(a < b);
        }

        #[test]
        fn metadata_ignored_in_comparison() {
            let a = NuGetVersion::parse("1.0.0+build1").unwrap();
            let b = NuGetVersion::parse("1.0.0+build2").unwrap();
            assert_eq!(a, b);
        }

        #[test]
        fn display_round_trip_three_component() {
            let v = NuGetVersion::parse("2.1.0").unwrap();
            assert_eq!(v.to_string(), "2.1.0");
        }
    }

    mod range {
        use super::*;

        #[test]
        fn bare_version_is_minimum_inclusive_unbounded() {
            let r = VersionRange::parse("1.0.0").unwrap();
            assert!(r.matches(&NuGetVersion::parse("1.0.0").unwrap()));
            assert!(r.matches(&NuGetVersion::parse("99.0.0").unwrap()));
            assert!(!r.matches(&NuGetVersion::parse("0.9.0").unwrap()));
        }

        #[test]
        fn exclusive_upper_bound() {
            let r = VersionRange::parse("[1.0.0,2.0.0)").unwrap();
            assert!(r.matches(&NuGetVersion::parse("1.5.0").unwrap()));
            assert!(!r.matches(&NuGetVersion::parse("2.0.0").unwrap()));
        }

        #[test]
        fn inclusive_upper_bound() {
            let r = VersionRange::parse("[1.0.0,2.0.0]").unwrap();
            assert!(r.matches(&NuGetVersion::parse("2.0.0").unwrap()));
        }

        #[test]
        fn exact_match_single_bracket() {
            let r = VersionRange::parse("[1.0.0]").unwrap();
            assert!(r.matches(&NuGetVersion::parse("1.0.0").unwrap()));
            assert!(!r.matches(&NuGetVersion::parse("1.0.1").unwrap()));
        }

        #[test]
        fn unbounded_below() {
            let r = VersionRange::parse("(,2.0.0]").unwrap();
            assert!(r.matches(&NuGetVersion::parse("0.0.1").unwrap()));
            assert!(!r.matches(&NuGetVersion::parse("2.0.1").unwrap()));
        }

        #[test]
        fn rejects_malformed_syntax() {
            assert!(VersionRange::parse("[1.0.0").is_err());
            assert!(VersionRange::parse("").is_err());
        }
    }
}
