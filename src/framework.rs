//! Target framework identifiers and compatibility.
//!
//! A minimal but real implementation of NuGet's framework model: enough to
//! parse short folder names (`net8.0`, `netstandard2.0`, `net472`), decide
//! whether one framework can consume assets built for another, and pick the
//! nearest compatible framework group out of several candidates.
//!
//! This module is deliberately small: the walker only needs compatibility
//! and nearest-match decisions, not the full asset-selection pipeline a
//! package installer would also need.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A target framework moniker, e.g. `net8.0`, `netstandard2.0`, `net472`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Framework {
    /// Framework family identifier (`.NETCoreApp`, `.NETStandard`, `.NETFramework`).
    pub identifier: Arc<str>,
    /// Version, packed as `(major, minor, patch)`.
    pub version: (u16, u16, u16),
    /// The original short folder name, preserved for display and for
    /// exact-match comparisons against manifests that echo it verbatim.
    pub short_name: Arc<str>,
}

impl Framework {
    /// Parse a short folder name into a `Framework`.
    ///
    /// # Errors
    ///
    /// Returns `FrameworkParseError` if `s` does not match a recognized
    /// moniker family.
    pub fn parse(s: &str) -> Result<Self, FrameworkParseError> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("netstandard") {
            let version = parse_dotted_version(rest).ok_or_else(|| err(s))?;
            return Ok(Self {
                identifier: Arc::from(".NETStandard"),
                version,
                short_name: Arc::from(s),
            });
        }
        if let Some(rest) = s.strip_prefix("netcoreapp") {
            let version = parse_dotted_version(rest).ok_or_else(|| err(s))?;
            return Ok(Self {
                identifier: Arc::from(".NETCoreApp"),
                version,
                short_name: Arc::from(s),
            });
        }
        if let Some(rest) = s.strip_prefix("net") {
            // Disambiguate `net8.0` (.NETCoreApp, dotted) from `net472`
            // (.NETFramework, undotted three-digit).
            if rest.contains('.') {
                let version = parse_dotted_version(rest).ok_or_else(|| err(s))?;
                return Ok(Self {
                    identifier: Arc::from(".NETCoreApp"),
                    version,
                    short_name: Arc::from(s),
                });
            }
            let version = parse_compact_version(rest).ok_or_else(|| err(s))?;
            return Ok(Self {
                identifier: Arc::from(".NETFramework"),
                version,
                short_name: Arc::from(s),
            });
        }
        Err(err(s))
    }

    /// Whether a package built for `self` can be consumed by a project
    /// targeting `project`. `.NETStandard` is compatible with any newer
    /// `.NETCoreApp`/`.NETStandard` of at least its own version; a moniker
    /// is always compatible with itself at an equal-or-higher version.
    #[must_use]
    pub fn is_compatible_with(&self, project: &Self) -> bool {
        if self.identifier == project.identifier {
            return self.version <= project.version;
        }
        if self.identifier.as_ref() == ".NETStandard" {
            return matches!(project.identifier.as_ref(), ".NETCoreApp" | ".NETStandard")
                && compatible_netstandard_version(self.version, project.identifier.as_ref());
        }
        false
    }
}

/// `.NETStandard` versions up to 2.1 project onto `.NETCoreApp` 3.0+; this
/// is a simplification of NuGet's full compatibility table but covers the
/// common families this resolver is exercised against.
fn compatible_netstandard_version(standard_version: (u16, u16, u16), target_family: &str) -> bool {
    match target_family {
        ".NETStandard" => true,
        ".NETCoreApp" => standard_version <= (2, 1, 0),
        _ => false,
    }
}

fn parse_dotted_version(s: &str) -> Option<(u16, u16, u16)> {
    let mut parts = s.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor, patch))
}

/// Parse a compact `.NETFramework` version like `472` into `(4, 7, 2)`.
fn parse_compact_version(s: &str) -> Option<(u16, u16, u16)> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: Vec<u16> = s.bytes().map(|b| u16::from(b - b'0')).collect();
    match digits.as_slice() {
        [major] => Some((*major, 0, 0)),
        [major, minor] => Some((*major, *minor, 0)),
        [major, minor, patch] => Some((*major, *minor, *patch)),
        _ => None,
    }
}

fn err(s: &str) -> FrameworkParseError {
    FrameworkParseError(s.to_string())
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name)
    }
}

/// Error parsing a framework short folder name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unrecognized target framework: {0}")]
pub struct FrameworkParseError(pub String);

/// Pick the nearest compatible framework from `candidates` to `project`.
///
/// "Nearest" means: among candidates compatible with `project`, the one
/// with the highest version in the same identifier family if one exists,
/// otherwise the highest-version compatible candidate from any family.
/// Returns `None` if nothing in `candidates` is compatible.
#[must_use]
pub fn get_nearest<'a>(project: &Framework, candidates: &'a [Framework]) -> Option<&'a Framework> {
    let compatible: Vec<&Framework> = candidates
        .iter()
        .filter(|c| c.is_compatible_with(project))
        .collect();

    compatible
        .iter()
        .copied()
        .max_by(|a, b| {
            let same_family_a = a.identifier == project.identifier;
            let same_family_b = b.identifier == project.identifier;
            same_family_a
                .cmp(&same_family_b)
                .then_with(|| a.version.cmp(&b.version))
                .then(Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_net_core_app() {
        let f = Framework::parse("net8.0").unwrap();
        assert_eq!(f.identifier.as_ref(), ".NETCoreApp");
        assert_eq!(f.version, (8, 0, 0));
    }

    #[test]
    fn parses_netstandard() {
        let f = Framework::parse("netstandard2.1").unwrap();
        assert_eq!(f.identifier.as_ref(), ".NETStandard");
        assert_eq!(f.version, (2, 1, 0));
    }

    #[test]
    fn parses_net_framework_compact() {
        let f = Framework::parse("net472").unwrap();
        assert_eq!(f.identifier.as_ref(), ".NETFramework");
        assert_eq!(f.version, (4, 7, 2));
    }

    #[test]
    fn netstandard_compatible_with_higher_netcoreapp() {
        let lib = Framework::parse("netstandard2.0").unwrap();
        let app = Framework::parse("net8.0").unwrap();
        assert!(lib.is_compatible_with(&app));
    }

    #[test]
    fn net_framework_not_compatible_with_netcoreapp() {
        let lib = Framework::parse("net472").unwrap();
        let app = Framework::parse("net8.0").unwrap();
        assert!(!lib.is_compatible_with(&app));
    }

    #[test]
    fn nearest_picks_highest_same_family() {
        let project = Framework::parse("net8.0").unwrap();
        let candidates = vec![
            Framework::parse("netstandard2.0").unwrap(),
            Framework::parse("net6.0").unwrap(),
            Framework::parse("net7.0").unwrap(),
        ];
        let nearest = get_nearest(&project, &candidates).unwrap();
        assert_eq!(nearest.short_name.as_ref(), "net7.0");
    }

    #[test]
    fn nearest_falls_back_to_netstandard_when_no_same_family() {
        let project = Framework::parse("net8.0").unwrap();
        let candidates = vec![Framework::parse("netstandard2.0").unwrap()];
        let nearest = get_nearest(&project, &candidates).unwrap();
        assert_eq!(nearest.short_name.as_ref(), "netstandard2.0");
    }

    #[test]
    fn nearest_none_when_incompatible() {
        let project = Framework::parse("netstandard2.0").unwrap();
        let candidates = vec![Framework::parse("net8.0").unwrap()];
        assert!(get_nearest(&project, &candidates).is_none());
    }
}
