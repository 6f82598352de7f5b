//! Error types for dependency resolution.
//!
//! Each fatal error maps to a `ResolveError` variant with a clear message.
//! Non-fatal conditions (missing packages, version mismatches, cycles) are
//! never represented here — they surface as data in a `ResolutionResult`
//! instead, per the resolver's recovery model.

use std::sync::Arc;
use thiserror::Error;

/// Fatal errors propagated out of `Resolver::resolve`.
///
/// These are the only conditions that abort a walk outright: everything
/// else (missing packages, conflicting versions, cycles) is recoverable and
/// is reported through `ResolutionResult` instead of `Err`.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The metadata client returned a transport-level failure for a
    /// non-"not found" request.
    #[error("repository error fetching '{id}' from '{source}': {message}")]
    Repository {
        /// The package that was being fetched.
        id: Arc<str>,
        /// The source that failed.
        source: Arc<str>,
        /// Underlying error message.
        message: Arc<str>,
    },

    /// A version range string could not be parsed at all. Fail-fast: this
    /// can only happen for the root request (all other ranges are carried
    /// verbatim from already-parsed metadata).
    #[error("invalid version range '{range}' for package '{id}'")]
    InvalidRange {
        /// The package the bad range was attached to.
        id: Arc<str>,
        /// The unparsable range string.
        range: Arc<str>,
    },

    /// The resolution's context was cancelled before it completed.
    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Wrap a shared clone of this error for storage in the operation cache,
    /// where every waiter on a key observes the same fetch failure.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
