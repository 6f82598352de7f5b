//! The registry-facing collaborator interface.
//!
//! `PackageMetadataClient` is the one boundary the walker crosses to reach
//! the outside world; everything else (HTTP, on-disk cache, archive
//! reading) lives outside this crate. `InMemoryPackageClient` is the
//! reference test double used across unit tests and benchmarks.

use crate::error::ResolveError;
use crate::package::PackageDependencyInfo;
use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns every known version of `id` from `source`. An empty `Ok(vec![])`
/// means "id unknown at this source"; `Err` indicates a transport failure.
#[async_trait]
pub trait PackageMetadataClient: Send + Sync {
    async fn get_package_metadata(
        &self,
        source: &str,
        id: &str,
    ) -> Result<Vec<PackageDependencyInfo>, ResolveError>;
}

/// An in-memory client keyed by `(source, id)`, for tests and benchmarks.
///
/// Counts calls per `(source, id)` so tests can assert cache warm-up
/// behavior ("a second resolve makes no additional metadata calls").
#[derive(Default)]
pub struct InMemoryPackageClient {
    packages: Mutex<AHashMap<(Arc<str>, Arc<str>), Vec<PackageDependencyInfo>>>,
    call_counts: Mutex<AHashMap<(Arc<str>, Arc<str>), usize>>,
    total_calls: AtomicUsize,
}

impl InMemoryPackageClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every version of a package as available from `source`.
    pub fn add_package(
        &self,
        source: impl Into<Arc<str>>,
        id: impl Into<Arc<str>>,
        versions: Vec<PackageDependencyInfo>,
    ) {
        self.packages
            .lock()
            .insert((source.into(), id.into()), versions);
    }

    /// Number of times `get_package_metadata` was called for `(source, id)`.
    #[must_use]
    pub fn call_count(&self, source: &str, id: &str) -> usize {
        self.call_counts
            .lock()
            .get(&(Arc::from(source), Arc::from(id)))
            .copied()
            .unwrap_or(0)
    }

    /// Total calls across every `(source, id)` pair.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageMetadataClient for InMemoryPackageClient {
    async fn get_package_metadata(
        &self,
        source: &str,
        id: &str,
    ) -> Result<Vec<PackageDependencyInfo>, ResolveError> {
        let key = (Arc::<str>::from(source), Arc::<str>::from(id));
        *self.call_counts.lock().entry(key.clone()).or_insert(0) += 1;
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.packages.lock().get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::NuGetVersion;

    #[tokio::test]
    async fn unknown_package_returns_empty() {
        let client = InMemoryPackageClient::new();
        let result = client.get_package_metadata("nuget.org", "Missing").await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counts_calls_per_source_and_id() {
        let client = InMemoryPackageClient::new();
        client.add_package(
            "nuget.org",
            "A",
            vec![PackageDependencyInfo::new("A", NuGetVersion::new(1, 0, 0, 0))],
        );
        client.get_package_metadata("nuget.org", "A").await.unwrap();
        client.get_package_metadata("nuget.org", "A").await.unwrap();
        assert_eq!(client.call_count("nuget.org", "A"), 2);
        assert_eq!(client.total_calls(), 2);
    }
}
