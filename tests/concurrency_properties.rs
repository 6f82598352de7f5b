//! Concurrency and cache properties that must hold regardless of which
//! scenario is being resolved.

use async_trait::async_trait;
use nuget_resolver::{
    Framework, InMemoryPackageClient, NuGetVersion, PackageDependency, PackageDependencyInfo,
    ParallelResolver, ResolveError, Resolver, ResolverConfig, VersionRange,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn dep(id: &str, range: &str) -> PackageDependency {
    PackageDependency::new(id, VersionRange::parse(range).unwrap())
}

fn pkg(id: &str, deps: Vec<PackageDependency>) -> PackageDependencyInfo {
    PackageDependencyInfo::new(id, NuGetVersion::new(1, 0, 0, 0)).with_dependencies(deps)
}

fn resolver(client: Arc<InMemoryPackageClient>) -> Resolver<InMemoryPackageClient> {
    Resolver::new(
        client,
        ResolverConfig::new(Framework::parse("net8.0").unwrap(), vec![Arc::from("nuget.org")]),
    )
}

#[tokio::test]
async fn cache_warm_second_resolve_makes_no_additional_calls() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "App",
        vec![pkg("App", vec![dep("Lib", "[1.0.0]")])],
    );
    client.add_package("nuget.org", "Lib", vec![pkg("Lib", vec![])]);

    let r = resolver(client.clone());
    r.resolve("App", "[1.0.0]").await.unwrap();
    let calls_after_first = client.total_calls();

    r.resolve("App", "[1.0.0]").await.unwrap();
    assert_eq!(client.total_calls(), calls_after_first);
}

#[tokio::test]
async fn parallel_resolver_never_exceeds_configured_workers() {
    let client = Arc::new(InMemoryPackageClient::new());
    for i in 0..10 {
        client.add_package("nuget.org", format!("Pkg{i}"), vec![pkg(&format!("Pkg{i}"), vec![])]);
    }
    let resolver = Arc::new(resolver(client));
    let parallel = ParallelResolver::new(resolver, 3);

    let packages: Vec<(String, String)> = (0..10)
        .map(|i| (format!("Pkg{i}"), "[1.0.0]".to_string()))
        .collect();
    let results = parallel.resolve_batch(&packages, 10).await;

    assert!(results.iter().all(Result::is_ok));
    assert!(parallel.high_water_mark() <= 3);
}

/// A client whose fetch never completes until told to, for exercising
/// cancellation without racing on real time.
struct HangingClient {
    gate: tokio::sync::Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl nuget_resolver::PackageMetadataClient for HangingClient {
    async fn get_package_metadata(
        &self,
        _source: &str,
        _id: &str,
    ) -> Result<Vec<PackageDependencyInfo>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(vec![pkg("Hangs", vec![])])
    }
}

#[tokio::test]
async fn cancellation_aborts_and_returns_cancelled_error() {
    let client = Arc::new(HangingClient {
        gate: tokio::sync::Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let resolver = Resolver::new(
        client,
        ResolverConfig::new(Framework::parse("net8.0").unwrap(), vec![Arc::from("nuget.org")]),
    );
    let token = CancellationToken::new();
    let cancel_token = token.clone();

    let handle = tokio::spawn(async move { resolver.resolve_cancellable("Hangs", "[1.0.0]", &token).await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel_token.cancel();

    let result = handle.await.unwrap();
    match result {
        Err(e) => assert!(matches!(*e, ResolveError::Cancelled)),
        Ok(_) => panic!("expected resolution to be cancelled"),
    }
}
