//! End-to-end resolution scenarios.

use nuget_resolver::{
    Framework, InMemoryPackageClient, NuGetVersion, PackageDependency, PackageDependencyInfo,
    Resolver, ResolverConfig, VersionRange,
};
use std::sync::Arc;

fn dep(id: &str, range: &str) -> PackageDependency {
    PackageDependency::new(id, VersionRange::parse(range).unwrap())
}

fn pkg(id: &str, version: (u16, u16, u16), deps: Vec<PackageDependency>) -> PackageDependencyInfo {
    PackageDependencyInfo::new(id, NuGetVersion::new(version.0, version.1, version.2, 0))
        .with_dependencies(deps)
}

fn resolver(client: Arc<InMemoryPackageClient>) -> Resolver<InMemoryPackageClient> {
    Resolver::new(
        client,
        ResolverConfig::new(Framework::parse("net8.0").unwrap(), vec![Arc::from("nuget.org")]),
    )
}

#[tokio::test]
async fn no_conflict_chain_resolves_every_package() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "App",
        vec![pkg("App", (1, 0, 0), vec![dep("Lib", "[1.0.0]")])],
    );
    client.add_package(
        "nuget.org",
        "Lib",
        vec![pkg("Lib", (1, 0, 0), vec![dep("Core", "[1.0.0]")])],
    );
    client.add_package("nuget.org", "Core", vec![pkg("Core", (1, 0, 0), vec![])]);

    let result = resolver(client).resolve("App", "[1.0.0]").await.unwrap();

    assert!(result.success());
    assert!(result.conflicts.is_empty());
    assert_eq!(result.packages.len(), 3);
    let ids: Vec<&str> = result.packages.iter().map(|p| p.id.as_ref()).collect();
    assert!(ids.contains(&"App"));
    assert!(ids.contains(&"Lib"));
    assert!(ids.contains(&"Core"));
}

#[tokio::test]
async fn equal_depth_conflict_picks_higher_version() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "App",
        vec![pkg(
            "App",
            (1, 0, 0),
            vec![dep("Shared", "[1.0.0]"), dep("Shared", "[2.0.0]")],
        )],
    );
    client.add_package(
        "nuget.org",
        "Shared",
        vec![
            pkg("Shared", (1, 0, 0), vec![]),
            pkg("Shared", (2, 0, 0), vec![]),
        ],
    );

    let result = resolver(client).resolve("App", "[1.0.0]").await.unwrap();

    assert_eq!(result.conflicts.len(), 1);
    let shared = result.packages.iter().find(|p| p.id.as_ref() == "Shared").unwrap();
    assert_eq!(shared.version, NuGetVersion::new(2, 0, 0, 0));
}

#[tokio::test]
async fn nearer_depth_wins_over_farther_higher_version() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "App",
        vec![pkg(
            "App",
            (1, 0, 0),
            vec![dep("Shared", "[1.0.0]"), dep("Mid", "[1.0.0]")],
        )],
    );
    client.add_package(
        "nuget.org",
        "Mid",
        vec![pkg("Mid", (1, 0, 0), vec![dep("Shared", "[5.0.0]")])],
    );
    client.add_package(
        "nuget.org",
        "Shared",
        vec![
            pkg("Shared", (1, 0, 0), vec![]),
            pkg("Shared", (5, 0, 0), vec![]),
        ],
    );

    let result = resolver(client).resolve("App", "[1.0.0]").await.unwrap();

    let shared = result.packages.iter().find(|p| p.id.as_ref() == "Shared").unwrap();
    assert_eq!(shared.version, NuGetVersion::new(1, 0, 0, 0));
    assert_eq!(shared.depth, 1);
}

#[tokio::test]
async fn cycle_is_reported_and_does_not_halt_resolution() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "A",
        vec![pkg("A", (1, 0, 0), vec![dep("B", "[1.0.0]")])],
    );
    client.add_package(
        "nuget.org",
        "B",
        vec![pkg("B", (1, 0, 0), vec![dep("A", "[1.0.0]")])],
    );

    let result = resolver(client).resolve("A", "[1.0.0]").await.unwrap();

    assert!(result.success());
    assert_eq!(result.cycles.len(), 1);
    assert_eq!(result.cycles[0].package_id.as_ref(), "A");
    assert_eq!(result.packages.len(), 2);
    assert!(result.packages.iter().any(|p| p.id.as_ref() == "A"));
    assert!(result.packages.iter().any(|p| p.id.as_ref() == "B"));
}

#[tokio::test]
async fn missing_transitive_dependency_is_unresolved_but_does_not_abort() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "App",
        vec![pkg(
            "App",
            (1, 0, 0),
            vec![dep("Good", "[1.0.0]"), dep("Missing", "[1.0.0]")],
        )],
    );
    client.add_package("nuget.org", "Good", vec![pkg("Good", (1, 0, 0), vec![])]);

    let result = resolver(client).resolve("App", "[1.0.0]").await.unwrap();

    assert!(!result.success());
    assert_eq!(result.unresolved.len(), 1);
    assert_eq!(result.unresolved[0].id.as_ref(), "Missing");
    assert!(result.packages.iter().any(|p| p.id.as_ref() == "Good"));
}

#[tokio::test]
async fn version_range_mismatch_reports_nearest_and_count() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package(
        "nuget.org",
        "App",
        vec![pkg("App", (1, 0, 0), vec![dep("Old", "[10.0.0, )")])],
    );
    client.add_package(
        "nuget.org",
        "Old",
        vec![
            pkg("Old", (1, 0, 0), vec![]),
            pkg("Old", (2, 0, 0), vec![]),
            pkg("Old", (3, 0, 0), vec![]),
        ],
    );

    let result = resolver(client).resolve("App", "[1.0.0]").await.unwrap();

    assert_eq!(result.unresolved.len(), 1);
    let unresolved = &result.unresolved[0];
    assert_eq!(unresolved.error_code, nuget_resolver::NuErrorCode::Nu1102);
    assert_eq!(unresolved.available_versions.len(), 3);
    assert_eq!(unresolved.nearest_version, Some(NuGetVersion::new(1, 0, 0, 0)));
}

#[tokio::test]
async fn resolve_project_excludes_synthetic_root() {
    let client = Arc::new(InMemoryPackageClient::new());
    client.add_package("nuget.org", "A", vec![pkg("A", (1, 0, 0), vec![])]);
    client.add_package("nuget.org", "B", vec![pkg("B", (1, 0, 0), vec![])]);

    let roots = vec![
        ("A".to_string(), "[1.0.0]".to_string()),
        ("B".to_string(), "[1.0.0]".to_string()),
    ];
    let result = resolver(client).resolve_project(&roots).await.unwrap();

    assert!(result.success());
    assert_eq!(result.packages.len(), 2);
    assert!(!result.packages.iter().any(|p| p.id.as_ref() == "__project__"));
}
