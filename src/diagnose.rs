//! Turns unresolved graph nodes into actionable `UnresolvedPackage`
//! diagnostics, in the style of NuGet's NU110x error codes.

use crate::client::PackageMetadataClient;
use crate::framework::Framework;
use crate::graph::{GraphArena, NuErrorCode, UnresolvedPackage};
use ahash::AHashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Copy)]
pub struct UnresolvedDiagnoser;

impl UnresolvedDiagnoser {
    /// For every unresolved node (deduped by id), query every source for
    /// the full set of known versions and classify why none satisfied the
    /// request: `NU1101` (id unknown everywhere) or `NU1102` (versions
    /// exist, none in range).
    pub async fn diagnose<C: PackageMetadataClient>(
        arena: &GraphArena,
        client: &C,
        sources: &[Arc<str>],
        target_framework: &Framework,
    ) -> Vec<UnresolvedPackage> {
        let mut unresolved_ids: AHashMap<Arc<str>, Arc<str>> = AHashMap::new();
        for (_, node) in arena.iter_nodes() {
            if let Some(item) = &node.item {
                if item.is_unresolved {
                    unresolved_ids
                        .entry(item.id.clone())
                        .or_insert_with(|| item.requested_range.clone().unwrap_or_else(|| Arc::from("")));
                }
            }
        }

        let source_list = sources
            .iter()
            .map(std::string::ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        let mut out = Vec::with_capacity(unresolved_ids.len());
        for (id, requested_range) in unresolved_ids {
            let mut available = Vec::new();
            for source in sources {
                if let Ok(infos) = client.get_package_metadata(source, &id).await {
                    available.extend(infos.into_iter().map(|i| i.version));
                }
            }
            available.sort();
            available.dedup();

            let (error_code, message, nearest_version) = if available.is_empty() {
                (
                    NuErrorCode::Nu1101,
                    format!(
                        "Unable to find package '{id}'. No packages exist with this id in source(s): {source_list}"
                    ),
                    None,
                )
            } else {
                let nearest = available.first().cloned();
                let nearest_str = nearest
                    .as_ref()
                    .map(std::string::ToString::to_string)
                    .unwrap_or_default();
                (
                    NuErrorCode::Nu1102,
                    format!(
                        "Unable to resolve dependency '{id} {requested_range}'. Found {} version(s) in source(s) {source_list} [ Nearest version: {nearest_str} ]",
                        available.len()
                    ),
                    nearest,
                )
            };

            out.push(UnresolvedPackage {
                id,
                version_range: requested_range,
                target_framework: Some(Arc::from(target_framework.short_name.as_ref())),
                error_code,
                message,
                sources: sources.to_vec(),
                available_versions: available,
                nearest_version,
            });
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}
