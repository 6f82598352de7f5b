//! Picks the nearest-compatible dependency group for a target framework.

use crate::framework::{Framework, get_nearest};
use crate::package::{DependencyGroup, PackageDependency};

/// Stateless selection algorithm; kept as a unit struct (mirroring the
/// teacher's convention of giving each pipeline stage its own zero-sized
/// type) so call sites read `FrameworkSelector::select(...)` rather than a
/// bare free function.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameworkSelector;

impl FrameworkSelector {
    /// Select the dependencies applicable to `target` out of `groups`.
    ///
    /// 1. Partition into compatible groups: untargeted, or whose framework
    ///    is compatible with `target`.
    /// 2. No compatible group → `None`.
    /// 3. Exactly one compatible group → its dependencies.
    /// 4. Otherwise, ask `get_nearest` over the compatible *targeted*
    ///    groups' frameworks and return the matching group's dependencies.
    /// 5. If `get_nearest` finds nothing, fall back to the untargeted
    ///    group if present, else `None`.
    #[must_use]
    pub fn select<'a>(
        target: &Framework,
        groups: &'a [DependencyGroup],
    ) -> Option<&'a [PackageDependency]> {
        let untargeted = groups.iter().find(|g| g.target_framework.is_none());

        let compatible_targeted: Vec<&DependencyGroup> = groups
            .iter()
            .filter(|g| {
                g.target_framework
                    .as_ref()
                    .is_some_and(|f| f.is_compatible_with(target))
            })
            .collect();

        let compatible_count = compatible_targeted.len() + usize::from(untargeted.is_some());
        if compatible_count == 0 {
            return None;
        }
        if compatible_count == 1 {
            return compatible_targeted
                .first()
                .or(untargeted.as_ref())
                .map(|g| g.dependencies.as_slice());
        }

        if compatible_targeted.is_empty() {
            return untargeted.map(|g| g.dependencies.as_slice());
        }

        let frameworks: Vec<Framework> = compatible_targeted
            .iter()
            .filter_map(|g| g.target_framework.clone())
            .collect();

        match get_nearest(target, &frameworks) {
            Some(nearest) => compatible_targeted
                .iter()
                .find(|g| {
                    g.target_framework
                        .as_ref()
                        .is_some_and(|f| f.short_name == nearest.short_name)
                })
                .map(|g| g.dependencies.as_slice()),
            None => untargeted.map(|g| g.dependencies.as_slice()),
        }
    }
}
