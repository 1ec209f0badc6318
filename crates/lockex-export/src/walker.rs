use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use lockex_lock::{LockedPackage, PackageId, Requirement};
use lockex_marker::Condition;
use lockex_normalize::ExtraName;

use crate::DependencyWalkError;
use crate::candidate::{self, Decisions};
use crate::index::LockedPackageIndex;

/// A locked package reached by the walk.
#[derive(Debug, Clone)]
pub struct ResolvedDependency<'lock> {
    pub package: &'lock LockedPackage,
    /// The extras requested on the package.
    pub extras: BTreeSet<ExtraName>,
    /// The environments in which the package is needed.
    pub condition: Condition,
}

/// The packages to install, each with the environments it is installed in.
#[derive(Debug, Default)]
pub struct Resolution<'lock> {
    dependencies: BTreeMap<(&'lock PackageId, BTreeSet<ExtraName>), ResolvedDependency<'lock>>,
}

impl<'lock> Resolution<'lock> {
    /// The resolved packages, ordered by name, version and source, then by extras.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedDependency<'lock>> {
        self.dependencies.values()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Merge the entries of a package that was requested with different extras.
    ///
    /// The merged entry carries the union of the extras and of the conditions.
    #[must_use]
    pub fn merge_extras(&self) -> Self {
        let mut dependencies: BTreeMap<_, ResolvedDependency<'lock>> = BTreeMap::new();
        for dependency in self.iter() {
            match dependencies.entry((dependency.package.id(), BTreeSet::new())) {
                Entry::Vacant(entry) => {
                    entry.insert(dependency.clone());
                }
                Entry::Occupied(mut entry) => {
                    let merged = entry.get_mut();
                    merged.condition = merged.condition.or(&dependency.condition);
                    merged.extras.extend(dependency.extras.iter().cloned());
                }
            }
        }
        Self { dependencies }
    }
}

/// A requirement waiting to be resolved.
#[derive(Debug)]
struct Pending {
    requirement: Requirement,
    /// Whether the requirement covers the environments a previously chosen package didn't.
    residual: bool,
}

impl Pending {
    /// Requirements with a version constraint, then those limited to some environments, come
    /// before unconstrained ones.
    fn priority(&self) -> (bool, bool, String, bool) {
        (
            self.requirement.constraint.is_any(),
            self.requirement.condition.is_true(),
            self.requirement.to_string(),
            self.residual,
        )
    }
}

/// Walk the lock from the root requirements, collecting every package that is needed in some
/// environment.
///
/// Each requirement is resolved against the index. The requirement's environments that the chosen
/// package isn't installable in are queued again, so that another locked version of the package
/// can claim them. A package's dependencies inherit the environments of the edge that reached it.
///
/// Requirements are processed breadth-first, one depth at a time. Within a depth, narrower
/// requirements go first and ties are broken by their rendering, so the packages chosen for a
/// name don't depend on the order in which the roots or dependencies were listed.
pub fn walk<'lock>(
    index: &LockedPackageIndex<'lock>,
    roots: impl IntoIterator<Item = Requirement>,
) -> Result<Resolution<'lock>, DependencyWalkError> {
    let mut level = roots
        .into_iter()
        .map(|requirement| Pending {
            requirement,
            residual: false,
        })
        .collect::<Vec<_>>();
    let mut visited = FxHashSet::default();
    let mut decisions = Decisions::default();
    let mut resolution = Resolution::default();

    while !level.is_empty() {
        level.sort_by_cached_key(Pending::priority);
        let mut next = Vec::new();

        for Pending {
            requirement,
            residual,
        } in level
        {
            if !visited.insert(requirement.clone()) {
                continue;
            }

            let Some(package) = candidate::select(&requirement, index, &decisions) else {
                if residual {
                    debug!("No locked package satisfies `{requirement}`; skipping");
                    continue;
                }
                return Err(DependencyWalkError::Unresolvable {
                    name: requirement.name.clone(),
                    constraint: requirement.constraint.to_string(),
                });
            };

            let applicability = index.applicability(package);
            let edge = requirement.condition.and(applicability);
            let uncovered = requirement.condition.and(&applicability.negate());
            if !uncovered.is_false() {
                trace!(
                    "`{}` is not installable for all of `{requirement}`",
                    package.id()
                );
                next.push(Pending {
                    requirement: requirement.clone().with_condition(uncovered),
                    residual: true,
                });
            }
            if edge.is_false() {
                continue;
            }

            debug!("Selected {} for `{requirement}`", package.id());

            decisions
                .entry(package.id())
                .and_modify(|decided| *decided = decided.or(&edge))
                .or_insert_with(|| edge.clone());

            match resolution
                .dependencies
                .entry((package.id(), requirement.extras.clone()))
            {
                Entry::Vacant(entry) => {
                    entry.insert(ResolvedDependency {
                        package,
                        extras: requirement.extras.clone(),
                        condition: edge.clone(),
                    });
                }
                Entry::Occupied(mut entry) => {
                    let resolved = entry.get_mut();
                    resolved.condition = resolved.condition.or(&edge);
                }
            }

            let parent = edge.without_extras();
            for dependency in package.dependencies() {
                if dependency.optional && !activates(package, &requirement.extras, dependency) {
                    trace!(
                        "Skipping optional dependency `{dependency}` of {}",
                        package.id()
                    );
                    continue;
                }

                let condition = dependency
                    .condition
                    .simplify_extras(&requirement.extras)
                    .and(&parent);
                if condition.is_false() {
                    trace!(
                        "Skipping dependency `{dependency}` of {}: no environment left",
                        package.id()
                    );
                    continue;
                }

                next.push(Pending {
                    requirement: dependency.clone().with_condition(condition),
                    residual: false,
                });
            }
        }

        level = next;
    }

    Ok(resolution)
}

/// Whether one of the requested extras of a package activates an optional dependency.
fn activates(
    package: &LockedPackage,
    extras: &BTreeSet<ExtraName>,
    dependency: &Requirement,
) -> bool {
    extras.iter().any(|extra| {
        package
            .extras()
            .get(extra)
            .is_some_and(|names| names.contains(&dependency.name))
    })
}
