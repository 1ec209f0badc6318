use rustc_hash::FxHashMap;
use tracing::debug;

use lockex_lock::{LockedPackage, PackageId, Requirement};
use lockex_marker::Condition;

use crate::index::LockedPackageIndex;

/// The environments each package has been selected for so far.
pub(crate) type Decisions<'lock> = FxHashMap<&'lock PackageId, Condition>;

/// Pick the locked package that satisfies a requirement.
///
/// Among the candidates whose version matches and whose environments overlap the requirement's,
/// a package that was already selected for an overlapping environment wins. Otherwise, the newest
/// candidate is chosen.
///
/// Returns `None` if no locked package matches.
pub(crate) fn select<'lock>(
    requirement: &Requirement,
    index: &LockedPackageIndex<'lock>,
    decisions: &Decisions<'lock>,
) -> Option<&'lock LockedPackage> {
    let mut compatible = index
        .lookup(&requirement.name)
        .iter()
        .copied()
        .filter(|package| requirement.constraint.allows(package.version()))
        .filter(|package| !index.applicability(package).is_disjoint(&requirement.condition))
        .collect::<Vec<_>>();

    // Direct references only match packages locked from a direct source, preferring the one
    // they point at.
    if let Some(source) = &requirement.source {
        compatible.retain(|package| package.source().is_direct());
        compatible.sort_by_key(|package| !package.source().satisfies(source));
    }

    if let Some(previous) = compatible.iter().copied().find(|package| {
        decisions
            .get(package.id())
            .is_some_and(|decided| !decided.is_disjoint(&requirement.condition))
    }) {
        return Some(previous);
    }

    let first = compatible.first().copied()?;
    if let Some((other, _)) = decisions.iter().find(|(id, decided)| {
        id.name == requirement.name
            && id.version != *first.version()
            && !decided.is_disjoint(&requirement.condition)
    }) {
        debug!(
            "{other} is already selected where `{requirement}` applies; also selecting {}",
            first.id()
        );
    }
    Some(first)
}
