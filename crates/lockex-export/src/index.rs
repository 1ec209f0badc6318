use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use lockex_configuration::DependencyGroupsWithDefaults;
use lockex_lock::{Lock, LockedPackage, PackageId};
use lockex_marker::Condition;
use lockex_normalize::{ExtraName, PackageName};

/// The locked packages of a lock file, grouped by name.
///
/// A name may be locked several times, e.g. at different versions for different Python versions.
/// The candidates for a name are ordered by version, newest first, with ties broken by source.
#[derive(Debug)]
pub struct LockedPackageIndex<'lock> {
    by_name: FxHashMap<&'lock PackageName, Vec<&'lock LockedPackage>>,
    /// The environments each package is installed in under the current group selection.
    applicability: FxHashMap<&'lock PackageId, Condition>,
}

impl<'lock> LockedPackageIndex<'lock> {
    /// Index the packages of a lock file.
    ///
    /// Package markers keyed by group are restricted to the selected groups, and `extra` markers
    /// are resolved against the project extras that were requested.
    pub fn new(
        lock: &'lock Lock,
        groups: &DependencyGroupsWithDefaults,
        extras: &BTreeSet<ExtraName>,
    ) -> Self {
        let mut by_name: FxHashMap<&PackageName, Vec<&LockedPackage>> = FxHashMap::default();
        let mut applicability = FxHashMap::default();

        for package in lock.packages() {
            let condition = package
                .markers()
                .for_groups(|group| groups.contains(group))
                .simplify_extras(extras)
                .and(&package.python_condition());
            applicability.insert(package.id(), condition);
            by_name.entry(package.name()).or_default().push(package);
        }

        for candidates in by_name.values_mut() {
            candidates.sort_by(|a, b| {
                b.version()
                    .cmp(a.version())
                    .then_with(|| a.source().cmp(b.source()))
            });
        }

        Self {
            by_name,
            applicability,
        }
    }

    /// The candidates for a package name, newest first.
    pub fn lookup(&self, name: &PackageName) -> &[&'lock LockedPackage] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// The environments in which the package is installed.
    pub fn applicability(&self, package: &LockedPackage) -> &Condition {
        static NEVER: std::sync::LazyLock<Condition> = std::sync::LazyLock::new(Condition::never);
        self.applicability.get(package.id()).unwrap_or(&NEVER)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use indoc::indoc;

    use lockex_configuration::DependencyGroups;
    use lockex_lock::Lock;

    use super::LockedPackageIndex;

    const LOCK: &str = indoc! {r#"
        [[package]]
        name = "numpy"
        version = "1.24.4"
        python-versions = ">=3.8"
        groups = ["main"]
        markers = 'python_version < "3.9"'

        [[package]]
        name = "numpy"
        version = "1.26.4"
        python-versions = ">=3.9"
        groups = ["main"]
        markers = 'python_version >= "3.9"'

        [[package]]
        name = "pytest"
        version = "8.0.0"
        python-versions = ">=3.8"
        groups = ["dev"]
        markers = {dev = 'sys_platform == "linux"'}

        [metadata]
        lock-version = "2.1"
        python-versions = "^3.8"
        content-hash = "abc"
    "#};

    #[test]
    fn newest_first() {
        let lock = Lock::from_toml(LOCK).unwrap();
        let groups = DependencyGroups::default().with_main();
        let index = LockedPackageIndex::new(&lock, &groups, &BTreeSet::new());

        let versions = index
            .lookup(&"numpy".parse().unwrap())
            .iter()
            .map(|package| package.version().to_string())
            .collect::<Vec<_>>();
        assert_eq!(versions, ["1.26.4", "1.24.4"]);
        assert!(index.lookup(&"missing".parse().unwrap()).is_empty());
    }

    #[test]
    fn applicability() {
        let lock = Lock::from_toml(LOCK).unwrap();
        let groups = DependencyGroups::default().with_main();
        let index = LockedPackageIndex::new(&lock, &groups, &BTreeSet::new());

        let numpy = index.lookup(&"numpy".parse().unwrap());
        assert_eq!(
            index.applicability(numpy[0]).to_string(),
            "python_full_version >= '3.9'"
        );

        // A package whose groups are all deselected keeps the markers of every group.
        let pytest = index.lookup(&"pytest".parse().unwrap());
        assert_eq!(
            index.applicability(pytest[0]).to_string(),
            "python_full_version >= '3.8' and sys_platform == 'linux'"
        );
    }
}
