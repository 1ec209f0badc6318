use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::trace;

use lockex_configuration::{DependencyGroupsWithDefaults, ExtrasSpecification};
use lockex_lock::{ProjectManifest, Requirement};
use lockex_marker::Condition;
use lockex_normalize::{ExtraName, GroupName};

use crate::ExportError;

/// Selects the project's dependencies to export, based on the requested groups and extras.
#[derive(Debug)]
pub struct Selector<'a> {
    manifest: &'a ProjectManifest,
    groups: &'a DependencyGroupsWithDefaults,
    extras: &'a ExtrasSpecification,
}

impl<'a> Selector<'a> {
    pub fn new(
        manifest: &'a ProjectManifest,
        groups: &'a DependencyGroupsWithDefaults,
        extras: &'a ExtrasSpecification,
    ) -> Self {
        Self {
            manifest,
            groups,
            extras,
        }
    }

    /// The project extras to activate.
    ///
    /// Fails if an extra was requested that the project doesn't declare.
    pub fn active_extras(&self) -> Result<BTreeSet<ExtraName>, ExportError> {
        let declared = self.manifest.extras();

        let unknown = self
            .extras
            .explicit_names()
            .filter(|extra| !declared.contains_key(*extra))
            .cloned()
            .sorted()
            .dedup()
            .collect::<Vec<_>>();
        if !unknown.is_empty() {
            return Err(ExportError::InvalidExtra(unknown));
        }

        Ok(self
            .extras
            .extra_names(declared.keys())
            .cloned()
            .collect())
    }

    /// The groups to export, `main` first.
    ///
    /// Fails if a group was named on the command line that the project doesn't declare.
    pub fn active_groups(&self) -> Result<Vec<GroupName>, ExportError> {
        let declared = self.manifest.group_names().collect::<BTreeSet<_>>();

        let missing = self
            .groups
            .explicit_names()
            .filter(|group| !declared.contains(group))
            .cloned()
            .sorted()
            .dedup()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(ExportError::MissingGroups(missing));
        }

        Ok(self
            .groups
            .group_names(self.manifest.group_names())
            .cloned()
            .sorted_by_key(|group| !group.is_main())
            .collect())
    }

    /// The root requirements of the walk.
    ///
    /// Optional dependencies are only included if one of the active extras lists them. Every
    /// requirement is restricted to the Python versions the project supports.
    pub fn roots(&self) -> Result<Vec<Requirement>, ExportError> {
        let extras = self.active_extras()?;
        let groups = self.active_groups()?;

        let python = Condition::python(self.manifest.python_constraint().ranges().clone());

        let mut roots = Vec::new();
        for group in &groups {
            for requirement in self.manifest.dependencies(group) {
                if requirement.optional && !self.is_activated(requirement, &extras) {
                    trace!("Skipping optional dependency `{requirement}` of group `{group}`");
                    continue;
                }
                let condition = requirement.condition.simplify_extras(&extras).and(&python);
                if condition.is_false() {
                    trace!("Skipping `{requirement}`: no supported Python version");
                    continue;
                }
                roots.push(requirement.clone().with_condition(condition));
            }
        }
        Ok(roots)
    }

    fn is_activated(&self, requirement: &Requirement, extras: &BTreeSet<ExtraName>) -> bool {
        self.manifest
            .extras()
            .iter()
            .filter(|(extra, _)| extras.contains(*extra))
            .any(|(_, names)| names.contains(&requirement.name))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use indoc::indoc;

    use lockex_configuration::{DependencyGroups, ExtrasSpecification};
    use lockex_lock::ProjectManifest;
    use lockex_normalize::{ExtraName, GroupName};

    use super::Selector;

    const PYPROJECT: &str = indoc! {r#"
        [tool.poetry]
        name = "project"
        version = "0.1.0"

        [tool.poetry.dependencies]
        python = "^3.8"
        requests = "^2.31"
        pysocks = {version = "^1.7", optional = true}
        uvloop = {version = "*", optional = true, markers = "sys_platform != 'win32'"}

        [tool.poetry.extras]
        feature-a = ["pysocks"]
        feature-b = ["uvloop"]

        [tool.poetry.group.test.dependencies]
        pytest = "^8"
    "#};

    fn extra(name: &str) -> ExtraName {
        ExtraName::from_str(name).unwrap()
    }

    fn group(name: &str) -> GroupName {
        GroupName::from_str(name).unwrap()
    }

    fn roots(groups: &DependencyGroups, extras: &ExtrasSpecification) -> Vec<String> {
        let manifest = ProjectManifest::from_toml(PYPROJECT).unwrap();
        let groups = groups.with_main();
        Selector::new(&manifest, &groups, extras)
            .roots()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn main_only() {
        insta::assert_debug_snapshot!(roots(&DependencyGroups::default(), &ExtrasSpecification::default()), @r#"
        [
            "requests (^2.31) ; python_version >= \"3.8\" and python_version < \"4.0\"",
        ]
        "#);
    }

    #[test]
    fn extras_and_groups() {
        let groups = DependencyGroups::from_group(group("test"));
        let extras = ExtrasSpecification::from_extras(vec![extra("feature-b")]);
        insta::assert_debug_snapshot!(roots(&groups, &extras), @r#"
        [
            "requests (^2.31) ; python_version >= \"3.8\" and python_version < \"4.0\"",
            "uvloop ; python_version >= \"3.8\" and python_version < \"4.0\" and sys_platform != \"win32\"",
            "pytest (^8) ; python_version >= \"3.8\" and python_version < \"4.0\"",
        ]
        "#);

        let all = roots(
            &DependencyGroups::default(),
            &ExtrasSpecification::from_all_extras(),
        );
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn invalid_extra() {
        let manifest = ProjectManifest::from_toml(PYPROJECT).unwrap();
        let groups = DependencyGroups::default().with_main();
        let extras = ExtrasSpecification::from_extras(vec![extra("missing")]);
        let err = Selector::new(&manifest, &groups, &extras)
            .roots()
            .unwrap_err();
        insta::assert_snapshot!(err, @"Extra [missing] is not specified.");

        let extras = ExtrasSpecification::from_extras(vec![
            extra("zzz"),
            extra("feature-a"),
            extra("aaa"),
        ]);
        let err = Selector::new(&manifest, &groups, &extras)
            .active_extras()
            .unwrap_err();
        insta::assert_snapshot!(err, @"Extra [aaa, zzz] is not specified.");
    }

    #[test]
    fn missing_group() {
        let manifest = ProjectManifest::from_toml(PYPROJECT).unwrap();
        let groups = DependencyGroups::from_args(
            false,
            vec![group("docs")],
            vec![group("lint")],
            vec![],
            false,
        )
        .with_main();
        let err = Selector::new(&manifest, &groups, &ExtrasSpecification::default())
            .roots()
            .unwrap_err();
        insta::assert_snapshot!(err, @"Group(s) not found: docs, lint");
    }

    #[test]
    fn only_group() {
        let manifest = ProjectManifest::from_toml(PYPROJECT).unwrap();
        let groups =
            DependencyGroups::from_args(false, vec![], vec![], vec![group("test")], false)
                .with_main();
        let extras = ExtrasSpecification::default();
        let selector = Selector::new(&manifest, &groups, &extras);
        assert_eq!(selector.active_groups().unwrap(), [group("test")]);
        assert_eq!(selector.roots().unwrap().len(), 1);
    }
}
