use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use url::Url;

use lockex_normalize::{DEV_DEPENDENCIES, ExtraName, GroupName, MAIN_GROUP, PackageName};

use crate::requirement::DependencyWire;
use crate::{ConstraintError, Requirement, RequirementError, VersionConstraint};

/// The parts of a `pyproject.toml` that determine what gets exported.
///
/// Both the `[tool.poetry]` table and the PEP 621 `[project]` table are understood. When the
/// `[project]` table declares `dependencies`, they replace `[tool.poetry.dependencies]`.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    name: Option<PackageName>,
    python_constraint: VersionConstraint,
    /// The dependencies of each group, always including `main`.
    groups: BTreeMap<GroupName, Vec<Requirement>>,
    /// The project's extras, mapped to the names of the optional dependencies they activate.
    extras: BTreeMap<ExtraName, Vec<PackageName>>,
    sources: Vec<PackageSource>,
}

impl ProjectManifest {
    /// Read a `pyproject.toml` from disk.
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let contents = fs_err::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse the contents of a `pyproject.toml`.
    pub fn from_toml(contents: &str) -> Result<Self, ManifestError> {
        let wire: PyProjectWire = toml::from_str(contents)?;
        Self::try_from(wire)
    }

    pub fn name(&self) -> Option<&PackageName> {
        self.name.as_ref()
    }

    /// The Python versions the project supports.
    pub fn python_constraint(&self) -> &VersionConstraint {
        &self.python_constraint
    }

    /// The dependencies declared in a group, or an empty slice if the group doesn't exist.
    pub fn dependencies(&self, group: &GroupName) -> &[Requirement] {
        self.groups.get(group).map_or(&[], Vec::as_slice)
    }

    /// The declared dependency groups, including `main`.
    pub fn group_names(&self) -> impl Iterator<Item = &GroupName> {
        self.groups.keys()
    }

    pub fn extras(&self) -> &BTreeMap<ExtraName, Vec<PackageName>> {
        &self.extras
    }

    /// The package sources, in the order they were declared.
    pub fn sources(&self) -> &[PackageSource] {
        &self.sources
    }
}

/// A package index configured under `[[tool.poetry.source]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub name: String,
    /// The index URL; absent for the PyPI source.
    pub url: Option<Url>,
    pub priority: SourcePriority,
}

impl PackageSource {
    /// Returns `true` for the source that stands in for PyPI.
    pub fn is_pypi(&self) -> bool {
        self.name.eq_ignore_ascii_case("pypi")
    }
}

/// The priority of a package source, from highest to lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePriority {
    Default,
    #[default]
    Primary,
    Secondary,
    Supplemental,
    Explicit,
}

impl Display for SourcePriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Supplemental => "supplemental",
            Self::Explicit => "explicit",
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct PyProjectWire {
    project: Option<ProjectWire>,
    #[serde(default)]
    tool: ToolWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ProjectWire {
    name: Option<PackageName>,
    requires_python: Option<String>,
    dependencies: Option<Vec<String>>,
    #[serde(default)]
    optional_dependencies: BTreeMap<ExtraName, Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolWire {
    #[serde(default)]
    poetry: PoetryWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PoetryWire {
    name: Option<PackageName>,
    #[serde(default)]
    dependencies: BTreeMap<PackageName, DependencyWire>,
    #[serde(default)]
    dev_dependencies: BTreeMap<PackageName, DependencyWire>,
    #[serde(default)]
    group: BTreeMap<GroupName, GroupWire>,
    #[serde(default)]
    extras: BTreeMap<ExtraName, Vec<String>>,
    #[serde(default)]
    source: Vec<SourceWire>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupWire {
    #[serde(default)]
    dependencies: BTreeMap<PackageName, DependencyWire>,
}

#[derive(Debug, Deserialize)]
struct SourceWire {
    name: String,
    url: Option<Url>,
    priority: Option<SourcePriority>,
    /// Superseded by `priority = "default"`.
    #[serde(default)]
    default: bool,
    /// Superseded by `priority = "secondary"`.
    #[serde(default)]
    secondary: bool,
}

impl TryFrom<PyProjectWire> for ProjectManifest {
    type Error = ManifestError;

    fn try_from(wire: PyProjectWire) -> Result<Self, ManifestError> {
        let PyProjectWire { project, tool } = wire;
        let ToolWire { poetry } = tool;
        let project = project.unwrap_or_default();

        let mut python = None;
        let mut poetry_main = Vec::new();
        for (name, dependency) in poetry.dependencies {
            if name.as_str() == "python" {
                python = Some(dependency);
                continue;
            }
            poetry_main.extend(requirements(&MAIN_GROUP, &name, dependency)?);
        }

        let python_constraint = match (python, project.requires_python) {
            (Some(DependencyWire::Constraint(python)), _) | (None, Some(python)) => {
                VersionConstraint::from_str(&python)
                    .map_err(|source| ManifestError::Python { python, source })?
            }
            _ => VersionConstraint::any(),
        };

        let mut groups = BTreeMap::new();

        let main = match project.dependencies {
            Some(dependencies) => dependencies
                .iter()
                .map(|dependency| parse_pep508(&MAIN_GROUP, dependency))
                .collect::<Result<Vec<_>, _>>()?,
            None => poetry_main,
        };
        groups.insert(MAIN_GROUP.clone(), main);

        let mut extras = BTreeMap::new();
        for (extra, dependencies) in project.optional_dependencies {
            let mut names = Vec::new();
            for dependency in &dependencies {
                let mut requirement = parse_pep508(&MAIN_GROUP, dependency)?;
                requirement.optional = true;
                names.push(requirement.name.clone());
                if let Some(main) = groups.get_mut(&*MAIN_GROUP) {
                    main.push(requirement);
                }
            }
            extras.insert(extra, names);
        }
        for (extra, entries) in poetry.extras {
            let names = entries
                .iter()
                .map(|entry| {
                    Requirement::from_str(entry)
                        .map(|requirement| requirement.name)
                        .map_err(|source| ManifestError::Extra {
                            extra: extra.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            extras.entry(extra).or_insert_with(Vec::new).extend(names);
        }

        if !poetry.dev_dependencies.is_empty() {
            let mut dev = Vec::new();
            for (name, dependency) in poetry.dev_dependencies {
                dev.extend(requirements(&DEV_DEPENDENCIES, &name, dependency)?);
            }
            groups.insert(DEV_DEPENDENCIES.clone(), dev);
        }
        for (group, GroupWire { dependencies }) in poetry.group {
            let mut declared = Vec::new();
            for (name, dependency) in dependencies {
                declared.extend(requirements(&group, &name, dependency)?);
            }
            groups.entry(group).or_insert_with(Vec::new).extend(declared);
        }

        let sources = poetry
            .source
            .into_iter()
            .map(|source| {
                let priority = match source.priority {
                    Some(priority) => priority,
                    None if source.default => SourcePriority::Default,
                    None if source.secondary => SourcePriority::Secondary,
                    None => SourcePriority::Primary,
                };
                PackageSource {
                    name: source.name,
                    url: source.url,
                    priority,
                }
            })
            .collect();

        Ok(Self {
            name: project.name.or(poetry.name),
            python_constraint,
            groups,
            extras,
            sources,
        })
    }
}

fn requirements(
    group: &GroupName,
    name: &PackageName,
    dependency: DependencyWire,
) -> Result<Vec<Requirement>, ManifestError> {
    dependency
        .into_requirements(name)
        .map_err(|source| ManifestError::Requirement {
            group: group.clone(),
            requirement: name.to_string(),
            source,
        })
}

fn parse_pep508(group: &GroupName, requirement: &str) -> Result<Requirement, ManifestError> {
    Requirement::from_str(requirement).map_err(|source| ManifestError::Requirement {
        group: group.clone(),
        requirement: requirement.to_string(),
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("Invalid Python constraint `{python}`")]
    Python {
        python: String,
        #[source]
        source: ConstraintError,
    },
    #[error("Invalid dependency `{requirement}` in group `{group}`")]
    Requirement {
        group: GroupName,
        requirement: String,
        #[source]
        source: RequirementError,
    },
    #[error("Invalid entry in extra `{extra}`")]
    Extra {
        extra: ExtraName,
        #[source]
        source: RequirementError,
    },
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_debug_snapshot;

    use lockex_normalize::{DEV_DEPENDENCIES, GroupName, MAIN_GROUP};

    use super::{ProjectManifest, SourcePriority};

    fn describe(manifest: &ProjectManifest) -> Vec<String> {
        manifest
            .group_names()
            .flat_map(|group| {
                manifest.dependencies(group).iter().map(move |requirement| {
                    format!(
                        "{group}: {requirement}{}",
                        if requirement.optional {
                            " (optional)"
                        } else {
                            ""
                        }
                    )
                })
            })
            .collect()
    }

    #[test]
    fn poetry() {
        let manifest = ProjectManifest::from_toml(indoc! {r#"
            [tool.poetry]
            name = "project"

            [tool.poetry.dependencies]
            python = "^3.8"
            requests = "^2.31"
            pywin32 = { version = ">=306", platform = "win32" }
            colorama = { version = ">=0.4", optional = true }

            [tool.poetry.extras]
            color = ["colorama"]

            [tool.poetry.dev-dependencies]
            pytest = "^8.0"

            [tool.poetry.group.docs.dependencies]
            mkdocs = "*"

            [[tool.poetry.source]]
            name = "private"
            url = "https://example.com/simple"
            priority = "supplemental"

            [[tool.poetry.source]]
            name = "legacy"
            url = "http://legacy.example.com/simple/"
            default = true
        "#})
        .unwrap();

        assert_eq!(manifest.name().map(|name| name.as_str()), Some("project"));
        assert_eq!(manifest.python_constraint().to_string(), "^3.8");
        assert_debug_snapshot!(describe(&manifest), @r#"
        [
            "dev: pytest (^8.0)",
            "docs: mkdocs",
            "main: colorama (>=0.4) (optional)",
            "main: pywin32 (>=306) ; sys_platform == \"win32\"",
            "main: requests (^2.31)",
        ]
        "#);
        assert_eq!(
            manifest
                .extras()
                .values()
                .flatten()
                .map(|name| name.as_str())
                .collect::<Vec<_>>(),
            ["colorama"]
        );

        let priorities = manifest
            .sources()
            .iter()
            .map(|source| (source.name.as_str(), source.priority))
            .collect::<Vec<_>>();
        assert_eq!(
            priorities,
            [
                ("private", SourcePriority::Supplemental),
                ("legacy", SourcePriority::Default)
            ]
        );
    }

    #[test]
    fn pep621() {
        let manifest = ProjectManifest::from_toml(indoc! {r#"
            [project]
            name = "project"
            requires-python = ">=3.9"
            dependencies = [
                "requests[socks]>=2.31",
                "tomli ; python_version < '3.11'",
            ]

            [project.optional-dependencies]
            Color = ["colorama>=0.4"]

            [tool.poetry.group.test.dependencies]
            pytest = "^8.0"
        "#})
        .unwrap();

        assert_eq!(manifest.python_constraint().to_specifiers(), ">=3.9");
        assert_debug_snapshot!(describe(&manifest), @r#"
        [
            "main: requests[socks] (>=2.31)",
            "main: tomli ; python_version < \"3.11\"",
            "main: colorama (>=0.4) (optional)",
            "test: pytest (^8.0)",
        ]
        "#);
        assert_eq!(
            manifest
                .extras()
                .keys()
                .map(|extra| extra.as_str())
                .collect::<Vec<_>>(),
            ["color"]
        );
    }

    #[test]
    fn missing_group() {
        let manifest = ProjectManifest::from_toml("").unwrap();
        assert!(manifest.python_constraint().is_any());
        assert!(manifest.dependencies(&MAIN_GROUP).is_empty());
        assert!(manifest.dependencies(&DEV_DEPENDENCIES).is_empty());
        assert_eq!(
            manifest.group_names().cloned().collect::<Vec<GroupName>>(),
            [MAIN_GROUP.clone()]
        );
    }

    #[test]
    fn invalid_dependency() {
        let err = ProjectManifest::from_toml(indoc! {r#"
            [tool.poetry.dependencies]
            requests = ">=two"
        "#})
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid dependency `requests` in group `main`"
        );
    }
}
