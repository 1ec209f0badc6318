use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use itertools::Itertools;
use serde::Deserialize;

use lockex_marker::{Condition, MarkerParseError};
use lockex_normalize::{ExtraName, InvalidNameError, PackageName};

use crate::{ConstraintError, VersionConstraint};

/// A dependency on a package, as declared by the project or by a locked package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Requirement {
    pub name: PackageName,
    pub constraint: VersionConstraint,
    /// The environments in which the dependency applies.
    pub condition: Condition,
    /// The extras requested on the target package.
    pub extras: BTreeSet<ExtraName>,
    /// Whether the dependency is only pulled in through an extra.
    pub optional: bool,
    /// A direct reference, for dependencies that don't come from a package index.
    pub source: Option<RequirementSource>,
}

impl Requirement {
    /// A dependency on any version of the package, in every environment.
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            constraint: VersionConstraint::any(),
            condition: Condition::always(),
            extras: BTreeSet::new(),
            optional: false,
            source: None,
        }
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    #[must_use]
    pub fn with_extras(mut self, extras: impl IntoIterator<Item = ExtraName>) -> Self {
        self.extras.extend(extras);
        self
    }
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.iter().join(","))?;
        }
        if let Some(source) = &self.source {
            write!(f, " @ {source}")?;
        } else if !self.constraint.is_any() {
            write!(f, " ({})", self.constraint)?;
        }
        if let Some(contents) = self.condition.contents() {
            write!(f, " ; {contents}")?;
        }
        Ok(())
    }
}

/// Parse a PEP 508 requirement, e.g. `requests[socks] (>=2.0) ; python_version < "3.8"`.
///
/// The version may be given with or without parentheses, and in Poetry's constraint syntax.
impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (body, markers) = match input.split_once(';') {
            Some((body, markers)) => (body.trim(), Some(markers.trim())),
            None => (input.trim(), None),
        };

        let end = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(body.len());
        if end == 0 {
            return Err(RequirementError::MissingName(input.to_string()));
        }
        let name = PackageName::from_str(&body[..end])?;
        let mut rest = body[end..].trim_start();

        let mut extras = BTreeSet::new();
        if let Some(inner) = rest.strip_prefix('[') {
            let (list, after) = inner
                .split_once(']')
                .ok_or_else(|| RequirementError::UnclosedExtras(input.to_string()))?;
            for extra in list.split(',').map(str::trim).filter(|extra| !extra.is_empty()) {
                extras.insert(ExtraName::from_str(extra)?);
            }
            rest = after.trim_start();
        }

        let mut constraint = VersionConstraint::any();
        let mut source = None;
        if let Some(url) = rest.strip_prefix('@') {
            source = Some(RequirementSource::from_url(url.trim()));
        } else if let Some(inner) = rest.strip_prefix('(') {
            let inner = inner
                .strip_suffix(')')
                .ok_or_else(|| RequirementError::UnclosedParenthesis(input.to_string()))?;
            constraint = VersionConstraint::from_str(inner)?;
        } else if !rest.is_empty() {
            constraint = VersionConstraint::from_str(rest)?;
        }

        let condition = match markers {
            Some(markers) => Condition::from_str(markers)?,
            None => Condition::always(),
        };

        Ok(Self {
            name,
            constraint,
            condition,
            extras,
            optional: false,
            source,
        })
    }
}

/// A direct reference to a distribution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequirementSource {
    Git {
        url: String,
        reference: Option<String>,
    },
    Url {
        url: String,
    },
    Path {
        path: PathBuf,
        develop: bool,
    },
}

impl RequirementSource {
    /// Interpret the URL of a PEP 508 direct reference.
    fn from_url(url: &str) -> Self {
        let url = url.split_once('#').map_or(url, |(url, _)| url);
        if let Some(git) = url.strip_prefix("git+") {
            // A revision follows the last `@` of the path, e.g. `repo.git@v1.0`.
            return match git.rsplit_once('@') {
                Some((repository, reference))
                    if repository.contains("://") && !reference.contains('/') =>
                {
                    Self::Git {
                        url: repository.to_string(),
                        reference: Some(reference.to_string()),
                    }
                }
                _ => Self::Git {
                    url: git.to_string(),
                    reference: None,
                },
            };
        }
        if let Some(path) = url.strip_prefix("file://") {
            return Self::Path {
                path: PathBuf::from(path),
                develop: false,
            };
        }
        Self::Url {
            url: url.to_string(),
        }
    }
}

impl Display for RequirementSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git { url, reference } => {
                write!(f, "git+{url}")?;
                if let Some(reference) = reference {
                    write!(f, "@{reference}")?;
                }
                Ok(())
            }
            Self::Url { url } => f.write_str(url),
            Self::Path { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

/// A dependency in a `[package.dependencies]` or `[tool.poetry.dependencies]` table.
///
/// ```toml
/// [tool.poetry.dependencies]
/// requests = "^2.31"
/// numpy = { version = ">=1.26", python = ">=3.9" }
/// torch = [
///     { version = "2.2.2", markers = "sys_platform == 'darwin'" },
///     { version = "2.3.1", markers = "sys_platform != 'darwin'" },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum DependencyWire {
    Constraint(String),
    Detailed(DetailedDependencyWire),
    Multiple(Vec<DetailedDependencyWire>),
}

impl DependencyWire {
    pub(crate) fn into_requirements(
        self,
        name: &PackageName,
    ) -> Result<Vec<Requirement>, RequirementError> {
        match self {
            Self::Constraint(constraint) => Ok(vec![
                Requirement::new(name.clone())
                    .with_constraint(VersionConstraint::from_str(&constraint)?),
            ]),
            Self::Detailed(detailed) => Ok(vec![detailed.into_requirement(name)?]),
            Self::Multiple(alternatives) => alternatives
                .into_iter()
                .map(|detailed| detailed.into_requirement(name))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct DetailedDependencyWire {
    version: Option<String>,
    markers: Option<String>,
    python: Option<String>,
    platform: Option<String>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    extras: Vec<ExtraName>,
    git: Option<String>,
    branch: Option<String>,
    tag: Option<String>,
    rev: Option<String>,
    url: Option<String>,
    path: Option<String>,
    #[serde(default)]
    develop: bool,
}

impl DetailedDependencyWire {
    fn into_requirement(self, name: &PackageName) -> Result<Requirement, RequirementError> {
        let constraint = match &self.version {
            Some(version) => VersionConstraint::from_str(version)?,
            None => VersionConstraint::any(),
        };

        let mut condition = match &self.markers {
            Some(markers) => Condition::from_str(markers)?,
            None => Condition::always(),
        };
        if let Some(python) = &self.python {
            let python = VersionConstraint::from_str(python)?;
            condition = condition.and(&Condition::python(python.ranges().clone()));
        }
        if let Some(platform) = &self.platform {
            let platform = Condition::from_str(&format!("sys_platform == \"{platform}\""))?;
            condition = condition.and(&platform);
        }

        let source = if let Some(url) = self.git {
            Some(RequirementSource::Git {
                url,
                reference: self.rev.or(self.tag).or(self.branch),
            })
        } else if let Some(url) = self.url {
            Some(RequirementSource::Url { url })
        } else {
            self.path.map(|path| RequirementSource::Path {
                path: PathBuf::from(path),
                develop: self.develop,
            })
        };

        Ok(Requirement {
            name: name.clone(),
            constraint,
            condition,
            extras: self.extras.into_iter().collect(),
            optional: self.optional,
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error(transparent)]
    Marker(#[from] MarkerParseError),
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error(transparent)]
    Name(#[from] InvalidNameError),
    #[error("Expected a package name at the start of `{0}`")]
    MissingName(String),
    #[error("Missing closing bracket after the extras in `{0}`")]
    UnclosedExtras(String),
    #[error("Missing closing parenthesis after the version in `{0}`")]
    UnclosedParenthesis(String),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::str::FromStr;

    use test_case::test_case;

    use lockex_normalize::PackageName;

    use super::{DependencyWire, Requirement, RequirementSource};

    fn requirement(s: &str) -> Requirement {
        Requirement::from_str(s).unwrap()
    }

    #[test_case("requests", "requests")]
    #[test_case("Requests_OAuthlib", "requests-oauthlib")]
    #[test_case("requests (>=2.0)", "requests (>=2.0)")]
    #[test_case("requests>=2.0,<3", "requests (>=2.0,<3)")]
    #[test_case("requests[socks, security] (>=2.0)", "requests[security,socks] (>=2.0)")]
    #[test_case(
        "pywin32 ; sys_platform == 'win32'",
        r#"pywin32 ; sys_platform == "win32""#
    )]
    #[test_case(
        "colorama (>=0.4) ; extra == 'Color'",
        r#"colorama (>=0.4) ; extra == "color""#
    )]
    #[test_case(
        "foo @ git+https://github.com/org/foo.git@v1.0",
        "foo @ git+https://github.com/org/foo.git@v1.0"
    )]
    fn display(input: &str, expected: &str) {
        assert_eq!(requirement(input).to_string(), expected);
    }

    #[test]
    fn direct_references() {
        assert_eq!(
            requirement("foo @ https://example.com/foo-1.0.tar.gz").source,
            Some(RequirementSource::Url {
                url: "https://example.com/foo-1.0.tar.gz".to_string()
            })
        );
        assert_eq!(
            requirement("foo @ file:///srv/foo").source,
            Some(RequirementSource::Path {
                path: PathBuf::from("/srv/foo"),
                develop: false,
            })
        );
        assert_eq!(
            requirement("foo @ git+ssh://git@github.com/org/foo.git").source,
            Some(RequirementSource::Git {
                url: "ssh://git@github.com/org/foo.git".to_string(),
                reference: None,
            })
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            Requirement::from_str(">=1.0").unwrap_err().to_string(),
            "Expected a package name at the start of `>=1.0`"
        );
        assert_eq!(
            Requirement::from_str("foo[bar").unwrap_err().to_string(),
            "Missing closing bracket after the extras in `foo[bar`"
        );
        assert_eq!(
            Requirement::from_str("foo (>=1.0").unwrap_err().to_string(),
            "Missing closing parenthesis after the version in `foo (>=1.0`"
        );
    }

    #[test]
    fn wire_forms() {
        #[derive(serde::Deserialize)]
        struct Table {
            dependencies: std::collections::BTreeMap<PackageName, DependencyWire>,
        }

        let table: Table = toml::from_str(indoc::indoc! {r#"
            [dependencies]
            requests = "^2.31"
            numpy = { version = ">=1.26", python = ">=3.9", extras = ["Dev"], optional = true }
            pywin32 = { version = "*", platform = "win32" }
            torch = [
                { version = "2.2.2", markers = "sys_platform == 'darwin'" },
                { version = "2.3.1", markers = "sys_platform != 'darwin'" },
            ]
            local = { path = "../local", develop = true }
            remote = { git = "https://github.com/org/remote.git", branch = "main", rev = "abc" }
        "#})
        .unwrap();

        let requirements = table
            .dependencies
            .into_iter()
            .flat_map(|(name, wire)| wire.into_requirements(&name).unwrap())
            .map(|requirement| requirement.to_string())
            .collect::<Vec<_>>();
        insta::assert_debug_snapshot!(requirements, @r#"
        [
            "local @ ../local",
            "numpy[dev] (>=1.26) ; python_version >= \"3.9\"",
            "pywin32 ; sys_platform == \"win32\"",
            "remote @ git+https://github.com/org/remote.git@abc",
            "requests (^2.31)",
            "torch (2.2.2) ; sys_platform == \"darwin\"",
            "torch (2.3.1) ; sys_platform != \"darwin\"",
        ]
        "#);
    }
}
