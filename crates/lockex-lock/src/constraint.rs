use std::fmt::{Display, Formatter};
use std::ops::Bound;
use std::str::FromStr;

use itertools::Itertools;
use pep440_rs::Version;
use version_ranges::Ranges;

/// A version constraint as written in `poetry.lock` and `pyproject.toml`.
///
/// Besides PEP 440 specifiers, the constraint may use caret (`^1.2`) and tilde (`~1.2`)
/// requirements, `||` alternatives, and whitespace as well as commas between conjuncts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    ranges: Ranges<Version>,
    text: String,
}

impl VersionConstraint {
    /// The constraint that allows every version.
    pub fn any() -> Self {
        Self {
            ranges: Ranges::full(),
            text: "*".to_string(),
        }
    }

    /// Create a constraint that allows exactly the given version.
    pub fn exact(version: &Version) -> Self {
        Self {
            ranges: Ranges::singleton(version.clone()),
            text: format!("=={version}"),
        }
    }

    /// The set of versions allowed by the constraint.
    pub fn ranges(&self) -> &Ranges<Version> {
        &self.ranges
    }

    /// Returns `true` if the constraint allows the given version.
    pub fn allows(&self, version: &Version) -> bool {
        self.ranges.contains(version)
    }

    /// Returns `true` if the constraint allows every version.
    pub fn is_any(&self) -> bool {
        self.ranges == Ranges::full()
    }

    /// The constraint as it was written.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Render the allowed versions as PEP 440 specifiers, with `||` between disjoint segments.
    ///
    /// For example, `^3.8` renders as `>=3.8,<4.0`.
    pub fn to_specifiers(&self) -> String {
        if self.is_any() {
            return "*".to_string();
        }
        if self.ranges.is_empty() {
            return "<0".to_string();
        }
        self.ranges
            .iter()
            .map(|(lower, upper)| match (lower, upper) {
                (Bound::Included(lower), Bound::Included(upper)) if lower == upper => {
                    format!("=={lower}")
                }
                (lower, upper) => {
                    let lower = match lower {
                        Bound::Included(version) => Some(format!(">={version}")),
                        Bound::Excluded(version) => Some(format!(">{version}")),
                        Bound::Unbounded => None,
                    };
                    let upper = match upper {
                        Bound::Included(version) => Some(format!("<={version}")),
                        Bound::Excluded(version) => Some(format!("<{version}")),
                        Bound::Unbounded => None,
                    };
                    lower.into_iter().chain(upper).join(",")
                }
            })
            .join(" || ")
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.text.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.text)
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let mut ranges = Ranges::empty();
        for alternative in text.split("||").flat_map(|alternative| alternative.split('|')) {
            ranges = ranges.union(&parse_conjunction(alternative, text)?);
        }
        Ok(Self {
            ranges,
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Caret,
    Tilde,
    TildeEqual,
    Equal,
    ExactEqual,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::TildeEqual => "~=",
            Self::Equal => "==",
            Self::ExactEqual => "===",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
        })
    }
}

/// Operators by prefix, longest first.
const OPERATORS: &[(&str, Operator)] = &[
    ("===", Operator::ExactEqual),
    ("==", Operator::Equal),
    ("!=", Operator::NotEqual),
    ("~=", Operator::TildeEqual),
    (">=", Operator::GreaterThanEqual),
    ("<=", Operator::LessThanEqual),
    (">", Operator::GreaterThan),
    ("<", Operator::LessThan),
    ("^", Operator::Caret),
    ("~", Operator::Tilde),
    ("=", Operator::Equal),
];

/// Parse conjuncts separated by commas or whitespace, e.g. `>=1.2, <2` or `>= 1.2 < 2`.
fn parse_conjunction(input: &str, constraint: &str) -> Result<Ranges<Version>, ConstraintError> {
    let mut range = Ranges::full();
    let mut operator = String::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        // A bare operator is separated from its version by whitespace.
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '!' | '~' | '^')) {
            operator.push_str(token);
            continue;
        }
        let atom = format!("{operator}{token}");
        operator.clear();
        range = range.intersection(&parse_atom(&atom, constraint)?);
    }
    if !operator.is_empty() {
        return Err(ConstraintError::MissingVersion {
            constraint: constraint.to_string(),
            operator,
        });
    }
    Ok(range)
}

fn parse_atom(atom: &str, constraint: &str) -> Result<Ranges<Version>, ConstraintError> {
    let (operator, version) = OPERATORS
        .iter()
        .find_map(|(prefix, operator)| {
            atom.strip_prefix(prefix)
                .map(|version| (*operator, version.trim()))
        })
        .unwrap_or((Operator::Equal, atom));

    if version == "*" {
        return match operator {
            Operator::Equal | Operator::ExactEqual => Ok(Ranges::full()),
            Operator::NotEqual => Ok(Ranges::empty()),
            _ => Err(ConstraintError::InvalidWildcard {
                constraint: constraint.to_string(),
                operator: operator.to_string(),
            }),
        };
    }

    if let Some(prefix) = version.strip_suffix(".*") {
        let version = parse_version(prefix, constraint)?;
        let range = Ranges::between(Version::new(version.release()), bump(version.release()));
        return match operator {
            Operator::Equal => Ok(range),
            Operator::NotEqual => Ok(range.complement()),
            _ => Err(ConstraintError::InvalidWildcard {
                constraint: constraint.to_string(),
                operator: operator.to_string(),
            }),
        };
    }

    let version = parse_version(version, constraint)?;
    let release = version.release();
    Ok(match operator {
        Operator::Equal | Operator::ExactEqual => Ranges::singleton(version),
        Operator::NotEqual => Ranges::singleton(version).complement(),
        Operator::GreaterThan => Ranges::strictly_higher_than(version),
        Operator::GreaterThanEqual => Ranges::higher_than(version),
        Operator::LessThan => Ranges::strictly_lower_than(version),
        Operator::LessThanEqual => Ranges::lower_than(version),
        Operator::Caret => {
            // Bump the left-most non-zero segment.
            let significant = release
                .iter()
                .position(|segment| *segment != 0)
                .unwrap_or(release.len().saturating_sub(1))
                .min(release.len().saturating_sub(1));
            let upper = bump(&release[..=significant]);
            Ranges::between(version, upper)
        }
        Operator::Tilde => {
            let upper = if release.len() == 1 {
                bump(release)
            } else {
                bump(&release[..2])
            };
            Ranges::between(version, upper)
        }
        Operator::TildeEqual => {
            if release.len() < 2 {
                return Err(ConstraintError::TooFewSegments {
                    constraint: constraint.to_string(),
                    version: version.to_string(),
                });
            }
            let upper = bump(&release[..release.len() - 1]);
            Ranges::between(version, upper)
        }
    })
}

fn parse_version(version: &str, constraint: &str) -> Result<Version, ConstraintError> {
    Version::from_str(version).map_err(|err| ConstraintError::InvalidVersion {
        constraint: constraint.to_string(),
        version: version.to_string(),
        message: err.to_string(),
    })
}

/// Increment the last release segment, e.g. `1.2` becomes `1.3`.
fn bump(release: &[u64]) -> Version {
    let mut release = release.to_vec();
    if let Some(last) = release.last_mut() {
        *last += 1;
    }
    Version::new(release)
}

#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error("Failed to parse version `{version}` in constraint `{constraint}`: {message}")]
    InvalidVersion {
        constraint: String,
        version: String,
        message: String,
    },
    #[error("Expected a version after `{operator}` in constraint `{constraint}`")]
    MissingVersion { constraint: String, operator: String },
    #[error("Wildcards are only allowed with `==` and `!=`, found `{operator}` in constraint `{constraint}`")]
    InvalidWildcard { constraint: String, operator: String },
    #[error(
        "The `~=` operator requires at least two release segments, found `{version}` in constraint `{constraint}`"
    )]
    TooFewSegments { constraint: String, version: String },
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pep440_rs::Version;
    use test_case::test_case;

    use super::VersionConstraint;

    fn constraint(s: &str) -> VersionConstraint {
        VersionConstraint::from_str(s).unwrap()
    }

    fn version(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test_case("*", "*")]
    #[test_case("", "*")]
    #[test_case("1.2.3", "==1.2.3")]
    #[test_case("==1.2.3", "==1.2.3")]
    #[test_case("^3.8", ">=3.8,<4")]
    #[test_case("^0.2.3", ">=0.2.3,<0.3")]
    #[test_case("^0.0.3", ">=0.0.3,<0.0.4")]
    #[test_case("^0", ">=0,<1")]
    #[test_case("~1.2.3", ">=1.2.3,<1.3")]
    #[test_case("~1", ">=1,<2")]
    #[test_case("~=1.2", ">=1.2,<2")]
    #[test_case("~=1.2.3", ">=1.2.3,<1.3")]
    #[test_case(">=1.2, <2.0", ">=1.2,<2.0")]
    #[test_case(">= 1.2 < 2.0", ">=1.2,<2.0")]
    #[test_case("==1.2.*", ">=1.2,<1.3")]
    #[test_case("~2.7 || ^3.6", ">=2.7,<2.8 || >=3.6,<4")]
    #[test_case(">=2.7,!=3.0.*", ">=2.7,<3.0 || >=3.1")]
    fn specifiers(input: &str, expected: &str) {
        assert_eq!(constraint(input).to_specifiers(), expected);
    }

    #[test]
    fn allows() {
        let caret = constraint("^1.2");
        assert!(caret.allows(&version("1.2")));
        assert!(caret.allows(&version("1.9.9")));
        assert!(!caret.allows(&version("2.0")));
        assert!(!caret.allows(&version("1.1")));

        let alternatives = constraint("<1.0 || >=2.0");
        assert!(alternatives.allows(&version("0.9")));
        assert!(!alternatives.allows(&version("1.5")));
        assert!(alternatives.allows(&version("2.0")));

        assert!(constraint("!=1.0").allows(&version("1.1")));
        assert!(!constraint("!=1.0").allows(&version("1.0")));
    }

    #[test]
    fn display_keeps_text() {
        assert_eq!(constraint(" >=1.0,<2.0 ").to_string(), ">=1.0,<2.0");
        assert!(constraint("*").is_any());
        assert!(VersionConstraint::default().is_any());
        assert_eq!(
            VersionConstraint::exact(&version("1.0")).to_string(),
            "==1.0"
        );
    }

    #[test]
    fn errors() {
        let err = VersionConstraint::from_str(">=one").unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Failed to parse version `one` in constraint `>=one`"),
            "{err}"
        );
        assert_eq!(
            VersionConstraint::from_str(">= ").unwrap_err().to_string(),
            "Expected a version after `>=` in constraint `>=`"
        );
        assert_eq!(
            VersionConstraint::from_str(">=1.*").unwrap_err().to_string(),
            "Wildcards are only allowed with `==` and `!=`, found `>=` in constraint `>=1.*`"
        );
        assert_eq!(
            VersionConstraint::from_str("~=1").unwrap_err().to_string(),
            "The `~=` operator requires at least two release segments, found `1` in constraint `~=1`"
        );
    }
}
