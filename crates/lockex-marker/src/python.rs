//! Lowering of `python_version` and `python_full_version` comparisons into version ranges, and
//! the reverse direction for rendering.

use std::ops::Bound;
use std::str::FromStr;

use itertools::Itertools;
use pep440_rs::Version;
use version_ranges::Ranges;

use crate::{MarkerOperator, MarkerValueVersion};

/// The range of full Python versions matched by `<key> <operator> "<value>"`.
pub(crate) fn version_range(
    key: MarkerValueVersion,
    operator: MarkerOperator,
    value: &str,
) -> Result<Ranges<Version>, String> {
    match operator {
        MarkerOperator::In | MarkerOperator::NotIn => {
            let mut range = Ranges::empty();
            for item in value.split_whitespace() {
                range = range.union(&version_range(key, MarkerOperator::Equal, item)?);
            }
            if operator == MarkerOperator::NotIn {
                range = range.complement();
            }
            Ok(range)
        }
        _ => {
            let (value, star) = match value.trim().strip_suffix(".*") {
                Some(prefix) => (prefix, true),
                None => (value.trim(), false),
            };
            let version = Version::from_str(value)
                .map_err(|err| format!("Expected PEP 440 version, found `{value}`: {err}"))?;

            if star {
                let prefix = prefix_range(&version)?;
                return match operator {
                    MarkerOperator::Equal => Ok(prefix),
                    MarkerOperator::NotEqual => Ok(prefix.complement()),
                    _ => Err(format!(
                        "Wildcards are only allowed with `==` and `!=`, found `{operator}`"
                    )),
                };
            }

            match key {
                MarkerValueVersion::PythonVersion if is_minor(&version) => {
                    minor_range(operator, &version)
                }
                MarkerValueVersion::PythonVersion if is_plain(&version) => {
                    Ok(within_minor_range(operator, &version))
                }
                _ => full_range(operator, &version),
            }
        }
    }
}

/// `python_version` values name a whole minor release series.
fn minor_range(operator: MarkerOperator, version: &Version) -> Result<Ranges<Version>, String> {
    let lower = minor(version);
    let upper = next_minor(version);
    Ok(match operator {
        MarkerOperator::Equal => Ranges::between(lower, upper),
        MarkerOperator::NotEqual => Ranges::between(lower, upper).complement(),
        MarkerOperator::LessThan => Ranges::strictly_lower_than(lower),
        MarkerOperator::LessEqual => Ranges::strictly_lower_than(upper),
        MarkerOperator::GreaterThan => Ranges::higher_than(upper),
        MarkerOperator::GreaterEqual => Ranges::higher_than(lower),
        MarkerOperator::TildeEqual => {
            if version.release().len() < 2 {
                return Err(format!(
                    "The `~=` operator requires at least two release segments, found `{version}`"
                ));
            }
            // `~= 3.8.0` only admits the `3.8` series.
            if version.release().len() > 2 {
                return Ok(Ranges::between(lower, upper));
            }
            let major = version.release()[0];
            Ranges::between(lower, Version::new([major + 1]))
        }
        MarkerOperator::In | MarkerOperator::NotIn => unreachable!("handled by the caller"),
    })
}

/// `python_version` compared against a version inside a minor series, e.g. `3.8.1`.
///
/// `python_version` is `3.8` for every `3.8.x`, which sorts below `3.8.1`, so the whole series
/// falls on the lower side.
fn within_minor_range(operator: MarkerOperator, version: &Version) -> Ranges<Version> {
    let upper = next_minor(version);
    match operator {
        MarkerOperator::LessThan | MarkerOperator::LessEqual => Ranges::strictly_lower_than(upper),
        MarkerOperator::GreaterThan | MarkerOperator::GreaterEqual => Ranges::higher_than(upper),
        MarkerOperator::Equal | MarkerOperator::TildeEqual => Ranges::empty(),
        MarkerOperator::NotEqual => Ranges::full(),
        MarkerOperator::In | MarkerOperator::NotIn => unreachable!("handled by the caller"),
    }
}

fn full_range(operator: MarkerOperator, version: &Version) -> Result<Ranges<Version>, String> {
    Ok(match operator {
        MarkerOperator::Equal => Ranges::singleton(version.clone()),
        MarkerOperator::NotEqual => Ranges::singleton(version.clone()).complement(),
        MarkerOperator::LessThan => Ranges::strictly_lower_than(version.clone()),
        MarkerOperator::LessEqual => Ranges::lower_than(version.clone()),
        MarkerOperator::GreaterThan => Ranges::strictly_higher_than(version.clone()),
        MarkerOperator::GreaterEqual => Ranges::higher_than(version.clone()),
        MarkerOperator::TildeEqual => {
            let release = version.release();
            if release.len() < 2 {
                return Err(format!(
                    "The `~=` operator requires at least two release segments, found `{version}`"
                ));
            }
            Ranges::between(version.clone(), bump(&release[..release.len() - 1]))
        }
        MarkerOperator::In | MarkerOperator::NotIn => unreachable!("handled by the caller"),
    })
}

/// All versions starting with the release segments of `version`, e.g. `3.8.*`.
fn prefix_range(version: &Version) -> Result<Ranges<Version>, String> {
    if !is_plain(version) {
        return Err(format!(
            "Wildcards are only allowed on plain release versions, found `{version}.*`"
        ));
    }
    Ok(Ranges::between(
        Version::new(version.release()),
        bump(version.release()),
    ))
}

/// Increment the last release segment, e.g. `3.8` becomes `3.9`.
pub(crate) fn bump(release: &[u64]) -> Version {
    let mut release = release.to_vec();
    if let Some(last) = release.last_mut() {
        *last += 1;
    }
    Version::new(release)
}

/// Whether the version is a bare release, without epoch, pre, post, dev or local segments.
pub(crate) fn is_plain(version: &Version) -> bool {
    Version::new(version.release()) == *version
}

/// The release segments with trailing zeros removed.
fn significant(release: &[u64]) -> &[u64] {
    let len = release
        .iter()
        .rposition(|segment| *segment != 0)
        .map_or(0, |index| index + 1);
    &release[..len]
}

/// Whether the version sits exactly on a minor release boundary, e.g. `3.8` or `3.8.0`.
pub(crate) fn is_minor(version: &Version) -> bool {
    is_plain(version) && significant(version.release()).len() <= 2
}

/// The `major.minor` prefix, padding with zeros.
fn minor_segments(version: &Version) -> [u64; 2] {
    let release = version.release();
    [
        release.first().copied().unwrap_or(0),
        release.get(1).copied().unwrap_or(0),
    ]
}

pub(crate) fn minor(version: &Version) -> Version {
    Version::new(minor_segments(version))
}

pub(crate) fn next_minor(version: &Version) -> Version {
    let [major, minor] = minor_segments(version);
    Version::new([major, minor + 1])
}

/// Render as `major.minor`, e.g. `4` becomes `4.0`.
fn minor_string(version: &Version) -> String {
    minor_segments(version).iter().join(".")
}

/// Render a Python version range as alternatives of conjunctions.
///
/// Gaps of whole minor releases within one major version, or of a single version, are
/// expressed with `!=` so that `>=2.7,!=3.0.*,!=3.1.*` stays a single conjunction. Any other
/// gap splits the range into one alternative per segment.
pub(crate) fn python_alternatives(range: &Ranges<Version>) -> Vec<Vec<String>> {
    let segments = range.iter().collect::<Vec<_>>();
    let Some((first, last)) = segments.first().zip(segments.last()) else {
        return Vec::new();
    };
    if segments.len() == 1 {
        return vec![segment_atoms(first.0, first.1)];
    }

    let holes = segments
        .iter()
        .tuple_windows()
        .map(|((_, upper), (lower, _))| hole_atoms(upper, lower))
        .collect::<Option<Vec<_>>>();
    match holes {
        Some(holes) => {
            let mut atoms = Vec::new();
            atoms.extend(lower_atom(first.0));
            atoms.extend(holes.into_iter().flatten());
            atoms.extend(upper_atom(last.1));
            vec![atoms]
        }
        None => segments
            .iter()
            .map(|(lower, upper)| segment_atoms(lower, upper))
            .collect(),
    }
}

fn segment_atoms(lower: &Bound<Version>, upper: &Bound<Version>) -> Vec<String> {
    match (lower, upper) {
        (Bound::Included(lower), Bound::Included(upper)) if lower == upper => {
            vec![format!("python_full_version == \"{lower}\"")]
        }
        (Bound::Included(lower), Bound::Excluded(upper))
            if is_minor(lower) && *upper == next_minor(lower) =>
        {
            vec![format!("python_version == \"{}\"", minor_string(lower))]
        }
        (lower, upper) => lower_atom(lower).into_iter().chain(upper_atom(upper)).collect(),
    }
}

/// The atoms excluding the gap between two segments, e.g. `[3.0, 3.2)` becomes
/// `python_version != "3.0" and python_version != "3.1"`.
fn hole_atoms(upper: &Bound<Version>, lower: &Bound<Version>) -> Option<Vec<String>> {
    match (upper, lower) {
        (Bound::Excluded(upper), Bound::Excluded(lower)) if upper == lower => {
            Some(vec![format!("python_full_version != \"{upper}\"")])
        }
        (Bound::Excluded(upper), Bound::Included(lower)) if is_minor(upper) && is_minor(lower) => {
            let [upper_major, upper_minor] = minor_segments(upper);
            let [lower_major, lower_minor] = minor_segments(lower);
            if upper_major != lower_major || lower_minor <= upper_minor {
                return None;
            }
            Some(
                (upper_minor..lower_minor)
                    .map(|minor| format!("python_version != \"{upper_major}.{minor}\""))
                    .collect(),
            )
        }
        _ => None,
    }
}

fn lower_atom(bound: &Bound<Version>) -> Option<String> {
    match bound {
        Bound::Unbounded => None,
        Bound::Included(version) if is_minor(version) => Some(format!(
            "python_version >= \"{}\"",
            minor_string(version)
        )),
        Bound::Included(version) => Some(format!("python_full_version >= \"{version}\"")),
        Bound::Excluded(version) => Some(format!("python_full_version > \"{version}\"")),
    }
}

fn upper_atom(bound: &Bound<Version>) -> Option<String> {
    match bound {
        Bound::Unbounded => None,
        Bound::Excluded(version) if is_minor(version) => Some(format!(
            "python_version < \"{}\"",
            minor_string(version)
        )),
        Bound::Excluded(version) => Some(format!("python_full_version < \"{version}\"")),
        Bound::Included(version) => Some(format!("python_full_version <= \"{version}\"")),
    }
}
