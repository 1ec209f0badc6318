use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pep440_rs::Version;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use lockex_marker::{Condition, MarkerParseError};
use lockex_normalize::{ExtraName, GroupName, PackageName};
use lockex_warnings::warn_user_once;

use crate::requirement::DependencyWire;
use crate::{
    ConstraintError, GitSource, HashDigest, Requirement, RequirementError, Source,
    VersionConstraint,
};

/// The newest major version of the lock file format that can be read.
const SUPPORTED_MAJOR: u32 = 2;

/// The first version of the lock file format to record `groups` and `markers` per package.
const GROUPS_AND_MARKERS: LockVersion = LockVersion::new(2, 1);

/// The newest version of the lock file format known to be read correctly.
const LATEST: LockVersion = LockVersion::new(2, 1);

/// The `lock-version` recorded in a lock file's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockVersion {
    major: u32,
    minor: u32,
}

impl LockVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn major(self) -> u32 {
        self.major
    }
}

impl Default for LockVersion {
    /// Lock files from before the version was recorded.
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl FromStr for LockVersion {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').unwrap_or((s, "0"));
        let (Ok(major), Ok(minor)) = (major.parse::<u32>(), minor.parse::<u32>()) else {
            return Err(LockErrorKind::InvalidLockVersion(s.to_string()).into());
        };
        Ok(Self { major, minor })
    }
}

impl Display for LockVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A `poetry.lock` file.
#[derive(Debug, Clone)]
pub struct Lock {
    version: LockVersion,
    content_hash: Option<String>,
    python_versions: VersionConstraint,
    packages: Vec<LockedPackage>,
    /// The project's extras, mapped to the names of the packages they activate.
    extras: BTreeMap<ExtraName, Vec<PackageName>>,
}

impl Lock {
    /// Read a lock file from disk.
    pub fn read(path: &Path) -> Result<Self, LockError> {
        let contents = match fs_err::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(LockErrorKind::NotFound(path.to_path_buf()).into());
            }
            Err(err) => return Err(err.into()),
        };
        Self::from_toml(&contents)
    }

    /// Parse the contents of a lock file.
    pub fn from_toml(contents: &str) -> Result<Self, LockError> {
        let wire: LockWire = toml::from_str(contents)?;
        Self::try_from(wire)
    }

    pub fn lock_version(&self) -> LockVersion {
        self.version
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    /// The Python versions the project was locked for.
    pub fn python_versions(&self) -> &VersionConstraint {
        &self.python_versions
    }

    pub fn packages(&self) -> &[LockedPackage] {
        &self.packages
    }

    pub fn extras(&self) -> &BTreeMap<ExtraName, Vec<PackageName>> {
        &self.extras
    }

    /// Returns `true` if every package records the groups that require it and the markers under
    /// which it is installed.
    pub fn is_locked_groups_and_markers(&self) -> bool {
        self.version >= GROUPS_AND_MARKERS
    }
}

/// The identity of a locked package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId {
    pub name: PackageName,
    pub version: Version,
    pub source: Source,
}

impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// A `[[package]]` entry in the lock file.
#[derive(Debug, Clone)]
pub struct LockedPackage {
    id: PackageId,
    python_versions: VersionConstraint,
    markers: PackageMarkers,
    dependencies: Vec<Requirement>,
    extras: BTreeMap<ExtraName, Vec<PackageName>>,
    optional: bool,
    develop: bool,
    groups: Vec<GroupName>,
    files: Vec<PackageFile>,
}

impl LockedPackage {
    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn name(&self) -> &PackageName {
        &self.id.name
    }

    pub fn version(&self) -> &Version {
        &self.id.version
    }

    pub fn source(&self) -> &Source {
        &self.id.source
    }

    /// The Python versions the package supports.
    pub fn python_versions(&self) -> &VersionConstraint {
        &self.python_versions
    }

    /// [`LockedPackage::python_versions`] as a condition on the environment.
    pub fn python_condition(&self) -> Condition {
        Condition::python(self.python_versions.ranges().clone())
    }

    pub fn markers(&self) -> &PackageMarkers {
        &self.markers
    }

    pub fn dependencies(&self) -> &[Requirement] {
        &self.dependencies
    }

    /// The package's extras, mapped to the names of the dependencies they activate.
    pub fn extras(&self) -> &BTreeMap<ExtraName, Vec<PackageName>> {
        &self.extras
    }

    /// Returns `true` if the package is only installed through one of the project's extras.
    pub fn optional(&self) -> bool {
        self.optional
    }

    /// Returns `true` if the package is installed in editable mode.
    pub fn develop(&self) -> bool {
        self.develop
    }

    pub fn groups(&self) -> &[GroupName] {
        &self.groups
    }

    pub fn files(&self) -> &[PackageFile] {
        &self.files
    }
}

/// The environments in which a locked package is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageMarkers {
    /// No markers were recorded.
    Always,
    Marker(Condition),
    /// Markers per dependency group that requires the package.
    Groups(BTreeMap<GroupName, Condition>),
}

impl PackageMarkers {
    /// The environments in which the package is installed when the given groups are selected.
    ///
    /// For markers keyed by group, this is the union over the selected groups, or over all of
    /// them if none of the package's groups is selected.
    pub fn for_groups(&self, is_selected: impl Fn(&GroupName) -> bool) -> Condition {
        match self {
            Self::Always => Condition::always(),
            Self::Marker(condition) => condition.clone(),
            Self::Groups(groups) => {
                let any_selected = groups.keys().any(&is_selected);
                groups
                    .iter()
                    .filter(|(group, _)| !any_selected || is_selected(group))
                    .fold(Condition::never(), |acc, (_, condition)| acc.or(condition))
            }
        }
    }
}

/// A distribution file of a locked package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageFile {
    /// The file name.
    pub file: String,
    pub hash: HashDigest,
    #[serde(default)]
    pub url: Option<Url>,
}

impl PackageFile {
    pub fn is_wheel(&self) -> bool {
        Path::new(&self.file)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("whl"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LockWire {
    #[serde(rename = "package", default)]
    packages: Vec<PackageWire>,
    #[serde(default)]
    extras: BTreeMap<ExtraName, Vec<String>>,
    #[serde(default)]
    metadata: MetadataWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct MetadataWire {
    lock_version: Option<String>,
    python_versions: Option<String>,
    content_hash: Option<String>,
    /// Lock files before version 2 record the files of all packages here.
    #[serde(default)]
    files: BTreeMap<PackageName, Vec<PackageFile>>,
}

impl TryFrom<LockWire> for Lock {
    type Error = LockError;

    fn try_from(wire: LockWire) -> Result<Self, LockError> {
        let LockWire {
            packages,
            extras,
            metadata,
        } = wire;

        let version = match metadata.lock_version.as_deref() {
            Some(version) => LockVersion::from_str(version)?,
            None => LockVersion::default(),
        };
        if version.major() > SUPPORTED_MAJOR {
            return Err(LockErrorKind::UnsupportedVersion {
                version,
                supported: SUPPORTED_MAJOR,
            }
            .into());
        }
        if version > LATEST {
            warn_user_once!(
                "The lock file version ({version}) is newer than the latest supported version ({LATEST}); some of its contents may be ignored."
            );
        }
        debug!(
            "Reading lock file version {version} (content hash: {})",
            metadata.content_hash.as_deref().unwrap_or("none")
        );

        let python_versions = match metadata.python_versions.as_deref() {
            Some(python_versions) => VersionConstraint::from_str(python_versions)
                .map_err(LockErrorKind::InvalidMetadataPythonVersions)?,
            None => VersionConstraint::any(),
        };

        let packages = packages
            .into_iter()
            .map(|package| package.unwire(&metadata.files))
            .collect::<Result<Vec<_>, _>>()?;

        let extras = extras
            .into_iter()
            .map(|(extra, entries)| {
                let names = entries
                    .iter()
                    .map(String::as_str)
                    .map(dependency_name)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| LockErrorKind::InvalidExtra {
                        extra: extra.clone(),
                        source,
                    })?;
                Ok((extra, names))
            })
            .collect::<Result<BTreeMap<_, _>, LockError>>()?;

        Ok(Self {
            version,
            content_hash: metadata.content_hash,
            python_versions,
            packages,
            extras,
        })
    }
}

/// The package name of an entry in an extras table, e.g. `requests` for `requests[socks] (>=2)`.
fn dependency_name(entry: &str) -> Result<PackageName, RequirementError> {
    Requirement::from_str(entry).map(|requirement| requirement.name)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PackageWire {
    name: PackageName,
    version: String,
    #[serde(default)]
    optional: bool,
    python_versions: Option<String>,
    #[serde(default)]
    groups: Vec<GroupName>,
    markers: Option<MarkersWire>,
    #[serde(default)]
    develop: bool,
    #[serde(default)]
    files: Vec<PackageFile>,
    #[serde(default)]
    dependencies: BTreeMap<PackageName, DependencyWire>,
    #[serde(default)]
    extras: BTreeMap<ExtraName, Vec<String>>,
    source: Option<SourceWire>,
}

impl PackageWire {
    fn unwire(
        self,
        legacy_files: &BTreeMap<PackageName, Vec<PackageFile>>,
    ) -> Result<LockedPackage, LockError> {
        let name = self.name;

        let version = Version::from_str(&self.version).map_err(|err| {
            LockErrorKind::InvalidPackageVersion {
                name: name.clone(),
                version: self.version.clone(),
                message: err.to_string(),
            }
        })?;

        let python_versions = match self.python_versions.as_deref() {
            Some(python_versions) => VersionConstraint::from_str(python_versions).map_err(
                |source| LockErrorKind::InvalidPythonVersions {
                    name: name.clone(),
                    source,
                },
            )?,
            None => VersionConstraint::any(),
        };

        let invalid_markers = |source| LockErrorKind::InvalidMarkers {
            name: name.clone(),
            source,
        };
        let markers = match self.markers {
            None => PackageMarkers::Always,
            Some(MarkersWire::Marker(markers)) => {
                PackageMarkers::Marker(Condition::from_str(&markers).map_err(invalid_markers)?)
            }
            Some(MarkersWire::Groups(groups)) => PackageMarkers::Groups(
                groups
                    .into_iter()
                    .map(|(group, markers)| Ok((group, Condition::from_str(&markers)?)))
                    .collect::<Result<_, MarkerParseError>>()
                    .map_err(invalid_markers)?,
            ),
        };

        let mut dependencies = Vec::new();
        for (dependency, wire) in self.dependencies {
            let requirements = wire.into_requirements(&dependency).map_err(|source| {
                LockErrorKind::InvalidDependency {
                    name: name.clone(),
                    dependency: dependency.to_string(),
                    source,
                }
            })?;
            dependencies.extend(requirements);
        }

        let mut extras = BTreeMap::new();
        for (extra, entries) in self.extras {
            let names = entries
                .iter()
                .map(|entry| {
                    dependency_name(entry).map_err(|source| LockErrorKind::InvalidDependency {
                        name: name.clone(),
                        dependency: entry.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            extras.insert(extra, names);
        }

        let source = match self.source {
            None => Source::Registry,
            Some(source) => source.unwire(&name)?,
        };

        let files = if self.files.is_empty() {
            legacy_files.get(&name).cloned().unwrap_or_default()
        } else {
            self.files
        };

        Ok(LockedPackage {
            id: PackageId {
                name,
                version,
                source,
            },
            python_versions,
            markers,
            dependencies,
            extras,
            optional: self.optional,
            develop: self.develop,
            groups: self.groups,
            files,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarkersWire {
    Marker(String),
    Groups(BTreeMap<GroupName, String>),
}

#[derive(Debug, Deserialize)]
struct SourceWire {
    #[serde(rename = "type")]
    kind: SourceKind,
    url: String,
    reference: Option<String>,
    resolved_reference: Option<String>,
    subdirectory: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SourceKind {
    Legacy,
    Git,
    Url,
    File,
    Directory,
}

impl SourceWire {
    fn unwire(self, name: &PackageName) -> Result<Source, LockError> {
        let parse_url = |url: &str| {
            Url::parse(url).map_err(|source| LockErrorKind::InvalidSourceUrl {
                name: name.clone(),
                url: url.to_string(),
                source,
            })
        };
        Ok(match self.kind {
            SourceKind::Legacy => Source::Legacy {
                url: parse_url(&self.url)?,
                name: self.reference.unwrap_or_default(),
            },
            SourceKind::Git => Source::Git(GitSource {
                url: self.url,
                reference: self.reference,
                resolved_reference: self.resolved_reference,
                subdirectory: self.subdirectory,
            }),
            SourceKind::Url => Source::Url {
                url: parse_url(&self.url)?,
                subdirectory: self.subdirectory,
            },
            SourceKind::File => Source::File {
                path: PathBuf::from(self.url),
                subdirectory: self.subdirectory,
            },
            SourceKind::Directory => Source::Directory {
                path: PathBuf::from(self.url),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct LockError(Box<LockErrorKind>);

impl<E> From<E> for LockError
where
    LockErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        LockError(Box::new(LockErrorKind::from(err)))
    }
}

/// An error that occurs when reading a lock file.
#[derive(Debug, thiserror::Error)]
enum LockErrorKind {
    #[error("Lock file `{}` not found; run `poetry lock` to create it", .0.display())]
    NotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("Invalid lock file version `{0}`")]
    InvalidLockVersion(String),
    #[error(
        "Lock file version `{version}` is not supported; the newest supported version is `{supported}.x`"
    )]
    UnsupportedVersion { version: LockVersion, supported: u32 },
    #[error("Invalid `python-versions` in the lock file metadata")]
    InvalidMetadataPythonVersions(#[source] ConstraintError),
    #[error("Invalid version `{version}` for package `{name}`: {message}")]
    InvalidPackageVersion {
        name: PackageName,
        version: String,
        message: String,
    },
    #[error("Invalid `python-versions` for package `{name}`")]
    InvalidPythonVersions {
        name: PackageName,
        #[source]
        source: ConstraintError,
    },
    #[error("Invalid markers for package `{name}`")]
    InvalidMarkers {
        name: PackageName,
        #[source]
        source: MarkerParseError,
    },
    #[error("Invalid dependency `{dependency}` of package `{name}`")]
    InvalidDependency {
        name: PackageName,
        dependency: String,
        #[source]
        source: RequirementError,
    },
    #[error("Invalid entry in the lock file's extra `{extra}`")]
    InvalidExtra {
        extra: ExtraName,
        #[source]
        source: RequirementError,
    },
    #[error("Invalid source URL `{url}` for package `{name}`")]
    InvalidSourceUrl {
        name: PackageName,
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests;
