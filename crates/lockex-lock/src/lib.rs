//! Reading `poetry.lock` files and the project manifest they were locked from.

pub use constraint::{ConstraintError, VersionConstraint};
pub use hash::{HashAlgorithm, HashDigest, HashParseError};
pub use lock::{
    Lock, LockError, LockVersion, LockedPackage, PackageFile, PackageId, PackageMarkers,
};
pub use manifest::{ManifestError, PackageSource, ProjectManifest, SourcePriority};
pub use requirement::{Requirement, RequirementError, RequirementSource};
pub use source::{GitSource, Source};

mod constraint;
mod hash;
mod lock;
mod manifest;
mod requirement;
mod source;
