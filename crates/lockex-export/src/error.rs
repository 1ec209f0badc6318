use itertools::Itertools;

use lockex_normalize::{ExtraName, GroupName, PackageName};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Extra [{}] is not specified.", .0.iter().join(", "))]
    InvalidExtra(Vec<ExtraName>),

    #[error("Group(s) not found: {}", .0.iter().join(", "))]
    MissingGroups(Vec<GroupName>),

    #[error(transparent)]
    DependencyWalk(#[from] DependencyWalkError),

    #[error("Cannot export pylock.toml because the lock file is not at least version 2.1")]
    PylockRequiresGroupsAndMarkers,

    #[error("Failed to convert path to URL: `{}`", .0.display())]
    PathToUrl(std::path::PathBuf),
}

/// The lock file can't satisfy the requirements it was supposedly locked for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyWalkError {
    #[error("cannot resolve `{name}` satisfying `{constraint}`")]
    Unresolvable { name: PackageName, constraint: String },
}
