use std::fmt::{Display, Formatter};
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::RequirementSource;

/// Where a locked package comes from.
///
/// The variant order is the tie-break between locked packages that share a name and version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    /// The default package index.
    Registry,
    /// A package index configured under `[[tool.poetry.source]]`.
    Legacy { name: String, url: Url },
    Git(GitSource),
    /// A remote archive.
    Url {
        url: Url,
        subdirectory: Option<String>,
    },
    /// A local archive, relative to the project root unless absolute.
    File {
        path: PathBuf,
        subdirectory: Option<String>,
    },
    /// A local source tree, relative to the project root unless absolute.
    Directory { path: PathBuf },
}

impl Source {
    /// Returns `true` if the package is not installed from a package index.
    pub fn is_direct(&self) -> bool {
        !matches!(self, Self::Registry | Self::Legacy { .. })
    }

    /// Returns `true` for sources on the local file system.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::File { .. } | Self::Directory { .. })
    }

    /// The URL of the package index this package was locked from, if it isn't the default one.
    pub fn index_url(&self) -> Option<&Url> {
        match self {
            Self::Legacy { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Returns `true` if a direct reference in a project manifest points at this source.
    pub fn satisfies(&self, requested: &RequirementSource) -> bool {
        match (self, requested) {
            (Self::Git(git), RequirementSource::Git { url, .. }) => {
                strip_git_suffix(&git.url) == strip_git_suffix(url)
            }
            (Self::Url { url, .. }, RequirementSource::Url { url: requested }) => {
                url.as_str() == requested.as_str()
            }
            (
                Self::File { path, .. } | Self::Directory { path },
                RequirementSource::Path { path: requested, .. },
            ) => lexical_components(path).eq(lexical_components(requested)),
            _ => false,
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry => f.write_str("registry"),
            Self::Legacy { name, url } => write!(f, "{name} ({url})"),
            Self::Git(git) => write!(f, "{}", git.to_pep508_url()),
            Self::Url { url, .. } => write!(f, "{url}"),
            Self::File { path, .. } | Self::Directory { path } => {
                write!(f, "{}", path.display())
            }
        }
    }
}

/// A Git repository at a locked commit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GitSource {
    /// The repository URL, as written in the lock file.
    pub url: String,
    /// The requested branch, tag or revision.
    pub reference: Option<String>,
    /// The commit the reference resolved to.
    pub resolved_reference: Option<String>,
    pub subdirectory: Option<String>,
}

impl GitSource {
    /// The repository URL with a `git+` scheme prefix.
    ///
    /// SCP-like locations (`git@github.com:org/repo.git`) are rewritten to `ssh://` URLs.
    pub fn repository_url(&self) -> String {
        let url = self.url.as_str();
        if url.starts_with("git+") {
            url.to_string()
        } else if url.contains("://") {
            format!("git+{url}")
        } else if let Some((host, path)) = url.split_once(':') {
            format!("git+ssh://{host}/{path}")
        } else {
            format!("git+{url}")
        }
    }

    /// Render as a PEP 508 direct reference, pinned to the resolved commit where known.
    ///
    /// For example, `git+https://github.com/org/repo.git@1a2b3c#subdirectory=lib`.
    pub fn to_pep508_url(&self) -> String {
        let mut url = self.repository_url();
        if let Some(reference) = self
            .resolved_reference
            .as_deref()
            .or(self.reference.as_deref())
        {
            url.push('@');
            url.push_str(reference);
        }
        if let Some(subdirectory) = &self.subdirectory {
            url.push_str("#subdirectory=");
            url.push_str(subdirectory);
        }
        url
    }
}

fn strip_git_suffix(url: &str) -> &str {
    let url = url.strip_prefix("git+").unwrap_or(url);
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

/// Path components without `.` segments.
fn lexical_components(path: &Path) -> impl Iterator<Item = Component<'_>> {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
}
