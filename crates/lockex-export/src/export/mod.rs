//! Renderers for a [`Resolution`](crate::Resolution).

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::ExportError;

pub(crate) use pylock_toml::PylockTomlExport;
pub(crate) use requirements_txt::{RequirementsTxtExport, TxtFlavor};

mod pylock_toml;
mod requirements_txt;

/// Options shared by every export format.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Include `--hash` options.
    pub hashes: bool,
    /// Include `--index-url` and `--extra-index-url` options for package sources.
    pub urls: bool,
    /// Include environment markers.
    pub markers: bool,
    /// Credentials to embed in index URLs, keyed by source name.
    pub credentials: BTreeMap<String, Credentials>,
    /// The directory containing the project, against which locked paths are resolved.
    pub project_root: PathBuf,
    /// The directory the export is written to, against which paths in `pylock.toml` are
    /// relativized.
    pub output_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            hashes: true,
            urls: true,
            markers: true,
            credentials: BTreeMap::new(),
            project_root: PathBuf::from("."),
            output_dir: PathBuf::from("."),
        }
    }
}

/// HTTP basic credentials for a package source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    /// Embed the credentials in a URL.
    pub fn apply(&self, url: &Url) -> Url {
        let mut authenticated = url.clone();
        // Cannot-be-a-base URLs don't take credentials; leave them untouched.
        if authenticated.set_username(&self.username).is_err() {
            return url.clone();
        }
        if authenticated.set_password(self.password.as_deref()).is_err() {
            return url.clone();
        }
        authenticated
    }
}

/// Resolve a locked path against the project root, without touching the file system.
pub(crate) fn absolute_path(project_root: &Path, path: &Path) -> PathBuf {
    normalize_path(&project_root.join(path))
}

/// A `file://` URL for a locked path.
pub(crate) fn file_url(project_root: &Path, path: &Path) -> Result<Url, ExportError> {
    let path = absolute_path(project_root, path);
    Url::from_file_path(&path).map_err(|()| ExportError::PathToUrl(path))
}

/// Render a path relative to `base` if it is inside it, with forward slashes.
pub(crate) fn relative_to(path: &Path, base: &Path) -> String {
    let base = normalize_path(base);
    let path = path.strip_prefix(&base).unwrap_or(path);
    portable(path)
}

/// Normalize a path, removing things like `.` and `..`.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().copied() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

/// Render a path with `/` separators.
fn portable(path: &Path) -> String {
    let mut rendered = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => rendered.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => rendered.push('/'),
            Component::CurDir => {}
            Component::ParentDir => {
                push_segment(&mut rendered, "..");
            }
            Component::Normal(segment) => {
                push_segment(&mut rendered, &segment.to_string_lossy());
            }
        }
    }
    if rendered.is_empty() {
        rendered.push('.');
    }
    rendered
}

fn push_segment(rendered: &mut String, segment: &str) {
    if !rendered.is_empty() && !rendered.ends_with('/') {
        rendered.push('/');
    }
    rendered.push_str(segment);
}
