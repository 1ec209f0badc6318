use std::ops::Deref;
use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use tracing::debug;

use lockex_warnings::warn_user;

pub use crate::combine::*;
pub use crate::settings::*;

mod combine;
mod settings;

/// The [`Options`] as loaded from configuration files on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesystemOptions(Options);

impl FilesystemOptions {
    /// Convert the [`FilesystemOptions`] into [`Options`].
    pub fn into_options(self) -> Options {
        self.0
    }
}

impl Deref for FilesystemOptions {
    type Target = Options;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FilesystemOptions {
    /// Find the [`FilesystemOptions`] for the given path.
    ///
    /// The search starts at the given path and goes up the directory tree until a `lockex.toml`
    /// file or a `pyproject.toml` file with a `[tool.lockex]` section is found.
    pub fn find(path: &Path) -> Result<Option<Self>, Error> {
        for ancestor in path.ancestors() {
            match Self::from_directory(ancestor) {
                Ok(Some(options)) => {
                    return Ok(Some(options));
                }
                Ok(None) => {
                    // Continue traversing the directory tree.
                }
                Err(Error::PyprojectToml(path, err)) => {
                    // If we see an invalid `pyproject.toml`, warn but continue.
                    warn_user!(
                        "Failed to parse `{}` during settings discovery:\n{}",
                        path.display().cyan(),
                        textwrap::indent(&err.to_string(), "  ")
                    );
                }
                Err(err) => {
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Load a [`FilesystemOptions`] from a directory.
    ///
    /// Settings in a `lockex.toml` file take precedence over the `[tool.lockex]` section of a
    /// `pyproject.toml` file in the same directory.
    pub fn from_directory(dir: &Path) -> Result<Option<Self>, Error> {
        let path = dir.join("lockex.toml");
        let file = match fs_err::read_to_string(&path) {
            Ok(content) => {
                let options = toml::from_str::<Options>(&content)
                    .map_err(|err| Error::LockexToml(path.clone(), Box::new(err)))?;
                debug!("Found configuration at `{}`", path.display());
                Some(options)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        let path = dir.join("pyproject.toml");
        let project = match fs_err::read_to_string(&path) {
            Ok(content) => {
                let pyproject: PyProjectToml = toml::from_str(&content)
                    .map_err(|err| Error::PyprojectToml(path.clone(), Box::new(err)))?;
                let options = pyproject.tool.and_then(|tool| tool.lockex);
                if options.is_some() {
                    debug!("Found configuration at `{}`", path.display());
                } else {
                    debug!(
                        "Skipping `pyproject.toml` in `{}` (no `[tool.lockex]` section)",
                        dir.display()
                    );
                }
                options
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };

        Ok(file.combine(project).map(Self))
    }

    /// Load a [`FilesystemOptions`] from a `lockex.toml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        debug!("Reading configuration from: `{}`", path.display());

        let content = fs_err::read_to_string(path)?;
        let options = toml::from_str::<Options>(&content)
            .map_err(|err| Error::LockexToml(path.to_path_buf(), Box::new(err)))?;
        Ok(Self(options))
    }
}

impl From<Options> for FilesystemOptions {
    fn from(options: Options) -> Self {
        Self(options)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse: `{}`", .0.display())]
    PyprojectToml(PathBuf, #[source] Box<toml::de::Error>),

    #[error("Failed to parse: `{}`", .0.display())]
    LockexToml(PathBuf, #[source] Box<toml::de::Error>),
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use insta::assert_snapshot;

    use lockex_configuration::ExportFormat;

    use super::{Combine, Error, FilesystemOptions, Options};

    #[test]
    fn combine_prefers_self() {
        let cli = Options {
            hashes: Some(false),
            ..Options::default()
        };
        let file = Options {
            format: Some(ExportFormat::PylockToml),
            hashes: Some(true),
            ..Options::default()
        };
        assert_eq!(
            cli.combine(file),
            Options {
                format: Some(ExportFormat::PylockToml),
                hashes: Some(false),
                ..Options::default()
            }
        );
    }

    #[test]
    fn lockex_toml_over_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(
            dir.path().join("pyproject.toml"),
            indoc! {r#"
                [tool.poetry]
                name = "project"

                [tool.lockex]
                format = "constraints.txt"
                urls = false
            "#},
        )
        .unwrap();
        fs_err::write(dir.path().join("lockex.toml"), "format = \"pylock.toml\"\n").unwrap();

        let options = FilesystemOptions::from_directory(dir.path())
            .unwrap()
            .unwrap()
            .into_options();
        assert_eq!(
            options,
            Options {
                format: Some(ExportFormat::PylockToml),
                urls: Some(false),
                ..Options::default()
            }
        );
    }

    #[test]
    fn find_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src").join("package");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::write(dir.path().join("lockex.toml"), "markers = false\n").unwrap();

        let options = FilesystemOptions::find(&nested).unwrap().unwrap();
        assert_eq!(options.markers, Some(false));
    }

    #[test]
    fn pyproject_without_section() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::write(
            dir.path().join("pyproject.toml"),
            "[tool.poetry]\nname = \"project\"\n",
        )
        .unwrap();
        assert_eq!(FilesystemOptions::from_directory(dir.path()).unwrap(), None);
    }

    #[test]
    fn unknown_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockex.toml");
        fs_err::write(&path, "without-hashes = true\n").unwrap();

        let err = FilesystemOptions::from_file(&path).unwrap_err();
        let Error::LockexToml(_, source) = err else {
            panic!("expected a parse error, got {err:?}");
        };
        assert_snapshot!(source.message(), @"unknown field `without-hashes`, expected one of `format`, `hashes`, `urls`, `markers`, `with-credentials`");
    }
}
