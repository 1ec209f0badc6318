use std::collections::BTreeSet;

use itertools::Itertools;
use tracing::debug;

use lockex_lock::{PackageSource, Source, SourcePriority};
use lockex_warnings::warn_user;

use crate::export::{ExportOptions, file_url};
use crate::{ExportError, Resolution, ResolvedDependency};

/// The two flavors of pip requirement files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxtFlavor {
    /// Requirements may carry extras and be editable.
    Requirements,
    /// Constraints name packages without extras and can't be editable.
    Constraints,
}

/// An export of a [`Resolution`] that renders in `requirements.txt` or `constraints.txt` format.
#[derive(Debug)]
pub(crate) struct RequirementsTxtExport<'a, 'lock> {
    resolution: &'a Resolution<'lock>,
    sources: &'a [PackageSource],
    options: &'a ExportOptions,
    flavor: TxtFlavor,
}

impl<'a, 'lock> RequirementsTxtExport<'a, 'lock> {
    pub(crate) fn new(
        resolution: &'a Resolution<'lock>,
        sources: &'a [PackageSource],
        options: &'a ExportOptions,
        flavor: TxtFlavor,
    ) -> Self {
        Self {
            resolution,
            sources,
            options,
            flavor,
        }
    }

    pub(crate) fn render(&self) -> Result<String, ExportError> {
        let mut lines = BTreeSet::new();
        let mut indexes = BTreeSet::new();

        for dependency in self.resolution.iter() {
            let package = dependency.package;
            if package.develop() && self.flavor == TxtFlavor::Constraints {
                warn_user!(
                    "{} is locked in develop (editable) mode, which is incompatible with the constraints.txt format.",
                    package.name()
                );
                continue;
            }

            let mut line = self.requirement(dependency)?;

            if self.options.markers
                && let Some(contents) = dependency.condition.contents()
            {
                line.push_str(&format!(" ; {contents}"));
            }

            if let Some(url) = package.source().index_url() {
                indexes.insert(url.as_str().trim_end_matches('/').to_string());
            }

            if self.options.hashes {
                let hashes = package
                    .files()
                    .iter()
                    .map(|file| &file.hash)
                    .filter(|hash| hash.algorithm.is_exportable())
                    .sorted()
                    .dedup();
                for hash in hashes {
                    line.push_str(&format!(" \\\n    --hash={hash}"));
                }
            }

            lines.insert(line);
        }

        let mut content = String::new();
        if self.options.urls && !indexes.is_empty() {
            content.push_str(&self.index_options(&indexes));
            content.push('\n');
        }
        content.push_str(&lines.iter().join("\n"));
        content.push('\n');
        Ok(content)
    }

    /// The requirement for a package, without markers or hashes.
    fn requirement(&self, dependency: &ResolvedDependency) -> Result<String, ExportError> {
        let package = dependency.package;
        let name = package.name();
        let extras = match self.flavor {
            TxtFlavor::Requirements if !dependency.extras.is_empty() => {
                format!("[{}]", dependency.extras.iter().join(","))
            }
            _ => String::new(),
        };

        Ok(match package.source() {
            Source::Registry | Source::Legacy { .. } => {
                format!("{name}{extras}=={}", package.version())
            }
            Source::Git(git) => format!("{name} @ {}", git.to_pep508_url()),
            Source::Url { url, subdirectory } => match subdirectory {
                Some(subdirectory) => format!("{name} @ {url}#subdirectory={subdirectory}"),
                None => format!("{name} @ {url}"),
            },
            Source::Directory { path } if package.develop() => {
                format!("-e {}", file_url(&self.options.project_root, path)?)
            }
            Source::File { path, .. } | Source::Directory { path } => {
                format!(
                    "{name}{extras} @ {}",
                    file_url(&self.options.project_root, path)?
                )
            }
        })
    }

    /// `--index-url`, `--extra-index-url` and `--trusted-host` options for the package indexes
    /// that packages were locked from, highest priority first.
    fn index_options(&self, indexes: &BTreeSet<String>) -> String {
        let sources = self
            .sources
            .iter()
            .sorted_by_key(|source| source.priority)
            .collect::<Vec<_>>();

        // PyPI is implicitly enabled unless a primary source replaces it.
        let has_pypi = self.sources.iter().any(PackageSource::is_pypi)
            || !self.sources.iter().any(|source| {
                matches!(
                    source.priority,
                    SourcePriority::Default | SourcePriority::Primary
                )
            });
        let primary = sources
            .iter()
            .copied()
            .find(|source| source.priority != SourcePriority::Explicit)
            .map(|source| source.name.as_str());

        let mut options = String::new();
        for source in sources {
            let Some(url) = &source.url else {
                continue;
            };
            if !indexes.contains(url.as_str().trim_end_matches('/')) {
                continue;
            }

            let url = match self.options.credentials.get(&source.name) {
                Some(credentials) => {
                    debug!("Embedding credentials for source `{}`", source.name);
                    credentials.apply(url)
                }
                None => url.clone(),
            };

            if url.scheme() == "http"
                && let Some(host) = url.host_str()
            {
                match url.port() {
                    Some(port) => options.push_str(&format!("--trusted-host {host}:{port}\n")),
                    None => options.push_str(&format!("--trusted-host {host}\n")),
                }
            }

            let rendered = url.as_str().trim_end_matches('/');
            if !has_pypi && primary == Some(source.name.as_str()) {
                options.push_str(&format!("--index-url {rendered}\n"));
            } else {
                options.push_str(&format!("--extra-index-url {rendered}\n"));
            }
        }
        options
    }
}
