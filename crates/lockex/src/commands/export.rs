use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use tracing::debug;

use lockex_export::{Credentials, ExportError, ExportOptions, Exporter};
use lockex_lock::{Lock, PackageSource, ProjectManifest};
use lockex_static::EnvVars;
use lockex_warnings::write_error_chain;

use crate::commands::{ExitStatus, OutputWriter};
use crate::printer::Printer;
use crate::settings::ExportSettings;

/// Export the project's `poetry.lock` in an alternate format.
pub(crate) fn export(settings: ExportSettings, printer: Printer) -> Result<ExitStatus> {
    let ExportSettings {
        format,
        output,
        hashes,
        urls,
        markers,
        with_credentials,
        groups,
        extras,
        project,
        lock,
    } = settings;

    let project_dir = std::path::absolute(project.as_deref().unwrap_or(Path::new(".")))?;
    let pyproject = project_dir.join("pyproject.toml");
    let manifest = ProjectManifest::read(&pyproject)
        .with_context(|| format!("Failed to read `{}`", pyproject.display()))?;

    let lock_path = lock.unwrap_or_else(|| project_dir.join("poetry.lock"));
    if !lock_path.try_exists()? {
        bail!(
            "`{}` not found; run `{}` to create it",
            lock_path.display(),
            "poetry lock".green()
        );
    }
    let lock = Lock::read(&lock_path)
        .with_context(|| format!("Failed to read `{}`", lock_path.display()))?;

    let output_dir = match output
        .as_deref()
        .and_then(Path::parent)
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        Some(parent) => std::path::absolute(parent)?,
        None => std::path::absolute(".")?,
    };
    let options = ExportOptions {
        hashes,
        urls,
        markers,
        credentials: if with_credentials {
            credentials(manifest.sources())
        } else {
            BTreeMap::new()
        },
        project_root: project_dir,
        output_dir,
    };

    debug!("Exporting `{}` as {format}", lock_path.display());
    let exporter = Exporter::new(&lock, &manifest, groups.with_main(), extras);
    let export = match exporter.export(format, &options) {
        Ok(export) => export,
        Err(
            err @ (ExportError::InvalidExtra(_)
            | ExportError::MissingGroups(_)
            | ExportError::DependencyWalk(_)),
        ) => {
            let mut message = String::new();
            write_error_chain(&err, &mut message)?;
            anstream::eprint!("{message}");
            return Ok(ExitStatus::Failure);
        }
        Err(err) => return Err(err.into()),
    };

    // Write the export to standard output, unless a file was requested.
    let mut writer = OutputWriter::new(output.is_none(), output.as_deref());
    write!(writer, "{export}")?;
    writer.commit()?;

    if let Some(output) = &output {
        writeln!(
            printer.stderr(),
            "Exported to `{}`",
            output.display().cyan()
        )?;
    }

    Ok(ExitStatus::Success)
}

/// HTTP basic credentials for the project's package sources, read from
/// `LOCKEX_HTTP_BASIC_<SOURCE>_USERNAME` and `LOCKEX_HTTP_BASIC_<SOURCE>_PASSWORD`.
fn credentials(sources: &[PackageSource]) -> BTreeMap<String, Credentials> {
    let mut credentials = BTreeMap::new();
    for source in sources {
        let prefix = format!(
            "{}{}",
            EnvVars::LOCKEX_HTTP_BASIC_PREFIX,
            env_var_segment(&source.name)
        );
        let Ok(username) = std::env::var(format!("{prefix}_USERNAME")) else {
            continue;
        };
        debug!("Found credentials for source `{}`", source.name);
        credentials.insert(
            source.name.clone(),
            Credentials {
                username,
                password: std::env::var(format!("{prefix}_PASSWORD")).ok(),
            },
        );
    }
    credentials
}

/// `my-repo.internal` becomes `MY_REPO_INTERNAL`.
fn env_var_segment(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::env_var_segment;

    #[test]
    fn source_env_var() {
        assert_eq!(env_var_segment("my-repo.internal"), "MY_REPO_INTERNAL");
        assert_eq!(env_var_segment("foo"), "FOO");
    }
}
