use std::path::PathBuf;

use anyhow::Result;

use lockex_cli::{ColorChoice, ExportArgs, GlobalArgs};
use lockex_configuration::{DependencyGroups, ExportFormat, ExtrasSpecification};
use lockex_settings::{Combine, FilesystemOptions};
use lockex_static::EnvVars;

/// The resolved global settings to use for any invocation of the CLI.
#[derive(Debug, Clone)]
pub(crate) struct GlobalSettings {
    pub(crate) quiet: bool,
    pub(crate) verbose: u8,
    pub(crate) color: ColorChoice,
}

impl GlobalSettings {
    /// Resolve the [`GlobalSettings`] from the CLI.
    pub(crate) fn resolve(args: &GlobalArgs) -> Self {
        Self {
            quiet: args.quiet,
            verbose: args.verbose,
            color: if let Some(color_choice) = args.color {
                // If `--color` is passed explicitly, use its value.
                color_choice
            } else if args.no_color
                || std::env::var_os(EnvVars::NO_COLOR)
                    .filter(|v| !v.is_empty())
                    .is_some()
            {
                // If `--no-color` or `NO_COLOR` is set, disable color output.
                ColorChoice::Never
            } else if std::env::var_os(EnvVars::FORCE_COLOR)
                .filter(|v| !v.is_empty())
                .is_some()
            {
                // If `FORCE_COLOR` is set, always enable color output.
                ColorChoice::Always
            } else {
                ColorChoice::Auto
            },
        }
    }
}

/// The resolved settings to use for a `export` invocation.
#[derive(Debug, Clone)]
pub(crate) struct ExportSettings {
    pub(crate) format: ExportFormat,
    pub(crate) output: Option<PathBuf>,
    pub(crate) hashes: bool,
    pub(crate) urls: bool,
    pub(crate) markers: bool,
    pub(crate) with_credentials: bool,
    pub(crate) groups: DependencyGroups,
    pub(crate) extras: ExtrasSpecification,
    pub(crate) project: Option<PathBuf>,
    pub(crate) lock: Option<PathBuf>,
}

impl ExportSettings {
    /// Resolve the [`ExportSettings`] from the CLI and filesystem configuration.
    ///
    /// Flags on the command line (and their environment variables) take precedence over the
    /// configuration files.
    pub(crate) fn resolve(args: ExportArgs, filesystem: Option<FilesystemOptions>) -> Result<Self> {
        let extra_names = args.extra_names()?;
        let ExportArgs {
            format,
            output,
            without_hashes,
            without_urls,
            with_credentials,
            without_markers,
            dev,
            with,
            without,
            only,
            all_groups,
            extras: _,
            all_extras,
            project,
            lock,
        } = args;

        let options = filesystem
            .map(FilesystemOptions::into_options)
            .unwrap_or_default();

        Ok(Self {
            format: format.combine(options.format).unwrap_or_default(),
            output,
            hashes: disabled(without_hashes)
                .combine(options.hashes)
                .unwrap_or(true),
            urls: disabled(without_urls).combine(options.urls).unwrap_or(true),
            markers: disabled(without_markers)
                .combine(options.markers)
                .unwrap_or(true),
            with_credentials: enabled(with_credentials)
                .combine(options.with_credentials)
                .unwrap_or(false),
            groups: DependencyGroups::from_args(dev, with, without, only, all_groups),
            extras: ExtrasSpecification::from_args(extra_names, all_extras),
            project,
            lock,
        })
    }
}

/// A `--without-*` flag, which can only switch a setting off.
fn disabled(flag: bool) -> Option<bool> {
    flag.then_some(false)
}

/// A `--with-*` flag, which can only switch a setting on.
fn enabled(flag: bool) -> Option<bool> {
    flag.then_some(true)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use lockex_cli::{Cli, Commands};
    use lockex_configuration::ExportFormat;
    use lockex_settings::{FilesystemOptions, Options};

    use super::ExportSettings;

    fn resolve(args: &[&str], options: Options) -> ExportSettings {
        let cli = Cli::try_parse_from(["lockex", "export"].iter().chain(args)).unwrap();
        let Commands::Export(args) = *cli.command;
        ExportSettings::resolve(args, Some(FilesystemOptions::from(options))).unwrap()
    }

    #[test]
    fn defaults() {
        let settings = resolve(&[], Options::default());
        assert_eq!(settings.format, ExportFormat::RequirementsTxt);
        assert!(settings.hashes);
        assert!(settings.urls);
        assert!(settings.markers);
        assert!(!settings.with_credentials);
    }

    #[test]
    fn cli_over_files() {
        let options = Options {
            format: Some(ExportFormat::ConstraintsTxt),
            hashes: Some(true),
            markers: Some(false),
            ..Options::default()
        };
        let settings = resolve(&["--format", "pylock.toml", "--without-hashes"], options);
        assert_eq!(settings.format, ExportFormat::PylockToml);
        assert!(!settings.hashes);
        assert!(!settings.markers);
    }
}
