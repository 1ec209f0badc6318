use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Args, Parser, Subcommand};

use lockex_configuration::ExportFormat;
use lockex_normalize::{ExtraName, GroupName};
use lockex_static::EnvVars;

fn group_name_with_clap_error(arg: &str) -> Result<GroupName> {
    GroupName::from_str(arg).map_err(|_err| {
        anyhow!(
            "Group names must start and end with a letter or digit and may only \
            contain -, _, ., and alphanumeric characters"
        )
    })
}

// Configures Clap v3-style help menu colors
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser)]
#[command(name = "lockex", author, version)]
#[command(about = "Export a Poetry lock file to other formats.")]
#[command(propagate_version = true)]
#[command(styles=STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Box<Commands>,

    #[command(flatten)]
    pub top_level: TopLevelArgs,
}

#[derive(Args)]
pub struct TopLevelArgs {
    #[command(flatten)]
    pub global_args: Box<GlobalArgs>,

    /// The path to a `lockex.toml` file to use for configuration.
    #[arg(
        global = true,
        long,
        env = EnvVars::LOCKEX_CONFIG_FILE,
        help_heading = "Global options"
    )]
    pub config_file: Option<PathBuf>,

    /// Avoid discovering configuration files (`pyproject.toml`, `lockex.toml`).
    #[arg(global = true, long, env = EnvVars::LOCKEX_NO_CONFIG, value_parser = clap::builder::BoolishValueParser::new(), help_heading = "Global options")]
    pub no_config: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Global options", next_display_order = 1000)]
pub struct GlobalArgs {
    /// Do not print any output.
    #[arg(global = true, long, short, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Use verbose output.
    ///
    /// You can configure fine-grained logging using the `RUST_LOG` environment variable.
    /// (<https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives>)
    #[arg(global = true, action = clap::ArgAction::Count, long, short, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Disable colors.
    #[arg(global = true, long, hide = true, conflicts_with = "color")]
    pub no_color: bool,

    /// Control the use of color in output.
    ///
    /// By default, lockex will automatically detect support for colors when writing to a terminal.
    #[arg(
        global = true,
        long,
        value_enum,
        conflicts_with = "no_color",
        value_name = "COLOR_CHOICE"
    )]
    pub color: Option<ColorChoice>,
}

#[derive(Debug, Copy, Clone, clap::ValueEnum)]
pub enum ColorChoice {
    /// Enables colored output only when the output is going to a terminal or TTY with support.
    Auto,

    /// Enables colored output regardless of the detected environment.
    Always,

    /// Disables colored output.
    Never,
}

impl From<ColorChoice> for anstream::ColorChoice {
    fn from(value: ColorChoice) -> Self {
        match value {
            ColorChoice::Auto => Self::Auto,
            ColorChoice::Always => Self::Always,
            ColorChoice::Never => Self::Never,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the lock file to an alternative format.
    ///
    /// The lock file is read as-is; run `poetry lock` first if it is out of date.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExportArgs {
    /// The format to which `poetry.lock` should be exported.
    #[arg(long, short, value_enum, env = EnvVars::LOCKEX_FORMAT)]
    pub format: Option<ExportFormat>,

    /// Write the export to the given file instead of standard output.
    #[arg(long, short, env = EnvVars::LOCKEX_OUTPUT)]
    pub output: Option<PathBuf>,

    /// Exclude hashes from the exported file.
    #[arg(long, env = EnvVars::LOCKEX_WITHOUT_HASHES, value_parser = clap::builder::BoolishValueParser::new())]
    pub without_hashes: bool,

    /// Exclude source repository URLs from the exported file.
    #[arg(long, env = EnvVars::LOCKEX_WITHOUT_URLS, value_parser = clap::builder::BoolishValueParser::new())]
    pub without_urls: bool,

    /// Include credentials for extra indices.
    ///
    /// Credentials are read from `LOCKEX_HTTP_BASIC_<SOURCE>_USERNAME` and
    /// `LOCKEX_HTTP_BASIC_<SOURCE>_PASSWORD`.
    #[arg(long)]
    pub with_credentials: bool,

    /// Exclude environment markers from the exported file.
    #[arg(long)]
    pub without_markers: bool,

    /// Include development dependencies.
    #[arg(long, hide = true)]
    pub dev: bool,

    /// The optional dependency groups to include.
    ///
    /// May be provided more than once, or as a comma-separated list.
    #[arg(long, value_delimiter = ',', conflicts_with = "all_groups", value_parser = group_name_with_clap_error)]
    pub with: Vec<GroupName>,

    /// The dependency groups to ignore.
    ///
    /// May be provided more than once, or as a comma-separated list.
    #[arg(long, value_delimiter = ',', conflicts_with = "all_groups", value_parser = group_name_with_clap_error)]
    pub without: Vec<GroupName>,

    /// The only dependency groups to include.
    ///
    /// May be provided more than once, or as a comma-separated list.
    #[arg(long, value_delimiter = ',', conflicts_with = "all_groups", value_parser = group_name_with_clap_error)]
    pub only: Vec<GroupName>,

    /// Include all dependency groups.
    #[arg(long)]
    pub all_groups: bool,

    /// Extra sets of dependencies to include.
    ///
    /// May be provided more than once, or as a space-separated list.
    #[arg(long, short = 'E', conflicts_with = "all_extras")]
    pub extras: Vec<String>,

    /// Include all sets of extra dependencies.
    #[arg(long)]
    pub all_extras: bool,

    /// The project directory containing `pyproject.toml`.
    ///
    /// Defaults to the current working directory.
    #[arg(long, short = 'C', env = EnvVars::LOCKEX_PROJECT)]
    pub project: Option<PathBuf>,

    /// The lock file to export.
    ///
    /// Defaults to `poetry.lock` in the project directory.
    #[arg(long)]
    pub lock: Option<PathBuf>,
}

impl ExportArgs {
    /// The extras requested with `--extras`, split on whitespace and commas.
    pub fn extra_names(&self) -> Result<Vec<ExtraName>> {
        self.extras
            .iter()
            .flat_map(|extras| extras.split(|c: char| c.is_whitespace() || c == ','))
            .filter(|extra| !extra.is_empty())
            .map(|extra| {
                ExtraName::from_str(extra).map_err(|_err| {
                    anyhow!(
                        "Extra names must start and end with a letter or digit and may only \
                        contain -, _, ., and alphanumeric characters, found `{extra}`"
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
