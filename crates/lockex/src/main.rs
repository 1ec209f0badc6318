use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use lockex_cli::{Cli, Commands};
use lockex_settings::FilesystemOptions;
use lockex_warnings::write_error_chain;

use crate::commands::ExitStatus;
use crate::printer::{Printer, Stderr};
use crate::settings::{ExportSettings, GlobalSettings};

mod commands;
mod logging;
mod printer;
mod settings;

fn run(cli: Cli) -> Result<ExitStatus> {
    let globals = GlobalSettings::resolve(&cli.top_level.global_args);

    // Configure the `anstream` crate, which controls colored output.
    anstream::ColorChoice::write_global(globals.color.into());

    // Configure the `tracing` crate, which controls internal logging.
    logging::setup_logging(logging::Level::from(globals.verbose))?;

    // Configure the `Printer`, which controls user-facing output in the CLI.
    let printer = if globals.quiet {
        Printer::Quiet
    } else if globals.verbose > 0 {
        Printer::Verbose
    } else {
        Printer::Default
    };

    // Configure the `warn!` macros, which control user-facing warnings in the CLI.
    if globals.quiet {
        lockex_warnings::disable();
    } else {
        lockex_warnings::enable();
    }

    match *cli.command {
        Commands::Export(args) => {
            // Settings are discovered from the project directory, not the working directory.
            let project_dir = std::path::absolute(
                args.project
                    .clone()
                    .unwrap_or_else(|| std::path::PathBuf::from(".")),
            )?;
            let filesystem = if cli.top_level.no_config {
                None
            } else if let Some(config_file) = cli.top_level.config_file.as_ref() {
                Some(FilesystemOptions::from_file(config_file)?)
            } else {
                FilesystemOptions::find(&project_dir)?
            };
            debug!("Resolved configuration: {filesystem:?}");

            let settings = ExportSettings::resolve(args, filesystem)?;
            commands::export(settings, printer)
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    match run(cli) {
        Ok(code) => code.into(),
        Err(err) => {
            // Errors are shown even with `--quiet`.
            if write_error_chain(err.as_ref(), Stderr::Enabled).is_err() {
                anstream::eprintln!("error: {err}");
            }
            ExitStatus::Error.into()
        }
    }
}
