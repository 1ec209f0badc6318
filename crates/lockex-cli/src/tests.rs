use clap::{CommandFactory, Parser};
use insta::assert_snapshot;

use lockex_configuration::ExportFormat;

use super::{Cli, Commands, ExportArgs};

fn export_args(args: &[&str]) -> ExportArgs {
    let cli = Cli::try_parse_from(["lockex", "export"].iter().chain(args)).unwrap();
    match *cli.command {
        Commands::Export(args) => args,
    }
}

#[test]
fn verify_cli() {
    Cli::command().debug_assert();
}

#[test]
fn format() {
    let args = export_args(&["-f", "constraints.txt", "-o", "constraints.txt"]);
    assert_eq!(args.format, Some(ExportFormat::ConstraintsTxt));
    assert_eq!(
        args.output.as_deref(),
        Some(std::path::Path::new("constraints.txt"))
    );
}

#[test]
fn groups() {
    let args = export_args(&["--with", "dev,docs", "--without", "lint", "--only", "main"]);
    assert_eq!(
        args.with.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ["dev", "docs"]
    );
    assert_eq!(args.without.len(), 1);
    assert_eq!(args.only.len(), 1);
}

#[test]
fn extras() {
    let args = export_args(&["-E", "socks tls", "--extras", "Foo_Bar"]);
    let extras = args.extra_names().unwrap();
    assert_eq!(
        extras.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ["socks", "tls", "foo-bar"]
    );
}

#[test]
fn conflicting_extras() {
    let err = Cli::try_parse_from(["lockex", "export", "-E", "socks", "--all-extras"])
        .err()
        .unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[test]
fn conflicting_groups() {
    let err = Cli::try_parse_from(["lockex", "export", "--with", "dev", "--all-groups"])
        .err()
        .unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
}

#[test]
fn invalid_group() {
    let err = Cli::try_parse_from(["lockex", "export", "--with", "dev!"])
        .err()
        .unwrap();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
}

#[test]
fn invalid_extra() {
    let args = export_args(&["-E", "ok bad!"]);
    assert_snapshot!(args.extra_names().unwrap_err(), @"Extra names must start and end with a letter or digit and may only contain -, _, ., and alphanumeric characters, found `bad!`");
}
