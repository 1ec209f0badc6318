//! Helpers for running the `lockex` binary in integration tests.
#![allow(clippy::print_stderr)]

use std::borrow::BorrowMut;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use regex::Regex;

use lockex_static::EnvVars;

/// Create a new [`TestContext`] for the `lockex` binary of the calling crate.
#[macro_export]
macro_rules! test_context {
    () => {
        $crate::TestContext::new_with_bin(std::path::PathBuf::from(env!("CARGO_BIN_EXE_lockex")))
    };
}

/// A temporary project directory to run `lockex` in.
pub struct TestContext {
    /// The project directory.
    pub temp_dir: ChildPath,

    /// Path to the lockex binary.
    bin: PathBuf,

    /// Standard filters for this test context.
    filters: Vec<(String, String)>,

    /// The temporary directory the project directory lives in, removed on drop.
    root: assert_fs::TempDir,
}

impl TestContext {
    pub fn new_with_bin(bin: PathBuf) -> Self {
        let root = assert_fs::TempDir::new().expect("Failed to create test root directory");
        let temp_dir = root.child("project");
        temp_dir
            .create_dir_all()
            .expect("Failed to create project directory");

        let mut filters = Vec::new();
        for pattern in Self::path_patterns(root.path()) {
            filters.push((pattern, "[ROOT]/".to_string()));
        }

        Self {
            temp_dir,
            bin,
            filters,
            root,
        }
    }

    /// The directory the project directory lives in.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Write a file into the project directory.
    pub fn write(&self, path: &str, contents: &str) {
        self.temp_dir
            .child(path)
            .write_str(contents)
            .expect("Failed to write test file");
    }

    /// The standard filters for this context, e.g. to replace the temporary directory.
    pub fn filters(&self) -> Vec<(&str, &str)> {
        self.filters
            .iter()
            .map(|(pattern, replacement)| (pattern.as_str(), replacement.as_str()))
            .collect()
    }

    /// Create a `lockex export` command, run in the project directory.
    pub fn export(&self) -> Command {
        let mut command = self.command();
        command.arg("export");
        command
    }

    /// Create a `lockex` command with an isolated environment.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.bin);
        command
            .current_dir(self.temp_dir.path())
            .env(EnvVars::NO_COLOR, "1")
            .env(EnvVars::LOCKEX_NO_WRAP, "1")
            .env_remove(EnvVars::FORCE_COLOR)
            .env_remove(EnvVars::RUST_LOG)
            .env_remove(EnvVars::LOCKEX_FORMAT)
            .env_remove(EnvVars::LOCKEX_OUTPUT)
            .env_remove(EnvVars::LOCKEX_WITHOUT_HASHES)
            .env_remove(EnvVars::LOCKEX_WITHOUT_URLS)
            .env_remove(EnvVars::LOCKEX_PROJECT)
            .env_remove(EnvVars::LOCKEX_CONFIG_FILE)
            .env_remove(EnvVars::LOCKEX_NO_CONFIG);
        command
    }

    /// Regex patterns matching a path, both as given and canonicalized.
    pub fn path_patterns(path: impl AsRef<Path>) -> Vec<String> {
        let mut patterns = Vec::new();

        // We can only canonicalize paths that exist already
        if path.as_ref().exists() {
            patterns.push(Self::path_pattern(
                path.as_ref()
                    .canonicalize()
                    .expect("Failed to create canonical path"),
            ));
        }

        // Include a non-canonicalized version
        patterns.push(Self::path_pattern(path));

        patterns
    }

    /// Generate an escaped regex pattern for the given path.
    fn path_pattern(path: impl AsRef<Path>) -> String {
        format!(
            // Trim the trailing separator for cross-platform directories filters
            r"{}\\?/?",
            regex::escape(&path.as_ref().display().to_string())
                // Make separators platform agnostic because on Windows we will display
                // paths with Unix-style separators sometimes
                .replace(r"\\", r"(\\|\/)")
        )
    }
}

pub fn apply_filters<T: AsRef<str>>(mut snapshot: String, filters: impl AsRef<[(T, T)]>) -> String {
    for (matcher, replacement) in filters.as_ref() {
        let re = Regex::new(matcher.as_ref()).expect("Do you need to regex::escape your filter?");
        if re.is_match(&snapshot) {
            snapshot = re.replace_all(&snapshot, replacement.as_ref()).to_string();
        }
    }
    snapshot
}

/// Execute the command and format its output status, stdout and stderr into a snapshot string.
pub fn run_and_format<T: AsRef<str>>(
    mut command: impl BorrowMut<Command>,
    filters: impl AsRef<[(T, T)]>,
) -> (String, Output) {
    let program = command
        .borrow_mut()
        .get_program()
        .to_string_lossy()
        .to_string();

    let output = command
        .borrow_mut()
        .output()
        .unwrap_or_else(|err| panic!("Failed to spawn {program}: {err}"));

    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━ Unfiltered output ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!(
        "----- stdout -----\n{}\n----- stderr -----\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
    eprintln!("────────────────────────────────────────────────────────────────────────────────\n");

    let snapshot = apply_filters(
        format!(
            "success: {:?}\nexit_code: {}\n----- stdout -----\n{}\n----- stderr -----\n{}",
            output.status.success(),
            output.status.code().unwrap_or(!0),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ),
        filters,
    );

    (snapshot, output)
}

/// Run a command and snapshot its exit status, stdout and stderr, with the context's filters.
#[macro_export]
macro_rules! lockex_snapshot {
    ($filters:expr, $spawnable:expr, @$snapshot:literal) => {{
        let (snapshot, output) = $crate::run_and_format($spawnable, &$filters);
        ::insta::assert_snapshot!(snapshot, @$snapshot);
        output
    }};
}
