/// Declares all environment variable used throughout `lockex` and its crates.
pub struct EnvVars;

impl EnvVars {
    /// Equivalent to the `--format` command-line argument. For example, if set to
    /// `constraints.txt`, lockex will export in the `constraints.txt` format.
    pub const LOCKEX_FORMAT: &'static str = "LOCKEX_FORMAT";

    /// Equivalent to the `--output` command-line argument. If set, lockex will write the
    /// export to this file instead of standard output.
    pub const LOCKEX_OUTPUT: &'static str = "LOCKEX_OUTPUT";

    /// Equivalent to the `--without-hashes` command-line argument. If set, lockex will omit
    /// `--hash` annotations from the export.
    pub const LOCKEX_WITHOUT_HASHES: &'static str = "LOCKEX_WITHOUT_HASHES";

    /// Equivalent to the `--without-urls` command-line argument. If set, lockex will omit the
    /// index URL preamble from the export.
    pub const LOCKEX_WITHOUT_URLS: &'static str = "LOCKEX_WITHOUT_URLS";

    /// Equivalent to the `--project` command-line argument.
    pub const LOCKEX_PROJECT: &'static str = "LOCKEX_PROJECT";

    /// Equivalent to the `--config-file` command-line argument. Expects a path to a
    /// local `lockex.toml` file to use as the configuration file.
    pub const LOCKEX_CONFIG_FILE: &'static str = "LOCKEX_CONFIG_FILE";

    /// Equivalent to the `--no-config` command-line argument. If set, lockex will not read any
    /// configuration files from the current directory or `pyproject.toml`.
    pub const LOCKEX_NO_CONFIG: &'static str = "LOCKEX_NO_CONFIG";

    /// Prefix of the username used with `--with-credentials` for a package source, e.g.
    /// `LOCKEX_HTTP_BASIC_FOO_USERNAME` for a source named `foo`.
    pub const LOCKEX_HTTP_BASIC_PREFIX: &'static str = "LOCKEX_HTTP_BASIC_";

    /// Disables line wrapping for diagnostics.
    pub const LOCKEX_NO_WRAP: &'static str = "LOCKEX_NO_WRAP";

    /// Used to set the terminal width for wrapping diagnostics.
    pub const COLUMNS: &'static str = "COLUMNS";

    /// If set to `1`, forces colored output.
    pub const FORCE_COLOR: &'static str = "FORCE_COLOR";

    /// Disables colored output (takes precedence over `FORCE_COLOR`).
    pub const NO_COLOR: &'static str = "NO_COLOR";

    /// If set, lockex will use this value as the log level for its `--verbose` output.
    pub const RUST_LOG: &'static str = "RUST_LOG";
}
