use serde::Deserialize;

use lockex_configuration::ExportFormat;

/// A `pyproject.toml` with an (optional) `[tool.lockex]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PyProjectToml {
    pub(crate) tool: Option<Tools>,
}

/// A `[tool]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Tools {
    pub(crate) lockex: Option<Options>,
}

/// A `[tool.lockex]` section, or the contents of a `lockex.toml` file.
///
/// ```toml
/// format = "constraints.txt"
/// hashes = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    /// The format to export the lock file in.
    pub format: Option<ExportFormat>,
    /// Include `--hash` options in `requirements.txt` and `constraints.txt` exports.
    ///
    /// Defaults to `true`.
    pub hashes: Option<bool>,
    /// Include the `--index-url`, `--extra-index-url` and `--trusted-host` preamble.
    ///
    /// Defaults to `true`.
    pub urls: Option<bool>,
    /// Include environment markers.
    ///
    /// Defaults to `true`.
    pub markers: Option<bool>,
    /// Embed HTTP basic credentials in index URLs.
    ///
    /// Credentials are read from `LOCKEX_HTTP_BASIC_<SOURCE>_USERNAME` and
    /// `LOCKEX_HTTP_BASIC_<SOURCE>_PASSWORD`. Defaults to `false`.
    pub with_credentials: Option<bool>,
}
