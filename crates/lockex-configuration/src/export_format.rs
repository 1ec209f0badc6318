use std::fmt::{Display, Formatter};

/// The format to use when exporting a `poetry.lock` file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ExportFormat {
    /// Export in `requirements.txt` format.
    #[default]
    #[serde(rename = "requirements.txt")]
    #[cfg_attr(feature = "clap", value(name = "requirements.txt"))]
    RequirementsTxt,
    /// Export in `constraints.txt` format, without extras or editable installs.
    #[serde(rename = "constraints.txt")]
    #[cfg_attr(feature = "clap", value(name = "constraints.txt"))]
    ConstraintsTxt,
    /// Export in `pylock.toml` format.
    #[serde(rename = "pylock.toml")]
    #[cfg_attr(feature = "clap", value(name = "pylock.toml"))]
    PylockToml,
}

impl ExportFormat {
    /// Whether `pkg` and `pkg[extra]` are reported as a single entry.
    pub fn merges_extras(self) -> bool {
        match self {
            Self::RequirementsTxt => false,
            Self::ConstraintsTxt | Self::PylockToml => true,
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RequirementsTxt => "requirements.txt",
            Self::ConstraintsTxt => "constraints.txt",
            Self::PylockToml => "pylock.toml",
        })
    }
}
