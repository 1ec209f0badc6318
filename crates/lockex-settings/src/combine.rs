use lockex_configuration::ExportFormat;

use crate::Options;

pub trait Combine {
    /// Combine two values, preferring the values in `self`.
    ///
    /// Options from `lockex.toml` are combined with those from `[tool.lockex]`, so that a key
    /// set in `lockex.toml` overrides the same key in `pyproject.toml`.
    #[must_use]
    fn combine(self, other: Self) -> Self;
}

macro_rules! impl_combine_or {
    ($name:ident) => {
        impl Combine for Option<$name> {
            fn combine(self, other: Option<$name>) -> Option<$name> {
                self.or(other)
            }
        }
    };
}

impl_combine_or!(bool);
impl_combine_or!(ExportFormat);

impl Combine for Option<Options> {
    fn combine(self, other: Option<Options>) -> Option<Options> {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.combine(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Combine for Options {
    fn combine(self, other: Options) -> Options {
        Options {
            format: self.format.combine(other.format),
            hashes: self.hashes.combine(other.hashes),
            urls: self.urls.combine(other.urls),
            markers: self.markers.combine(other.markers),
            with_credentials: self.with_credentials.combine(other.with_credentials),
        }
    }
}
