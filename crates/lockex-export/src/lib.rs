//! Export a `poetry.lock` to `requirements.txt`, `constraints.txt` or `pylock.toml`.
//!
//! The [`Selector`] turns the project's declared dependencies into root requirements, [`walk`]
//! follows them through the [`LockedPackageIndex`] and the renderers in [`export`] turn the
//! resulting [`Resolution`] into text.

pub use error::{DependencyWalkError, ExportError};
pub use export::{Credentials, ExportOptions};
pub use exporter::Exporter;
pub use index::LockedPackageIndex;
pub use selector::Selector;
pub use walker::{Resolution, ResolvedDependency, walk};

mod candidate;
mod error;
pub mod export;
mod exporter;
mod index;
mod selector;
mod walker;
