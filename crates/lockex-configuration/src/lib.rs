pub use dependency_groups::*;
pub use export_format::*;
pub use extras::*;

mod dependency_groups;
mod export_format;
mod extras;
