//! Resource namespaces for the OBS API.

mod build;
mod source;

pub use build::BuildResource;
pub use source::SourceResource;
