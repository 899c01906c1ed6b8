//! Typed views of the OBS XML documents we consume.

mod build;
mod directory;
mod history;
mod meta;

pub use build::{Binary, BuildResult, PackageStatus, ResultList};
pub use directory::{Directory, DirectoryEntry, LinkInfo};
pub use history::Revision;
pub use meta::{BuildFlag, BuildFlags, PackageMeta, ProjectMeta, ReleaseTarget, Repository, RepositoryPath, Roles};

use crate::error::ObsError;
use crate::xml::Element;

fn expect_root(element: &Element, expected: &'static str) -> Result<(), ObsError> {
    if element.name() == expected {
        Ok(())
    } else {
        Err(ObsError::UnexpectedDocument {
            expected,
            found: element.name().to_owned(),
        })
    }
}

fn required_attr<'a>(
    element: &'a Element,
    name: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ObsError> {
    element.attr(attribute).ok_or(ObsError::InvalidAttribute {
        element: name,
        attribute,
    })
}

fn parsed_attr<T: std::str::FromStr>(element: &Element, attribute: &str) -> Option<T> {
    element.attr(attribute).and_then(|v| v.parse().ok())
}
