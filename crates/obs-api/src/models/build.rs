//! Build results and binary listings.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{expect_root, parsed_attr, required_attr};
use crate::error::ObsError;
use crate::xml::Element;

/// A `<resultlist>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultList {
    /// Checksum identifying the overall build state.
    pub state: String,
    /// One result per repository and architecture.
    pub results: Vec<BuildResult>,
}

/// The `<result>` of one repository/architecture pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    /// Project.
    pub project: String,
    /// Repository.
    pub repository: String,
    /// Architecture.
    pub arch: String,
    /// Overall repository code, e.g. `published`.
    pub code: String,
    /// Overall repository state.
    pub state: String,
    /// Per-package status.
    pub statuses: Vec<PackageStatus>,
}

/// A package's `<status>` inside a [`BuildResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    /// Package name.
    pub package: String,
    /// Build code, e.g. `succeeded` or `failed`.
    pub code: String,
}

impl ResultList {
    /// Parse a raw `<resultlist>` document.
    pub fn parse(document: &[u8]) -> Result<Self, ObsError> {
        let root = Element::parse(document)?;
        expect_root(&root, "resultlist")?;

        let results = root
            .children_named("result")
            .map(|el| {
                let attr = |name: &str| el.attr(name).unwrap_or_default().to_owned();
                BuildResult {
                    project: attr("project"),
                    repository: attr("repository"),
                    arch: attr("arch"),
                    code: attr("code"),
                    state: attr("state"),
                    statuses: el
                        .children_named("status")
                        .filter_map(|s| {
                            Some(PackageStatus {
                                package: s.attr("package").filter(|p| !p.is_empty())?.to_owned(),
                                code: s.attr("code").filter(|c| !c.is_empty())?.to_owned(),
                            })
                        })
                        .collect(),
                }
            })
            .collect();

        Ok(Self {
            state: root.attr("state").unwrap_or_default().to_owned(),
            results,
        })
    }
}

/// A built artifact from a `<binarylist>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// File name.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time in seconds since the epoch.
    pub mtime: Option<u64>,
}

impl Binary {
    /// Parse a raw `<binarylist>` document.
    pub fn parse_list(document: &[u8]) -> Result<Vec<Self>, ObsError> {
        let root = Element::parse(document)?;
        expect_root(&root, "binarylist")?;
        root.children_named("binary")
            .map(|el| {
                Ok(Self {
                    filename: required_attr(el, "binary", "filename")?.to_owned(),
                    size: parsed_attr(el, "size").unwrap_or_default(),
                    mtime: parsed_attr(el, "mtime"),
                })
            })
            .collect()
    }

    /// The modification time as a [`SystemTime`].
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.mtime.map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    }
}
