//! `<directory>` listings: projects, packages and package files.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{expect_root, parsed_attr, required_attr};
use crate::error::ObsError;
use crate::xml::Element;

/// A `<directory>` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    /// The listed package, for file listings.
    pub name: Option<String>,
    /// The listed revision, for file listings.
    pub rev: Option<String>,
    /// Set when the package is a source link to another package.
    pub link: Option<LinkInfo>,
    /// The listed entries.
    pub entries: Vec<DirectoryEntry>,
}

/// One `<entry>` of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name.
    pub name: String,
    /// Size in bytes, for files.
    pub size: Option<u64>,
    /// Modification time in seconds since the epoch, for files.
    pub mtime: Option<u64>,
}

impl DirectoryEntry {
    /// The modification time as a [`SystemTime`].
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.mtime.map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    }
}

/// The `<linkinfo>` of a linked package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    /// Project of the link target.
    pub project: String,
    /// Package of the link target.
    pub package: String,
}

impl Directory {
    /// Interpret a parsed `<directory>` document.
    pub fn from_element(root: &Element) -> Result<Self, ObsError> {
        expect_root(root, "directory")?;
        let name = root.attr("name").map(str::to_owned);

        let link = match root.child("linkinfo") {
            Some(li) => Some(LinkInfo {
                project: required_attr(li, "linkinfo", "project")?.to_owned(),
                package: li
                    .attr("package")
                    .or(name.as_deref())
                    .ok_or(ObsError::InvalidAttribute {
                        element: "linkinfo",
                        attribute: "package",
                    })?
                    .to_owned(),
            }),
            None => None,
        };

        let entries = root
            .children_named("entry")
            .map(|entry| {
                Ok(DirectoryEntry {
                    name: required_attr(entry, "entry", "name")?.to_owned(),
                    size: parsed_attr(entry, "size"),
                    mtime: parsed_attr(entry, "mtime"),
                })
            })
            .collect::<Result<_, ObsError>>()?;

        Ok(Self {
            name,
            rev: root.attr("rev").map(str::to_owned),
            link,
            entries,
        })
    }

    /// Entry names in listing order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parses_linked_package_listing() {
        let doc = br#"<directory name="gcc" rev="12" srcmd5="abc">
            <linkinfo project="devel:gcc" package="gcc13" srcmd5="def"/>
            <entry name="_link" md5="1" size="120" mtime="1700000000"/>
            <entry name="gcc.spec" md5="2" size="4096" mtime="1700000100"/>
        </directory>"#;
        let dir = Directory::from_element(&Element::parse(doc).unwrap()).unwrap();
        assert_eq!(dir.rev.as_deref(), Some("12"));
        assert_eq!(
            dir.link,
            Some(LinkInfo {
                project: "devel:gcc".to_owned(),
                package: "gcc13".to_owned()
            })
        );
        assert_eq!(dir.entries[1].size, Some(4096));
        assert_eq!(
            dir.entries[1].modified(),
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_100))
        );
    }

    #[test]
    fn parses_plain_name_listing() {
        let doc = br#"<directory count="2"><entry name="openSUSE:Factory"/><entry name="home:user"/></directory>"#;
        let dir = Directory::from_element(&Element::parse(doc).unwrap()).unwrap();
        assert_eq!(dir.names().collect::<Vec<_>>(), ["openSUSE:Factory", "home:user"]);
        assert_eq!(dir.entries[0].size, None);
        assert!(dir.link.is_none());
    }

    #[test]
    fn rejects_other_documents() {
        let err = Directory::from_element(&Element::parse(b"<status code=\"x\"/>").unwrap()).unwrap_err();
        assert!(matches!(err, ObsError::UnexpectedDocument { expected: "directory", .. }));
    }
}
