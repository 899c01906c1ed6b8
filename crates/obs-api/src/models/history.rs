//! `_history` revision lists.

use chrono::{DateTime, Utc};

use super::{expect_root, parsed_attr};
use crate::error::ObsError;
use crate::xml::Element;

/// One commit of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Revision {
    /// Revision number.
    pub rev: u32,
    /// Package version at this revision.
    pub version: Option<String>,
    /// Commit time in seconds since the epoch.
    pub time: Option<i64>,
    /// Committer.
    pub user: Option<String>,
    /// Commit message.
    pub comment: Option<String>,
    /// The request that produced the commit.
    pub request_id: Option<String>,
}

impl Revision {
    /// Parse a `<revisionlist>` document, ordered by revision number.
    pub fn parse_list(document: &[u8]) -> Result<Vec<Self>, ObsError> {
        let root = Element::parse(document)?;
        expect_root(&root, "revisionlist")?;
        let mut revisions: Vec<_> = root
            .children_named("revision")
            .map(|el| {
                let rev = parsed_attr(el, "rev").ok_or(ObsError::InvalidAttribute {
                    element: "revision",
                    attribute: "rev",
                })?;
                Ok(Self {
                    rev,
                    version: el.child_text("version").map(str::to_owned),
                    time: el.child_text("time").and_then(|t| t.parse().ok()),
                    user: el.child_text("user").map(str::to_owned),
                    comment: el.child_text("comment").map(str::to_owned),
                    request_id: el.child_text("requestid").map(str::to_owned),
                })
            })
            .collect::<Result<_, ObsError>>()?;
        revisions.sort_by_key(|r| r.rev);
        Ok(revisions)
    }

    /// Commit time as a UTC timestamp.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.time.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn parses_and_sorts_revisions() {
        let doc = br#"<revisionlist>
          <revision rev="2" vrev="2">
            <srcmd5>b</srcmd5><version>1.1</version><time>1700000100</time>
            <user>bob</user><comment>update to 1.1</comment><requestid>42</requestid>
          </revision>
          <revision rev="1" vrev="1">
            <srcmd5>a</srcmd5><version>1.0</version><time>1700000000</time><user>alice</user>
          </revision>
        </revisionlist>"#;
        let revs = Revision::parse_list(doc).unwrap();
        assert_eq!(revs.iter().map(|r| r.rev).collect::<Vec<_>>(), [1, 2]);
        assert_eq!(revs[1].request_id.as_deref(), Some("42"));
        assert_eq!(revs[0].comment, None);
        assert_eq!(
            revs[0].date().unwrap().format("%Y-%m-%d").to_string(),
            "2023-11-14"
        );
    }
}
