//! The `/source` namespace.

use bytes::Bytes;

use crate::client::ObsClient;
use crate::error::ObsError;
use crate::http_client::HttpClient;
use crate::models::{Directory, PackageMeta, ProjectMeta, Revision};

/// Projects, packages, source files and their metadata.
pub struct SourceResource<'c, C: HttpClient> {
    client: &'c ObsClient<C>,
}

impl<'c, C: HttpClient> SourceResource<'c, C> {
    pub(crate) fn new(client: &'c ObsClient<C>) -> Self {
        Self { client }
    }

    /// Names of all projects.
    pub async fn projects(&self) -> Result<Vec<String>, ObsError> {
        let url = self.client.url(&["source"], &[])?;
        let doc = self.client.get_document("source::projects", &url).await?;
        Ok(Directory::from_element(&doc)?.names().map(str::to_owned).collect())
    }

    /// Names of the packages in `project`.
    pub async fn packages(&self, project: &str) -> Result<Vec<String>, ObsError> {
        let url = self.client.url(&["source", project], &[])?;
        let doc = self.client.get_document("source::packages", &url).await?;
        Ok(Directory::from_element(&doc)?.names().map(str::to_owned).collect())
    }

    /// The file listing of a package, at `rev` or the latest revision.
    pub async fn files(
        &self,
        project: &str,
        package: &str,
        rev: Option<&str>,
    ) -> Result<Directory, ObsError> {
        let query: Vec<(&str, &str)> = rev.map(|rev| ("rev", rev)).into_iter().collect();
        let url = self.client.url(&["source", project, package], &query)?;
        let doc = self.client.get_document("source::files", &url).await?;
        Directory::from_element(&doc)
    }

    /// Content of a source file. Source links are not expanded.
    pub async fn file(
        &self,
        project: &str,
        package: &str,
        file: &str,
        rev: Option<&str>,
    ) -> Result<Bytes, ObsError> {
        let mut query = vec![("expand", "0")];
        if let Some(rev) = rev {
            query.push(("rev", rev));
        }
        let url = self.client.url(&["source", project, package, file], &query)?;
        self.client.get_raw("source::file", &url).await
    }

    /// The raw `_meta` document of `project`.
    pub async fn project_meta_raw(&self, project: &str) -> Result<Bytes, ObsError> {
        let url = self.client.url(&["source", project, "_meta"], &[])?;
        self.client.get_document_bytes("source::project_meta", &url).await
    }

    /// The parsed `_meta` of `project`.
    pub async fn project_meta(&self, project: &str) -> Result<ProjectMeta, ObsError> {
        ProjectMeta::parse(&self.project_meta_raw(project).await?)
    }

    /// The raw `_meta` document of a package.
    pub async fn package_meta_raw(&self, project: &str, package: &str) -> Result<Bytes, ObsError> {
        let url = self.client.url(&["source", project, package, "_meta"], &[])?;
        self.client.get_document_bytes("source::package_meta", &url).await
    }

    /// The parsed `_meta` of a package.
    pub async fn package_meta(&self, project: &str, package: &str) -> Result<PackageMeta, ObsError> {
        PackageMeta::parse(&self.package_meta_raw(project, package).await?)
    }

    /// Commit history of a package, oldest first.
    pub async fn history(&self, project: &str, package: &str) -> Result<Vec<Revision>, ObsError> {
        let url = self.client.url(&["source", project, package, "_history"], &[])?;
        let body = self.client.get_document_bytes("source::history", &url).await?;
        Revision::parse_list(&body)
    }
}
