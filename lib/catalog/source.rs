//! The remote operations the catalog consumes.

use std::future::Future;

use bytes::Bytes;
use obs_api::models::{Binary, Directory, ResultList, Revision};
use obs_api::{HttpClient, ObsClient, ObsError};

/// Everything the catalog reads from an OBS instance.
///
/// Meta documents are returned raw; the catalog exposes them verbatim and parses them where it
/// needs structure.
pub trait ObsSource: Send + Sync {
    /// All project names.
    fn projects(&self) -> impl Future<Output = Result<Vec<String>, ObsError>> + Send;

    /// Package names of `project`.
    fn packages(&self, project: &str) -> impl Future<Output = Result<Vec<String>, ObsError>> + Send;

    /// File listing of a package, at `rev` or the latest revision.
    fn files(
        &self,
        project: &str,
        package: &str,
        rev: Option<&str>,
    ) -> impl Future<Output = Result<Directory, ObsError>> + Send;

    /// Content of a source file.
    fn file(
        &self,
        project: &str,
        package: &str,
        file: &str,
        rev: Option<&str>,
    ) -> impl Future<Output = Result<Bytes, ObsError>> + Send;

    /// Raw project `_meta`.
    fn project_meta(&self, project: &str) -> impl Future<Output = Result<Bytes, ObsError>> + Send;

    /// Raw package `_meta`.
    fn package_meta(
        &self,
        project: &str,
        package: &str,
    ) -> impl Future<Output = Result<Bytes, ObsError>> + Send;

    /// Commit history, oldest first.
    fn history(
        &self,
        project: &str,
        package: &str,
    ) -> impl Future<Output = Result<Vec<Revision>, ObsError>> + Send;

    /// Build results of a package.
    fn build_results(
        &self,
        project: &str,
        package: &str,
    ) -> impl Future<Output = Result<ResultList, ObsError>> + Send;

    /// Artifacts of one build.
    fn binaries(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> impl Future<Output = Result<Vec<Binary>, ObsError>> + Send;

    /// Content of one artifact.
    fn binary(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
        file: &str,
    ) -> impl Future<Output = Result<Bytes, ObsError>> + Send;

    /// Build log, `None` when there is none.
    fn build_log(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> impl Future<Output = Result<Option<Bytes>, ObsError>> + Send;
}

impl<C: HttpClient> ObsSource for ObsClient<C> {
    async fn projects(&self) -> Result<Vec<String>, ObsError> {
        self.source().projects().await
    }

    async fn packages(&self, project: &str) -> Result<Vec<String>, ObsError> {
        self.source().packages(project).await
    }

    async fn files(
        &self,
        project: &str,
        package: &str,
        rev: Option<&str>,
    ) -> Result<Directory, ObsError> {
        self.source().files(project, package, rev).await
    }

    async fn file(
        &self,
        project: &str,
        package: &str,
        file: &str,
        rev: Option<&str>,
    ) -> Result<Bytes, ObsError> {
        self.source().file(project, package, file, rev).await
    }

    async fn project_meta(&self, project: &str) -> Result<Bytes, ObsError> {
        self.source().project_meta_raw(project).await
    }

    async fn package_meta(&self, project: &str, package: &str) -> Result<Bytes, ObsError> {
        self.source().package_meta_raw(project, package).await
    }

    async fn history(&self, project: &str, package: &str) -> Result<Vec<Revision>, ObsError> {
        self.source().history(project, package).await
    }

    async fn build_results(&self, project: &str, package: &str) -> Result<ResultList, ObsError> {
        self.build().results(project, package).await
    }

    async fn binaries(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Vec<Binary>, ObsError> {
        self.build().binaries(project, repository, arch, package).await
    }

    async fn binary(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
        file: &str,
    ) -> Result<Bytes, ObsError> {
        self.build()
            .binary(project, repository, arch, package, file)
            .await
    }

    async fn build_log(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Option<Bytes>, ObsError> {
        self.build().log(project, repository, arch, package).await
    }
}
