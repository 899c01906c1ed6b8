//! The `/build` namespace.

use bytes::Bytes;

use crate::client::ObsClient;
use crate::error::ObsError;
use crate::http_client::HttpClient;
use crate::models::{Binary, ResultList};

/// Build results, binaries and logs.
pub struct BuildResource<'c, C: HttpClient> {
    client: &'c ObsClient<C>,
}

impl<'c, C: HttpClient> BuildResource<'c, C> {
    pub(crate) fn new(client: &'c ObsClient<C>) -> Self {
        Self { client }
    }

    /// Build results of `package` in every repository and architecture of `project`.
    pub async fn results(&self, project: &str, package: &str) -> Result<ResultList, ObsError> {
        let url = self
            .client
            .url(&["build", project, "_result"], &[("package", package)])?;
        let body = self.client.get_document_bytes("build::results", &url).await?;
        ResultList::parse(&body)
    }

    /// Artifacts of one build.
    pub async fn binaries(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Vec<Binary>, ObsError> {
        let url = self
            .client
            .url(&["build", project, repository, arch, package], &[])?;
        let body = self.client.get_document_bytes("build::binaries", &url).await?;
        Binary::parse_list(&body)
    }

    /// Content of one artifact.
    pub async fn binary(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
        file: &str,
    ) -> Result<Bytes, ObsError> {
        let url = self
            .client
            .url(&["build", project, repository, arch, package, file], &[])?;
        self.client.get_raw("build::binary", &url).await
    }

    /// The full build log, or `None` when the build never ran.
    ///
    /// Logs of running builds are partial.
    pub async fn log(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Option<Bytes>, ObsError> {
        let url = self.client.url(
            &["build", project, repository, arch, package, "_log"],
            &[("nostream", "1"), ("start", "0")],
        )?;
        match self.client.get_raw("build::log", &url).await {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use http::StatusCode;

    use crate::client::tests::{ScriptedHttp, client, requests};

    #[tokio::test]
    async fn missing_log_is_none() {
        let obs = client(ScriptedHttp::new([(StatusCode::NOT_FOUND, "")]));
        let log = obs.build().log("P", "standard", "x86_64", "A").await.unwrap();
        assert!(log.is_none());
        assert_eq!(
            requests(&obs),
            ["https://api.example.org/build/P/standard/x86_64/A/_log?nostream=1&start=0"]
        );
    }

    #[tokio::test]
    async fn results_are_filtered_by_package() {
        let obs = client(ScriptedHttp::new([(
            StatusCode::OK,
            r#"<resultlist state="x"><result repository="r" arch="a" code="published"/></resultlist>"#,
        )]));
        let list = obs.build().results("P", "A").await.unwrap();
        assert_eq!(list.results[0].code, "published");
        assert_eq!(requests(&obs), ["https://api.example.org/build/P/_result?package=A"]);
    }
}
