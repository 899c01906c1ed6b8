//! The OBS client and its builder.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use secrecy::SecretString;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ObsError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::resources::{BuildResource, SourceResource};
use crate::retry::transparent_retry;
use crate::xml::Element;

/// The error page marker OBS sometimes returns with a `200` status.
const UNAVAILABLE_MARKER: &[u8] = b"503 service unavailable";

/// Basic-auth credentials for the API.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Login name.
    pub user: String,
    /// Password, never logged.
    pub password: SecretString,
}

/// Settings shared by every request of an [`ObsClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://api.opensuse.org`.
    pub api_url: Url,
    /// Pause between retries of a transiently failing call.
    pub retry_delay: Duration,
}

/// Builder for [`ObsClient`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    api_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
    retry_delay: Duration,
}

impl ClientBuilder {
    /// Start building a client for the API at `api_url`.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            credentials: None,
            timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Authenticate as `user`. Credentials only travel over `https`.
    #[must_use]
    pub fn credentials(mut self, user: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password,
        });
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause between retries of transient failures.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn config(&self) -> Result<ClientConfig, ObsError> {
        let api_url =
            Url::parse(&self.api_url).map_err(|e| ObsError::InvalidUrl(format!("{}: {e}", self.api_url)))?;
        if api_url.cannot_be_a_base() {
            return Err(ObsError::InvalidUrl(self.api_url.clone()));
        }
        Ok(ClientConfig {
            api_url,
            retry_delay: self.retry_delay,
        })
    }

    /// Build a client on top of a custom [`HttpClient`].
    ///
    /// The builder's credentials and timeout are left to `http`.
    pub fn build_with<C: HttpClient>(self, http: C) -> Result<ObsClient<C>, ObsError> {
        Ok(ObsClient {
            http,
            config: self.config()?,
        })
    }

    /// Build a client on the pooled reqwest backend.
    #[cfg(feature = "reqwest-client")]
    pub fn build(self) -> Result<Obs, ObsError> {
        let config = self.config()?;
        let http = crate::backends::ReqwestClient::new(self.timeout, self.credentials);
        Ok(ObsClient { http, config })
    }
}

/// Client for the OBS API, generic over the HTTP transport.
#[derive(Debug)]
pub struct ObsClient<C: HttpClient> {
    http: C,
    config: ClientConfig,
}

/// [`ObsClient`] on the default reqwest backend.
#[cfg(feature = "reqwest-client")]
pub type Obs = ObsClient<crate::backends::ReqwestClient>;

impl<C: HttpClient> ObsClient<C> {
    /// Source operations: projects, packages, files, meta and history.
    #[must_use]
    pub fn source(&self) -> SourceResource<'_, C> {
        SourceResource::new(self)
    }

    /// Build operations: results, binaries and logs.
    #[must_use]
    pub fn build(&self) -> BuildResource<'_, C> {
        BuildResource::new(self)
    }

    /// The configured API URL.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.config.api_url
    }

    /// Build `<api_url>/<segments...>?<query>`. Segments are percent-encoded individually.
    pub(crate) fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ObsError> {
        let mut url = self.config.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| ObsError::InvalidUrl(self.config.api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Fetch an XML document and parse it, retrying through 503 pages.
    pub(crate) async fn get_document(
        &self,
        call_site: &'static str,
        url: &Url,
    ) -> Result<Element, ObsError> {
        let body = self.get_document_bytes(call_site, url).await?;
        Ok(Element::parse(&body)?)
    }

    /// Fetch an XML document unparsed, retrying through 503 pages.
    pub(crate) async fn get_document_bytes(
        &self,
        call_site: &'static str,
        url: &Url,
    ) -> Result<Bytes, ObsError> {
        transparent_retry(call_site, self.config.retry_delay, || self.get_once(url, true)).await
    }

    /// Fetch opaque content. Only the status code is checked for 503.
    pub(crate) async fn get_raw(&self, call_site: &'static str, url: &Url) -> Result<Bytes, ObsError> {
        transparent_retry(call_site, self.config.retry_delay, || self.get_once(url, false)).await
    }

    #[instrument(name = "ObsClient::get", skip(self, url), fields(url = %url))]
    async fn get_once(&self, url: &Url, expect_document: bool) -> Result<Bytes, ObsError> {
        let response = self.http.send(HttpRequest::get(url.clone())).await?;
        debug!(status = %response.status, bytes = response.body.len(), "Received response.");
        classify(url, response, expect_document)
    }
}

/// Turn a raw response into content or a typed error.
fn classify(url: &Url, response: HttpResponse, expect_document: bool) -> Result<Bytes, ObsError> {
    match response.status {
        status if status.is_success() => {
            if expect_document && contains_ignore_ascii_case(&response.body, UNAVAILABLE_MARKER) {
                return Err(ObsError::ServiceUnavailable);
            }
            Ok(response.body)
        }
        StatusCode::SERVICE_UNAVAILABLE => Err(ObsError::ServiceUnavailable),
        StatusCode::UNAUTHORIZED => Err(ObsError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ObsError::NotFound {
            url: url.to_string(),
        }),
        status => Err(ObsError::Http {
            status,
            url: url.to_string(),
            summary: status_summary(&response.body),
        }),
    }
}

/// OBS error bodies look like `<status code="..."><summary>...</summary></status>`.
fn status_summary(body: &[u8]) -> String {
    Element::parse(body)
        .ok()
        .and_then(|status| status.child_text("summary").map(str::to_owned))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_owned())
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
