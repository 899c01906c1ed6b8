//! HTTP transport abstraction, so tests can stand in for the network.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::future::Future;
use url::Url;

use crate::error::HttpClientError;

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, including the query string.
    pub url: Url,
    /// Extra request headers.
    pub headers: HeaderMap,
}

impl HttpRequest {
    /// A plain `GET` of `url`.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
        }
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Response body bytes.
    pub body: Bytes,
}

/// Pluggable HTTP backend.
pub trait HttpClient: Send + Sync {
    /// Send `request` and buffer the whole response.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, HttpClientError>> + Send;
}
