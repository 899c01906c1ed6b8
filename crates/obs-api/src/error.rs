//! Error types for the OBS client.

use http::StatusCode;
use thiserror::Error;

use crate::xml::XmlError;

/// Failure of the transport underneath an [`HttpClient`](crate::HttpClient).
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The connection could not be established or was dropped by the peer.
    #[error("connection error: {0}")]
    Connection(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The request URL has no usable origin.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by [`ObsClient`](crate::ObsClient) operations.
#[derive(Debug, Error)]
pub enum ObsError {
    /// The server answered `503 Service Unavailable`, either as a status code or as an HTML
    /// error page inside a `200` response.
    #[error("service temporarily unavailable")]
    ServiceUnavailable,

    /// The server rejected our credentials.
    #[error("authorization failed")]
    Unauthorized,

    /// The requested resource does not exist.
    #[error("not found: {url}")]
    NotFound {
        /// The URL that was requested.
        url: String,
    },

    /// Any other non-success HTTP status.
    #[error("HTTP {status} for {url}: {summary}")]
    Http {
        /// The returned status.
        status: StatusCode,
        /// The URL that was requested.
        url: String,
        /// The `<summary>` of the OBS status document, or the raw body.
        summary: String,
    },

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] HttpClientError),

    /// The response was not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] XmlError),

    /// The response was XML but not the document we asked for.
    #[error("unexpected document: expected <{expected}>, found <{found}>")]
    UnexpectedDocument {
        /// The expected root element.
        expected: &'static str,
        /// The root element actually found.
        found: String,
    },

    /// A required attribute was absent or unparsable.
    #[error("<{element}> has a missing or invalid `{attribute}` attribute")]
    InvalidAttribute {
        /// The element carrying the attribute.
        element: &'static str,
        /// The attribute name.
        attribute: &'static str,
    },

    /// The configured API URL cannot be used to build request URLs.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ObsError {
    /// Whether the failure is expected to heal by itself and the call should be repeated.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }

    /// Whether the server reported the resource as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
