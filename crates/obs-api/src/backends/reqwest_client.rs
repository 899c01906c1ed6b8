//! Reqwest-based HTTP client backend.
//!
//! Keeps at most one persistent connection per `(scheme, host)` origin. A connection the peer
//! closed underneath us is rebuilt and the request resent, up to [`MAX_CONNECTION_ATTEMPTS`]
//! times in total.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use parking_lot::Mutex;
use secrecy::ExposeSecret as _;
use tracing::{debug, warn};
use url::Url;

use crate::client::Credentials;
use crate::error::HttpClientError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};

const MAX_CONNECTION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    fn of(url: &Url) -> Result<Self, HttpClientError> {
        let host = url
            .host_str()
            .ok_or_else(|| HttpClientError::InvalidUrl(url.to_string()))?;
        Ok(Self {
            scheme: url.scheme().to_owned(),
            host: host.to_owned(),
            port: url.port_or_known_default(),
        })
    }

    fn is_encrypted(&self) -> bool {
        self.scheme == "https"
    }
}

/// An [`HttpClient`] backed by [`reqwest`], pooling one connection per origin.
#[derive(Debug)]
pub struct ReqwestClient {
    timeout: Duration,
    credentials: Option<Credentials>,
    connections: Mutex<HashMap<Origin, reqwest::Client>>,
}

impl ReqwestClient {
    /// Create a client. `credentials` are only ever sent over `https`.
    #[must_use]
    pub fn new(timeout: Duration, credentials: Option<Credentials>) -> Self {
        Self {
            timeout,
            credentials,
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn connection(&self, origin: &Origin) -> Result<reqwest::Client, HttpClientError> {
        let mut connections = self.connections.lock();
        if let Some(client) = connections.get(origin) {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| HttpClientError::Other(Box::new(e)))?;
        debug!(scheme = %origin.scheme, host = %origin.host, "Opening persistent connection.");
        connections.insert(origin.clone(), client.clone());
        Ok(client)
    }

    fn renew(&self, origin: &Origin) {
        self.connections.lock().remove(origin);
    }

    fn authorization(&self, origin: &Origin) -> Option<HeaderValue> {
        if !origin.is_encrypted() {
            return None;
        }
        let credentials = self.credentials.as_ref()?;
        let token = STANDARD.encode(format!(
            "{}:{}",
            credentials.user,
            credentials.password.expose_secret()
        ));
        let mut value = HeaderValue::from_str(&format!("Basic {token}")).ok()?;
        value.set_sensitive(true);
        Some(value)
    }

    async fn attempt(
        client: &reqwest::Client,
        request: &HttpRequest,
        authorization: Option<&HeaderValue>,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let origin = Origin::of(&request.url)?;
        let authorization = self.authorization(&origin);

        let mut attempt = 1;
        loop {
            let client = self.connection(&origin)?;
            match Self::attempt(&client, &request, authorization.as_ref()).await {
                Ok(response) => return Ok(response),
                Err(err) if is_peer_closed(&err) && attempt < MAX_CONNECTION_ATTEMPTS => {
                    warn!(host = %origin.host, attempt, error = %err, "Connection lost, renewing.");
                    self.renew(&origin);
                    attempt += 1;
                }
                Err(err) => return Err(map_reqwest_error(err)),
            }
        }
    }
}

fn is_peer_closed(err: &reqwest::Error) -> bool {
    !err.is_timeout() && (err.is_connect() || err.is_request() || err.is_body())
}

/// Map a reqwest error to our [`HttpClientError`].
fn map_reqwest_error(err: reqwest::Error) -> HttpClientError {
    if err.is_timeout() {
        HttpClientError::Timeout
    } else if is_peer_closed(&err) {
        HttpClientError::Connection(err.to_string())
    } else {
        HttpClientError::Other(Box::new(err))
    }
}
