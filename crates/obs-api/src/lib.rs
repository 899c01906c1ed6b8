//! Client for the Open Build Service (OBS) HTTP API.
//!
//! Every call goes through [`retry::transparent_retry`], so transient `503 Service Unavailable`
//! answers never reach the caller. The bundled [`ReqwestClient`] backend keeps one persistent
//! connection per origin.

mod backends;
mod client;
pub mod error;
mod http_client;
pub mod models;
mod resources;
pub mod retry;
pub mod xml;

#[cfg(feature = "reqwest-client")]
pub use backends::ReqwestClient;
#[cfg(feature = "reqwest-client")]
pub use client::Obs;
pub use client::{ClientBuilder, ClientConfig, Credentials, ObsClient};
pub use error::{HttpClientError, ObsError};
pub use http_client::{HttpClient, HttpRequest, HttpResponse};
pub use resources::{BuildResource, SourceResource};
