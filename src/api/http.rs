//! HTTP backend abstraction.
//!
//! [`TransportClient`](super::TransportClient) speaks to the server through
//! an [`HttpBackend`], which keeps URL building, authentication and status
//! classification independent of the HTTP library. [`ReqwestBackend`] is the
//! production implementation.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;
use thiserror::Error;

use super::request::Artifact;

/// Errors raised by a backend before a response status is available.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    /// The request body could not be encoded.
    #[error("{0}")]
    Body(String),
    #[error("{0}")]
    Other(String),
}

/// Wire-level body of an [`HttpRequest`].
#[derive(Debug, Clone)]
pub enum HttpBody {
    Empty,
    Json(Bytes),
    Multipart(Vec<Artifact>),
}

/// A fully-resolved HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: HttpBody,
}

/// A response whose body has been read in full.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: Bytes,
}

/// Trait for pluggable HTTP backends.
///
/// Implementations must consume the whole response before returning so that
/// the underlying connection is released on every path.
pub trait HttpBackend: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, BackendError>> + Send;
}

/// An [`HttpBackend`] backed by [`reqwest`].
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// Create a backend with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("scanwarden/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::from_client(client)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Json(bytes) => builder.header(CONTENT_TYPE, "application/json").body(bytes),
            HttpBody::Multipart(artifacts) => builder.multipart(build_form(artifacts)?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        // Read the body eagerly; the connection goes back to the pool here
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Encode artifacts as a browser-style multipart form.
fn build_form(artifacts: Vec<Artifact>) -> Result<reqwest::multipart::Form, BackendError> {
    let mut form = reqwest::multipart::Form::new();
    for artifact in artifacts {
        let part = reqwest::multipart::Part::bytes(artifact.data.to_vec())
            .file_name(artifact.file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| BackendError::Body(e.to_string()))?;
        form = form.part(artifact.part_name, part);
    }
    Ok(form)
}

/// Map a reqwest error to our [`BackendError`].
fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else if err.is_connect() {
        BackendError::Connection(err.to_string())
    } else if err.is_builder() {
        BackendError::Body(err.to_string())
    } else {
        BackendError::Other(err.to_string())
    }
}
