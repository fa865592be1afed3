//! Single-attempt API client.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use serde::de::DeserializeOwned;

use super::endpoint::Endpoint;
use super::error::{ApiError, ClientFailure};
use super::http::{BackendError, HttpBackend, HttpBody, HttpRequest, HttpResponse};
use super::request::{ApiRequest, RequestBody};

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "api-key";

/// Issues authenticated requests and classifies the responses.
///
/// Every non-success status becomes [`ApiError::Client`]; nothing is retried
/// here. See [`RetryingClient`](super::RetryingClient) for that.
pub struct TransportClient<B> {
    backend: B,
    endpoint: Endpoint,
    headers: HeaderMap,
}

impl<B: HttpBackend> TransportClient<B> {
    pub fn new(backend: B, endpoint: Endpoint) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let mut key =
            HeaderValue::from_str(endpoint.api_key()).map_err(|_| ApiError::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            backend,
            endpoint,
            headers,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Execute a request and decode the JSON response body.
    ///
    /// An empty success body is a decode error; use
    /// [`execute_optional`](Self::execute_optional) where the server may omit it.
    pub async fn execute<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R, ApiError> {
        let response = self.send(request).await?;
        decode(request, &response.body)
    }

    /// Execute a request and decode the response body if one is present.
    pub async fn execute_optional<R: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<R>, ApiError> {
        let response = self.send(request).await?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        decode(request, &response.body).map(Some)
    }

    async fn send(&self, request: &ApiRequest) -> Result<HttpResponse, ApiError> {
        let http_request = self.build(request)?;

        tracing::debug!(
            method = %request.method,
            url = %http_request.url,
            "sending request"
        );

        let response = self
            .backend
            .send(http_request)
            .await
            .map_err(|e| backend_error(request, e))?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "received response"
        );

        if !request.is_success(response.status) {
            return Err(ApiError::Client(ClientFailure {
                method: request.method.to_string(),
                path: request.path.clone(),
                status: response.status,
                reason: response.reason,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            }));
        }

        Ok(response)
    }

    /// Turn a descriptor into a fresh wire request.
    fn build(&self, request: &ApiRequest) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint.url_for(request.root, &request.path);

        // GET requests never carry a body
        let body = if request.method == Method::GET {
            HttpBody::Empty
        } else {
            match &request.body {
                RequestBody::Empty => HttpBody::Empty,
                RequestBody::Json(value) => {
                    let bytes = serde_json::to_vec(value).map_err(|e| ApiError::Body {
                        method: request.method.to_string(),
                        path: request.path.clone(),
                        message: e.to_string(),
                    })?;
                    HttpBody::Json(Bytes::from(bytes))
                }
                RequestBody::Multipart(artifacts) => HttpBody::Multipart(artifacts.clone()),
            }
        };

        Ok(HttpRequest {
            method: request.method.clone(),
            url,
            query: request.query.clone(),
            headers: self.headers.clone(),
            body,
        })
    }
}

fn decode<R: DeserializeOwned>(request: &ApiRequest, body: &[u8]) -> Result<R, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        method: request.method.to_string(),
        path: request.path.clone(),
        message: e.to_string(),
    })
}

fn backend_error(request: &ApiRequest, err: BackendError) -> ApiError {
    let method = request.method.to_string();
    let path = request.path.clone();
    match err {
        BackendError::Body(message) => ApiError::Body {
            method,
            path,
            message,
        },
        other => ApiError::Io {
            method,
            path,
            message: other.to_string(),
        },
    }
}
