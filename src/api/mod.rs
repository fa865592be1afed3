//! REST client for the analysis server.
//!
//! Layers, bottom-up:
//! - [`HttpBackend`]: raw HTTP exchange ([`ReqwestBackend`] in production)
//! - [`TransportClient`]: authentication, JSON, status classification
//! - [`RetryingClient`]: bounded retries with back-off
//! - [`AnalysisApi`]: typed server operations

mod endpoint;
mod error;
mod http;
pub mod models;
mod request;
mod retry;
mod service;
mod transport;

pub use endpoint::{ApiRoot, Endpoint, EXPERIMENTAL_SEGMENT, STABLE_SEGMENT};
pub use error::{ApiError, ClientFailure};
pub use http::{BackendError, HttpBackend, HttpBody, HttpRequest, HttpResponse, ReqwestBackend};
pub use request::{encode_segment, ApiRequest, Artifact, RequestBody};
pub use retry::{RetryPolicy, RetryingClient, DEFAULT_DELAYS, DEFAULT_MAX_ATTEMPTS};
pub use service::{AnalysisApi, SUBMIT_ACCEPTED};
pub use transport::{TransportClient, API_KEY_HEADER};
