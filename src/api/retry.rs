//! Retrying decorator around [`TransportClient`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::endpoint::Endpoint;
use super::error::ApiError;
use super::http::HttpBackend;
use super::request::ApiRequest;
use super::transport::TransportClient;
use crate::sink::ProgressSink;

/// Default number of attempts per call (first attempt plus two retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default back-off after the 1st, 2nd and 3rd failure.
pub const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(30),
];

/// How many times a call is attempted and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the n-th failure is `delays[n - 1]`; the last entry repeats.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delays: DEFAULT_DELAYS.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            delays: Vec::new(),
        }
    }

    /// Back-off to apply after `failures` consecutive failures (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        let idx = (failures.max(1) as usize - 1).min(self.delays.len() - 1);
        self.delays[idx]
    }
}

/// Client that retries transient failures according to a [`RetryPolicy`].
///
/// Classified failures (non-2xx) and connection errors are retried; decode
/// errors, body errors and cancellation are not. Every retry is reported to
/// the injected [`ProgressSink`].
pub struct RetryingClient<B> {
    inner: TransportClient<B>,
    policy: RetryPolicy,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl<B: HttpBackend> RetryingClient<B> {
    pub fn new(
        inner: TransportClient<B>,
        policy: RetryPolicy,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            policy,
            sink,
            cancel,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.inner.endpoint()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute a request with retries and decode the JSON response.
    pub async fn execute<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R, ApiError> {
        self.with_retries(request, || self.inner.execute(request))
            .await
    }

    /// Execute a request with retries; `None` when the server sent no body.
    pub async fn execute_optional<R: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<R>, ApiError> {
        self.with_retries(request, || self.inner.execute_optional(request))
            .await
    }

    async fn with_retries<T, F, Fut>(&self, request: &ApiRequest, mut attempt: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut failures = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ApiError::Interrupted);
            }

            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            failures += 1;
            if failures >= max_attempts {
                if max_attempts > 1 {
                    self.sink.error(&format!(
                        "{} {} failed after {} attempts: {}",
                        request.method, request.path, failures, err
                    ));
                }
                return Err(err);
            }

            let delay = self.policy.delay_after(failures);
            self.sink.warn(&format!(
                "{} {} failed (attempt {}/{}): {}; retrying in {}s",
                request.method,
                request.path,
                failures,
                max_attempts,
                err,
                delay.as_secs_f64()
            ));

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ApiError::Interrupted),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
