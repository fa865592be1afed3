//! Error types for the REST client layer.

use std::fmt;
use thiserror::Error;

/// A non-success HTTP response from the analysis server.
///
/// Carries everything needed to diagnose the failure from a build log:
/// the request line, the status, the server's reason phrase and the raw
/// response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFailure {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl fmt::Display for ClientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} returned HTTP {} {}",
            self.method, self.path, self.status, self.reason
        )?;
        let body = self.body.trim();
        if !body.is_empty() {
            write!(f, ": {}", body)?;
        }
        Ok(())
    }
}

/// Errors that can occur while talking to the analysis server.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{0}")]
    Client(ClientFailure),
    /// Connection-level failure (refused, reset, timed out).
    #[error("{method} {path}: {message}")]
    Io {
        method: String,
        path: String,
        message: String,
    },
    /// The request body could not be assembled; never retried.
    #[error("{method} {path}: could not build request body: {message}")]
    Body {
        method: String,
        path: String,
        message: String,
    },
    /// A success response whose body did not match the expected shape.
    #[error("{method} {path}: failed to decode response: {message}")]
    Decode {
        method: String,
        path: String,
        message: String,
    },
    #[error("API key contains characters that are not valid in an HTTP header")]
    InvalidApiKey,
    /// Cancelled while waiting between attempts.
    #[error("interrupted")]
    Interrupted,
}

impl ApiError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Client(_) | ApiError::Io { .. })
    }

    /// HTTP status of a classified failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Client(failure) => Some(failure.status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(body: &str) -> ClientFailure {
        ClientFailure {
            method: "GET".to_string(),
            path: "projects".to_string(),
            status: 503,
            reason: "Service Unavailable".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_client_failure_display_includes_body() {
        let msg = failure("{\"error\":\"maintenance\"}").to_string();
        assert_eq!(
            msg,
            "GET projects returned HTTP 503 Service Unavailable: {\"error\":\"maintenance\"}"
        );
    }

    #[test]
    fn test_client_failure_display_without_body() {
        let msg = failure("  ").to_string();
        assert_eq!(msg, "GET projects returned HTTP 503 Service Unavailable");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Client(failure("")).is_transient());
        assert!(ApiError::Io {
            method: "GET".into(),
            path: "jobs/1".into(),
            message: "connection reset".into(),
        }
        .is_transient());
        assert!(!ApiError::Interrupted.is_transient());
        assert!(!ApiError::Decode {
            method: "GET".into(),
            path: "projects".into(),
            message: "eof".into(),
        }
        .is_transient());
    }
}
