//! Immutable request descriptors.
//!
//! An [`ApiRequest`] describes a call without performing it. The transport
//! turns it into a fresh HTTP request on every attempt, so retrying never
//! depends on re-reading a consumed body.

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::endpoint::ApiRoot;

/// A binary artifact uploaded as one part of a multipart submission.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Form field name (`file0`, `file1`, ...).
    pub part_name: String,
    /// File name reported to the server.
    pub file_name: String,
    /// File contents, shared between attempts.
    pub data: Bytes,
}

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<Artifact>),
}

/// Description of a single API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the selected API root.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub root: ApiRoot,
    pub body: RequestBody,
    /// Exact success status; any 2xx when unset.
    pub expected_status: Option<u16>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            root: ApiRoot::Stable,
            body: RequestBody::Empty,
            expected_status: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Issue the request against the experimental API root.
    pub fn experimental(mut self) -> Self {
        self.root = ApiRoot::Experimental;
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach artifacts as a `multipart/form-data` body.
    pub fn multipart(mut self, artifacts: Vec<Artifact>) -> Self {
        self.body = RequestBody::Multipart(artifacts);
        self
    }

    /// Require an exact success status instead of any 2xx.
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Whether `status` counts as success for this request.
    pub fn is_success(&self, status: u16) -> bool {
        match self.expected_status {
            Some(expected) => status == expected,
            None => (200..300).contains(&status),
        }
    }
}

/// Bytes escaped in a path segment: everything but RFC 3986 unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a value for use as a single URL path segment.
pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}
