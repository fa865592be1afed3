//! Server endpoint: base URL normalization and API roots.

use std::fmt;

/// Path segment every stable API URL ends in.
pub const STABLE_SEGMENT: &str = "/api/";
/// Path segment of the experimental API, substituted for [`STABLE_SEGMENT`].
pub const EXPERIMENTAL_SEGMENT: &str = "/x/";

/// Which API root a request is issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoot {
    Stable,
    Experimental,
}

/// Base URL, derived API roots and the API key for one server.
#[derive(Clone)]
pub struct Endpoint {
    stable_root: String,
    experimental_root: String,
    api_key: String,
}

impl Endpoint {
    /// Build an endpoint from a user-supplied server URL.
    ///
    /// `https://host/analysis`, `https://host/analysis/` and
    /// `https://host/analysis/api` all normalize to
    /// `https://host/analysis/api/`.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        let mut stable_root = base_url.trim().to_string();
        if !stable_root.ends_with('/') {
            stable_root.push('/');
        }
        if !stable_root.ends_with(STABLE_SEGMENT) {
            stable_root.push_str(&STABLE_SEGMENT[1..]);
        }

        // The stable root always ends with the segment, so rfind always hits
        let cut = stable_root
            .rfind(STABLE_SEGMENT)
            .unwrap_or(stable_root.len());
        let experimental_root = format!("{}{}", &stable_root[..cut], EXPERIMENTAL_SEGMENT);

        Self {
            stable_root,
            experimental_root,
            api_key: api_key.into(),
        }
    }

    pub fn stable_root(&self) -> &str {
        &self.stable_root
    }

    pub fn experimental_root(&self) -> &str {
        &self.experimental_root
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Absolute URL for a path relative to the selected root.
    pub fn url_for(&self, root: ApiRoot, path: &str) -> String {
        let base = match root {
            ApiRoot::Stable => &self.stable_root,
            ApiRoot::Experimental => &self.experimental_root,
        };
        format!("{}{}", base, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("stable_root", &self.stable_root)
            .field("experimental_root", &self.experimental_root)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
