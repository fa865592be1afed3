//! Run configuration schema.
//!
//! A run file describes which server to talk to, which project and branch
//! receive the analysis, what gets uploaded and how the result is gated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::models::Severity;
use crate::api::RetryPolicy;
use crate::expand::Environment;
use crate::gate::{GatePolicy, Threshold};
use crate::monitor::{PollSettings, DEFAULT_POLL_INTERVAL};
use crate::project::ProjectSelection;

/// Run file names searched in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["scanwarden.yaml", ".scanwarden.yaml"];

/// Environment variable holding the API key when none is configured.
pub const DEFAULT_API_KEY_ENV: &str = "SCANWARDEN_API_KEY";

/// Per-request timeout when `server.timeout_ms` is unset.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

/// Analysis server connection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub url: Option<String>,
    /// Literal API key. Prefer `api_key_env` in checked-in files.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable to read the API key from
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Per-request timeout in milliseconds (default: 60000)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Retry behavior for every server call.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RetryConfig {
    /// Attempts per call including the first (default: 3)
    #[serde(default)]
    pub attempts: Option<u32>,
    /// Back-off after each failure in seconds (default: [1, 5, 30])
    #[serde(default)]
    pub delays_secs: Option<Vec<u64>>,
}

/// Target project.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProjectConfig {
    /// Numeric project id. Kept as text so bad input gets a clear message.
    #[serde(default)]
    pub id: Option<String>,
    /// Exact project name
    #[serde(default)]
    pub name: Option<String>,
    /// Create the project when no project has this name
    #[serde(default)]
    pub auto_create: bool,
    /// Default branch name for auto-created projects
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// What gets submitted.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AnalysisConfig {
    /// Target branch; may contain `${ENV,var="..."}` or `$VAR` references
    #[serde(default)]
    pub branch: Option<String>,
    /// Parent branch used when the target branch does not exist yet
    #[serde(default)]
    pub base_branch: Option<String>,
    /// Ask the server to fetch the project's configured git source
    #[serde(default)]
    pub include_git_source: bool,
    /// Git branch to fetch (only with `include_git_source`)
    #[serde(default)]
    pub git_branch: Option<String>,
    /// Glob patterns for files to upload, relative to `base_dir`
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Directory the artifact globs are matched under (default: working directory)
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
}

/// Waiting for the analysis to finish.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitConfig {
    /// Wait for results and gate on them (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between job status checks (default: 3)
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Give up on a job after this many seconds (default: wait indefinitely)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: None,
            timeout_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Finding thresholds. An unset severity skips that check.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GateConfig {
    #[serde(default)]
    pub failure_severity: Option<Severity>,
    #[serde(default)]
    pub failure_only_new: bool,
    #[serde(default)]
    pub unstable_severity: Option<Severity>,
    #[serde(default)]
    pub unstable_only_new: bool,
}

impl RunConfig {
    /// Parse a run configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Project selection; `None` when neither id nor name is set.
    pub fn project_selection(&self) -> Option<ProjectSelection> {
        if let Some(id) = &self.project.id {
            return Some(ProjectSelection::BySpecificId(id.clone()));
        }
        self.project.name.as_ref().map(|name| ProjectSelection::ByName {
            name: name.clone(),
            auto_create: self.project.auto_create,
        })
    }

    /// API key from the file, the configured variable, or `SCANWARDEN_API_KEY`.
    pub fn api_key(&self, env: &Environment) -> Option<String> {
        if let Some(key) = self.server.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }
        let var = self
            .server
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_API_KEY_ENV);
        env.get(var).filter(|k| !k.is_empty()).map(str::to_string)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(attempts) = self.server.retry.attempts {
            policy.max_attempts = attempts;
        }
        if let Some(delays) = &self.server.retry.delays_secs {
            policy.delays = delays.iter().map(|s| Duration::from_secs(*s)).collect();
        }
        policy
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self
                .wait
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            timeout: self.wait.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            failure: self
                .gate
                .failure_severity
                .map(|s| Threshold::new(s, self.gate.failure_only_new)),
            unstable: self
                .gate
                .unstable_severity
                .map(|s| Threshold::new(s, self.gate.unstable_only_new)),
        }
    }

    /// Directory artifact globs are matched under.
    pub fn base_dir(&self) -> PathBuf {
        self.analysis
            .base_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Per-user configuration directory (`~/.config/scanwarden` on Linux).
pub fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "scanwarden").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Find a run file in `dir`, then `scanwarden.yaml` in `user_dir`.
pub fn discover(dir: &Path, user_dir: Option<&Path>) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .or_else(|| {
            user_dir
                .map(|d| d.join(DEFAULT_CONFIG_NAMES[0]))
                .filter(|path| path.is_file())
        })
}

/// Validate a run configuration for correctness.
pub fn validate(config: &RunConfig) -> anyhow::Result<()> {
    match config.server.url.as_deref().map(str::trim) {
        None | Some("") => anyhow::bail!("server.url is required"),
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            anyhow::bail!("server.url {:?} must start with http:// or https://", url)
        }
        Some(_) => {}
    }

    match (&config.project.id, &config.project.name) {
        (Some(_), Some(_)) => anyhow::bail!("set only one of project.id and project.name"),
        (None, None) => anyhow::bail!("one of project.id or project.name is required"),
        (Some(id), None) => {
            id.trim()
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("project.id {:?} is not an integer", id))?;
        }
        (None, Some(name)) if name.trim().is_empty() => {
            anyhow::bail!("project.name must not be empty")
        }
        (None, Some(_)) => {}
    }

    if config.server.retry.attempts == Some(0) {
        anyhow::bail!("server.retry.attempts must be at least 1");
    }

    if config.server.timeout_ms == Some(0) {
        anyhow::bail!("server.timeout_ms must be greater than 0");
    }

    if config.wait.poll_interval_secs == Some(0) {
        anyhow::bail!("wait.poll_interval_secs must be greater than 0");
    }

    for pattern in &config.analysis.artifacts {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid artifacts pattern {:?}: {}", pattern, e))?;
    }

    if config.analysis.git_branch.is_some() && !config.analysis.include_git_source {
        tracing::warn!("analysis.git_branch is ignored unless include_git_source is set");
    }

    Ok(())
}
