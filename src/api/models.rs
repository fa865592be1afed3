//! Wire models for the analysis server API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::request::encode_segment;

/// Analysis id reported while a prerequisite job (git fetch) is still running.
pub const PENDING_ANALYSIS_ID: i64 = -1;

/// A project on the analysis server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Response of `GET projects`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub projects: Vec<Project>,
}

/// Body of `POST projects`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_branch_name: Option<&'a str>,
}

/// A branch of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Response of `GET x/system-info`.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    pub version: String,
}

/// Lifecycle state of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response of `GET jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
}

/// Response of an analysis submission, and of `GET jobs/{id}/result` once a
/// source fetch has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisResult {
    pub analysis_id: i64,
    pub job_id: String,
}

impl StartAnalysisResult {
    /// Whether the analysis id is still unknown.
    pub fn is_pending(&self) -> bool {
        self.analysis_id == PENDING_ANALYSIS_ID
    }
}

/// Options of an analysis submission, sent as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Branch the analysis results go to.
    pub branch: Option<String>,
    /// Parent of `branch` when the server has to create it.
    pub parent_branch: Option<String>,
    /// Fetch the project's configured git repository before analysing.
    pub include_git_source: bool,
    /// Specific branch for the git fetch; the repository default when unset.
    pub git_branch: Option<String>,
}

impl AnalysisOptions {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(branch) = &self.branch {
            pairs.push(("branchName", branch.clone()));
        }
        if let Some(parent) = &self.parent_branch {
            pairs.push(("parentBranchName", parent.clone()));
        }
        if self.include_git_source {
            pairs.push(("includeGitSource", "true".to_string()));
            if let Some(git_branch) = &self.git_branch {
                pairs.push(("gitBranchName", git_branch.clone()));
            }
        }
        pairs
    }
}

/// Finding severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "Critical", alias = "critical")]
    Critical,
    #[serde(rename = "High", alias = "high")]
    High,
    #[serde(rename = "Medium", alias = "medium")]
    Medium,
    #[serde(rename = "Low", alias = "low")]
    Low,
    #[serde(rename = "Info", alias = "info")]
    Info,
    #[serde(rename = "Unspecified", alias = "unspecified")]
    Unspecified,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 6] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
        Severity::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
            Severity::Unspecified => "Unspecified",
        }
    }

    /// This severity and every more severe one.
    pub fn and_above(self) -> Vec<Severity> {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[..=idx].to_vec()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            "unspecified" => Ok(Severity::Unspecified),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Triage status of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingStatus {
    New,
    Unresolved,
    Reopened,
    Escalated,
    Assigned,
    Fixed,
    Mitigated,
    FalsePositive,
    Ignored,
}

impl FindingStatus {
    /// Statuses of findings that still need attention.
    pub const UNRESOLVED: [FindingStatus; 5] = [
        FindingStatus::New,
        FindingStatus::Unresolved,
        FindingStatus::Reopened,
        FindingStatus::Escalated,
        FindingStatus::Assigned,
    ];
}

/// Finding filter of a count query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindingFilter {
    pub severity: Vec<Severity>,
    pub status: Vec<FindingStatus>,
}

/// Body of `POST projects/{context}/findings/count`.
#[derive(Debug, Clone, Serialize)]
pub struct CountRequest<'a> {
    pub filter: &'a FindingFilter,
}

/// Response of a count query.
#[derive(Debug, Clone, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// A project, optionally narrowed to one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
    pub project_id: i64,
    pub branch: Option<String>,
}

impl ProjectContext {
    pub fn new(project_id: i64, branch: Option<String>) -> Self {
        Self { project_id, branch }
    }

    /// Path segment form: `12` or `12;branch=feature%2Fx`.
    pub fn path_segment(&self) -> String {
        match &self.branch {
            Some(branch) => format!("{};branch={}", self.project_id, encode_segment(branch)),
            None => self.project_id.to_string(),
        }
    }
}

impl fmt::Display for ProjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "project {} (branch {})", self.project_id, branch),
            None => write!(f, "project {}", self.project_id),
        }
    }
}
