//! Typed operations of the analysis server.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use super::http::HttpBackend;
use super::models::{
    AnalysisOptions, Branch, CountRequest, CountResponse, CreateProject, FindingFilter, Job,
    JobStatus, Project, ProjectContext, ProjectList, StartAnalysisResult, SystemInfo,
};
use super::request::{encode_segment, ApiRequest, Artifact};
use super::retry::RetryingClient;
use crate::sink::ProgressSink;
use crate::version::ServerVersion;

/// Status returned by a successful analysis submission.
pub const SUBMIT_ACCEPTED: u16 = 202;

/// The analysis server API. Every call goes through a [`RetryingClient`].
pub struct AnalysisApi<B> {
    client: RetryingClient<B>,
}

impl<B: HttpBackend> AnalysisApi<B> {
    pub fn new(client: RetryingClient<B>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RetryingClient<B> {
        &self.client
    }

    pub fn sink(&self) -> &dyn ProgressSink {
        self.client.sink().as_ref()
    }

    pub fn sink_handle(&self) -> Arc<dyn ProgressSink> {
        Arc::clone(self.client.sink())
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        self.client.cancel_token()
    }

    /// All projects visible to the API key.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let list: ProjectList = self.client.execute(&ApiRequest::get("projects")).await?;
        Ok(list.projects)
    }

    /// Create a project, optionally naming its default branch.
    pub async fn create_project(
        &self,
        name: &str,
        default_branch: Option<&str>,
    ) -> Result<Project, ApiError> {
        let body = CreateProject {
            name,
            default_branch_name: default_branch,
        };
        let request = ApiRequest::post("projects")
            .json(&body)
            .map_err(|e| body_error("POST", "projects", e))?;
        self.client.execute(&request).await
    }

    /// Branches of a project (experimental API).
    pub async fn list_branches(&self, project_id: i64) -> Result<Vec<Branch>, ApiError> {
        let request = ApiRequest::get(format!("projects/{}/branches", project_id)).experimental();
        self.client.execute(&request).await
    }

    /// Version of the connected server (experimental API).
    pub async fn server_version(&self) -> Result<ServerVersion, ApiError> {
        let request = ApiRequest::get("system-info").experimental();
        let info: SystemInfo = self.client.execute(&request).await?;
        info.version.parse().map_err(|message| ApiError::Decode {
            method: "GET".to_string(),
            path: request.path.clone(),
            message,
        })
    }

    /// Submit artifacts for analysis. Succeeds with HTTP 202 only.
    pub async fn start_analysis(
        &self,
        project_id: i64,
        options: &AnalysisOptions,
        artifacts: Vec<Artifact>,
    ) -> Result<StartAnalysisResult, ApiError> {
        let mut request = ApiRequest::post(format!("projects/{}/analysis", project_id))
            .multipart(artifacts)
            .expect_status(SUBMIT_ACCEPTED);
        for (key, value) in options.query_pairs() {
            request = request.query(key, value);
        }
        self.client.execute(&request).await
    }

    /// Current status of a job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let request = ApiRequest::get(format!("jobs/{}", encode_segment(job_id)));
        let job: Job = self.client.execute(&request).await?;
        Ok(job.status)
    }

    /// Analysis started by a finished source-fetch job.
    pub async fn job_result(&self, job_id: &str) -> Result<StartAnalysisResult, ApiError> {
        let request = ApiRequest::get(format!("jobs/{}/result", encode_segment(job_id)));
        self.client.execute(&request).await
    }

    /// Number of findings in `context` matching `filter`.
    pub async fn findings_count(
        &self,
        context: &ProjectContext,
        filter: &FindingFilter,
    ) -> Result<u64, ApiError> {
        let path = format!("projects/{}/findings/count", context.path_segment());
        let request = ApiRequest::post(path.clone())
            .json(&CountRequest { filter })
            .map_err(|e| body_error("POST", &path, e))?;
        let response: CountResponse = self.client.execute(&request).await?;
        Ok(response.count)
    }
}

fn body_error(method: &str, path: &str, err: serde_json::Error) -> ApiError {
    ApiError::Body {
        method: method.to_string(),
        path: path.to_string(),
        message: err.to_string(),
    }
}
