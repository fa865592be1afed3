//! One analysis run from project resolution to the gate decision.

use serde::Serialize;

use crate::api::models::{AnalysisOptions, JobStatus, ProjectContext};
use crate::api::{AnalysisApi, Artifact, HttpBackend};
use crate::branch::{BranchPlan, BranchValidator};
use crate::error::{Error, JobPhase, Result};
use crate::expand::ValueExpander;
use crate::gate::{self, GatePolicy, GateResult, Outcome};
use crate::monitor::{JobMonitor, PollSettings, Poller};
use crate::project::{ProjectResolver, ProjectSelection};

/// Everything a run needs, with user input already merged.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub selection: ProjectSelection,
    /// Default branch of an auto-created project.
    pub default_branch: Option<String>,
    /// Target branch, unexpanded.
    pub branch: Option<String>,
    /// Parent for a new target branch, unexpanded.
    pub base_branch: Option<String>,
    pub include_git_source: bool,
    pub git_branch: Option<String>,
    pub artifacts: Vec<Artifact>,
    /// Wait for the analysis and apply the gate.
    pub wait: bool,
    pub poll: PollSettings,
    pub gate: GatePolicy,
}

/// What happened during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub project_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Parent branch when the server created `branch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_branch: Option<String>,
    pub artifact_count: usize,
    /// Job returned by the submission (source fetch or analysis).
    pub submission_job_id: String,
    pub analysis_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_job_id: Option<String>,
    #[serde(flatten)]
    pub gate: GateResult,
}

impl RunSummary {
    pub fn outcome(&self) -> Outcome {
        self.gate.outcome
    }
}

/// Drives a run against one server.
pub struct Workflow<'a, B> {
    api: &'a AnalysisApi<B>,
    expander: &'a ValueExpander,
}

impl<'a, B: HttpBackend> Workflow<'a, B> {
    pub fn new(api: &'a AnalysisApi<B>, expander: &'a ValueExpander) -> Self {
        Self { api, expander }
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunSummary> {
        if request.artifacts.is_empty() && !request.include_git_source {
            return Err(Error::config(
                "nothing to analyze: no artifacts matched and git source is not included",
            ));
        }

        let project_id = ProjectResolver::new(self.api)
            .resolve(&request.selection, request.default_branch.as_deref())
            .await?;

        let plan = self
            .plan_branches(project_id, request.branch.as_deref(), request.base_branch.as_deref())
            .await?;

        let options = AnalysisOptions {
            branch: plan.target.clone(),
            parent_branch: plan.base.clone(),
            include_git_source: request.include_git_source,
            git_branch: request
                .git_branch
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .map(|b| self.expander.expand(b)),
        };

        let artifact_count = request.artifacts.len();
        self.api.sink().info(&format!(
            "Submitting {} artifact(s) to project {}{}",
            artifact_count,
            project_id,
            if request.include_git_source {
                " with git source"
            } else {
                ""
            }
        ));

        let submission = self
            .api
            .start_analysis(project_id, &options, request.artifacts)
            .await
            .map_err(|e| Error::api(e, "submitting analysis"))?;
        let submission_job_id = submission.job_id.clone();
        tracing::debug!(job_id = %submission_job_id, analysis_id = submission.analysis_id, "analysis submitted");

        let poller = Poller::new(self.api, &request.poll);
        let mut monitor = JobMonitor::for_submission(submission);
        let analysis_id = monitor.wait_for_start(&poller).await?;

        let gate = if request.wait {
            self.finish(&mut monitor, &poller, analysis_id).await?;
            let context = ProjectContext::new(project_id, plan.target.clone());
            gate::evaluate(self.api, &context, &request.gate).await?
        } else {
            self.api.sink().info(&format!(
                "Analysis {} submitted; not waiting for results",
                analysis_id
            ));
            GateResult {
                outcome: Outcome::Submitted,
                failure_count: None,
                unstable_count: None,
            }
        };

        Ok(RunSummary {
            project_id,
            branch: plan.target,
            parent_branch: plan.base,
            artifact_count,
            submission_job_id,
            analysis_id,
            analysis_job_id: monitor.analysis_job_id().map(str::to_string),
            gate,
        })
    }

    async fn plan_branches(
        &self,
        project_id: i64,
        branch: Option<&str>,
        base: Option<&str>,
    ) -> Result<BranchPlan> {
        if branch.map_or(true, |b| b.trim().is_empty()) {
            return Ok(BranchPlan::none());
        }

        let version = self
            .api
            .server_version()
            .await
            .map_err(|e| Error::api(e, "fetching server version"))?;
        tracing::debug!(%version, "server version");

        BranchValidator::new(self.api, self.expander)
            .validate(&version, project_id, branch, base)
            .await
    }

    async fn finish(
        &self,
        monitor: &mut JobMonitor,
        poller: &Poller<'_, B>,
        analysis_id: i64,
    ) -> Result<()> {
        match monitor.wait_for_finish(poller).await? {
            JobStatus::Failed => Err(Error::JobFailed {
                job_id: monitor.analysis_job_id().unwrap_or_default().to_string(),
                phase: JobPhase::Analysis,
            }),
            _ => {
                self.api
                    .sink()
                    .info(&format!("Analysis {} completed", analysis_id));
                Ok(())
            }
        }
    }
}
