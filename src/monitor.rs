//! Job monitoring.
//!
//! A submission either returns the analysis id right away ([`DirectJobMonitor`])
//! or, when a git source fetch runs first, a placeholder id and the fetch job
//! ([`ChainedJobMonitor`]). Both poll job status until a terminal state.
//!
//! ```text
//! SUBMITTED -> {QUEUED, RUNNING} -> {COMPLETED, FAILED}
//! ```
//!
//! QUEUED and RUNNING may interleave or be skipped entirely.

use std::time::Duration;

use tokio::time::Instant;

use crate::api::models::{JobStatus, StartAnalysisResult};
use crate::api::{AnalysisApi, HttpBackend};
use crate::error::{Error, JobPhase, Result};

/// Default interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Polling cadence and the optional overall limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Give up on a job after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Polls one job until it leaves the queued/running states.
pub struct Poller<'a, B> {
    api: &'a AnalysisApi<B>,
    settings: &'a PollSettings,
}

impl<'a, B: HttpBackend> Poller<'a, B> {
    pub fn new(api: &'a AnalysisApi<B>, settings: &'a PollSettings) -> Self {
        Self { api, settings }
    }

    pub fn api(&self) -> &'a AnalysisApi<B> {
        self.api
    }

    /// Poll `job_id` until its status is terminal and return that status.
    ///
    /// Only status changes are reported, not every poll.
    pub async fn until_terminal(&self, job_id: &str, phase: JobPhase) -> Result<JobStatus> {
        let started = Instant::now();
        let cancel = self.api.cancel_token();
        let mut last_seen: Option<JobStatus> = None;

        loop {
            let status = self
                .api
                .job_status(job_id)
                .await
                .map_err(|e| Error::polling(e, job_id, phase))?;

            if status.is_terminal() {
                tracing::debug!(job_id, %status, "job reached terminal state");
                return Ok(status);
            }

            if last_seen != Some(status) {
                self.api
                    .sink()
                    .info(&format!("{} job {} is {}", capitalize(phase), job_id, status));
                last_seen = Some(status);
            }

            if let Some(timeout) = self.settings.timeout {
                if started.elapsed() >= timeout {
                    return Err(Error::Timeout {
                        job_id: job_id.to_string(),
                        phase,
                        waited: started.elapsed(),
                    });
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(Error::Interrupted(format!("waiting for {} job {}", phase, job_id)));
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}

fn capitalize(phase: JobPhase) -> String {
    let s = phase.to_string();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => s,
    }
}

/// Monitor for a submission whose analysis id is already known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectJobMonitor {
    analysis_id: i64,
    job_id: String,
}

impl DirectJobMonitor {
    pub fn new(analysis_id: i64, job_id: impl Into<String>) -> Self {
        Self {
            analysis_id,
            job_id: job_id.into(),
        }
    }

    pub fn analysis_id(&self) -> i64 {
        self.analysis_id
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The analysis id; no polling needed.
    pub fn wait_for_start(&self) -> i64 {
        self.analysis_id
    }

    pub async fn wait_for_finish<B: HttpBackend>(&self, poller: &Poller<'_, B>) -> Result<JobStatus> {
        poller.until_terminal(&self.job_id, JobPhase::Analysis).await
    }
}

/// Monitor for a git source fetch followed by the analysis it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedJobMonitor {
    fetch_job_id: String,
    analysis: Option<DirectJobMonitor>,
}

impl ChainedJobMonitor {
    pub fn new(fetch_job_id: impl Into<String>) -> Self {
        Self {
            fetch_job_id: fetch_job_id.into(),
            analysis: None,
        }
    }

    pub fn fetch_job_id(&self) -> &str {
        &self.fetch_job_id
    }

    /// Second-phase monitor, once the fetch has finished.
    pub fn analysis(&self) -> Option<&DirectJobMonitor> {
        self.analysis.as_ref()
    }

    /// Wait for the source fetch, then look up the analysis it started.
    pub async fn wait_for_start<B: HttpBackend>(&mut self, poller: &Poller<'_, B>) -> Result<i64> {
        if let Some(analysis) = &self.analysis {
            return Ok(analysis.analysis_id());
        }

        let fetch_job = self.fetch_job_id.clone();
        let status = poller.until_terminal(&fetch_job, JobPhase::SourceFetch).await?;
        if status == JobStatus::Failed {
            return Err(Error::JobFailed {
                job_id: fetch_job,
                phase: JobPhase::SourceFetch,
            });
        }

        let next = poller
            .api()
            .job_result(&fetch_job)
            .await
            .map_err(|e| Error::polling(e, &fetch_job, JobPhase::SourceFetch))?;
        if next.is_pending() {
            return Err(Error::Protocol(format!(
                "source fetch job {} finished without starting an analysis",
                fetch_job
            )));
        }

        poller.api().sink().info(&format!(
            "Source fetch finished; analysis {} running as job {}",
            next.analysis_id, next.job_id
        ));

        let analysis_id = next.analysis_id;
        self.analysis = Some(DirectJobMonitor::new(next.analysis_id, next.job_id));
        Ok(analysis_id)
    }

    pub async fn wait_for_finish<B: HttpBackend>(
        &mut self,
        poller: &Poller<'_, B>,
    ) -> Result<JobStatus> {
        self.wait_for_start(poller).await?;
        match &self.analysis {
            Some(analysis) => analysis.wait_for_finish(poller).await,
            None => Err(Error::Protocol("analysis job unknown after source fetch".into())),
        }
    }
}

/// Monitor chosen from a submission response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMonitor {
    Direct(DirectJobMonitor),
    Chained(ChainedJobMonitor),
}

impl JobMonitor {
    /// Chained when the analysis id is still pending, direct otherwise.
    pub fn for_submission(result: StartAnalysisResult) -> Self {
        if result.is_pending() {
            JobMonitor::Chained(ChainedJobMonitor::new(result.job_id))
        } else {
            JobMonitor::Direct(DirectJobMonitor::new(result.analysis_id, result.job_id))
        }
    }

    /// Wait until the analysis id is known and return it.
    pub async fn wait_for_start<B: HttpBackend>(&mut self, poller: &Poller<'_, B>) -> Result<i64> {
        match self {
            JobMonitor::Direct(direct) => Ok(direct.wait_for_start()),
            JobMonitor::Chained(chained) => chained.wait_for_start(poller).await,
        }
    }

    /// Wait for the analysis job to reach a terminal state.
    pub async fn wait_for_finish<B: HttpBackend>(
        &mut self,
        poller: &Poller<'_, B>,
    ) -> Result<JobStatus> {
        match self {
            JobMonitor::Direct(direct) => direct.wait_for_finish(poller).await,
            JobMonitor::Chained(chained) => chained.wait_for_finish(poller).await,
        }
    }

    /// Job id of the analysis phase, when known.
    pub fn analysis_job_id(&self) -> Option<&str> {
        match self {
            JobMonitor::Direct(direct) => Some(direct.job_id()),
            JobMonitor::Chained(chained) => chained.analysis().map(|a| a.job_id()),
        }
    }
}
