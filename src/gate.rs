//! Pass / fail / unstable decision from finding counts.

use serde::{Deserialize, Serialize};

use crate::api::models::{FindingFilter, FindingStatus, ProjectContext, Severity};
use crate::api::{AnalysisApi, HttpBackend};
use crate::error::{Error, Result};

/// Final outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// No threshold was crossed.
    Passed,
    /// The unstable threshold was crossed.
    Unstable,
    /// The failure threshold was crossed.
    Failed,
    /// Analysis submitted without waiting for results.
    Submitted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Unstable => "unstable",
            Outcome::Failed => "failed",
            Outcome::Submitted => "submitted",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Findings at or above `severity` (only new ones if `only_new`) trip the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub severity: Severity,
    pub only_new: bool,
}

impl Threshold {
    pub fn new(severity: Severity, only_new: bool) -> Self {
        Self { severity, only_new }
    }

    /// Count-query filter for this threshold.
    pub fn filter(&self) -> FindingFilter {
        let status = if self.only_new {
            vec![FindingStatus::New]
        } else {
            FindingStatus::UNRESOLVED.to_vec()
        };
        FindingFilter {
            severity: self.severity.and_above(),
            status,
        }
    }
}

/// Thresholds for failing and destabilizing a run. Unset checks are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatePolicy {
    pub failure: Option<Threshold>,
    pub unstable: Option<Threshold>,
}

/// Counts behind a gate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unstable_count: Option<u64>,
}

/// Decide the outcome from the counts that were queried.
///
/// The failure check wins over the unstable check.
pub fn decide(failure_count: Option<u64>, unstable_count: Option<u64>) -> Outcome {
    if failure_count.unwrap_or(0) > 0 {
        Outcome::Failed
    } else if unstable_count.unwrap_or(0) > 0 {
        Outcome::Unstable
    } else {
        Outcome::Passed
    }
}

/// Query finding counts for `context` and decide the outcome.
pub async fn evaluate<B: HttpBackend>(
    api: &AnalysisApi<B>,
    context: &ProjectContext,
    policy: &GatePolicy,
) -> Result<GateResult> {
    let failure_count = match &policy.failure {
        Some(threshold) => Some(count(api, context, threshold).await?),
        None => None,
    };

    // A failed gate cannot get any worse; skip the second query
    let unstable_count = match (&policy.unstable, failure_count) {
        (Some(_), Some(n)) if n > 0 => None,
        (Some(threshold), _) => Some(count(api, context, threshold).await?),
        (None, _) => None,
    };

    let outcome = decide(failure_count, unstable_count);
    api.sink().info(&format!(
        "Gate result for {}: {}{}{}",
        context,
        outcome,
        failure_count
            .map(|n| format!(", {} finding(s) at failure threshold", n))
            .unwrap_or_default(),
        unstable_count
            .map(|n| format!(", {} finding(s) at unstable threshold", n))
            .unwrap_or_default()
    ));

    Ok(GateResult {
        outcome,
        failure_count,
        unstable_count,
    })
}

async fn count<B: HttpBackend>(
    api: &AnalysisApi<B>,
    context: &ProjectContext,
    threshold: &Threshold,
) -> Result<u64> {
    api.findings_count(context, &threshold.filter())
        .await
        .map_err(|e| Error::api(e, "counting findings"))
}
