//! Branch validation.
//!
//! Decides whether an analysis appends to an existing branch or asks the
//! server to create a new one from a verified parent.

use crate::api::{AnalysisApi, HttpBackend};
use crate::error::{Error, Result};
use crate::expand::ValueExpander;
use crate::version::ServerVersion;

/// Resolved branch names for a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchPlan {
    /// Branch the results go to.
    pub target: Option<String>,
    /// Parent of a branch the server must create; `None` for existing branches.
    pub base: Option<String>,
}

impl BranchPlan {
    /// No branching requested.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the server will create `target` from `base`.
    pub fn creates_branch(&self) -> bool {
        self.target.is_some() && self.base.is_some()
    }
}

/// Validates target/base branch names against the server.
pub struct BranchValidator<'a, B> {
    api: &'a AnalysisApi<B>,
    expander: &'a ValueExpander,
}

impl<'a, B: HttpBackend> BranchValidator<'a, B> {
    pub fn new(api: &'a AnalysisApi<B>, expander: &'a ValueExpander) -> Self {
        Self { api, expander }
    }

    /// Validate the requested branches of `project_id`.
    ///
    /// - no target: nothing to do, both outputs absent
    /// - server too old for branching: fails before any branch lookup
    /// - target exists: analysis appends to it and the base is dropped
    /// - target missing: base is required and must exist
    pub async fn validate(
        &self,
        server_version: &ServerVersion,
        project_id: i64,
        target: Option<&str>,
        base: Option<&str>,
    ) -> Result<BranchPlan> {
        let Some(target) = non_blank(target) else {
            return Ok(BranchPlan::none());
        };

        if !server_version.supports_branching() {
            return Err(Error::config(format!(
                "branch {:?} was requested but the server runs version {}; branching requires version {} or newer",
                target,
                server_version,
                ServerVersion::min_for_branching()
            )));
        }

        let target = self.expander.expand(target);
        if target.trim().is_empty() {
            return Err(Error::config("target branch name expanded to an empty value"));
        }
        let base = non_blank(base).map(|b| self.expander.expand(b));

        let branches = self
            .api
            .list_branches(project_id)
            .await
            .map_err(|e| Error::api(e, "listing branches"))?;

        if branches.iter().any(|b| b.name == target) {
            if let Some(base) = &base {
                tracing::debug!(branch = %target, base = %base, "target branch exists, ignoring base branch");
            }
            self.api
                .sink()
                .info(&format!("Analysis will be added to existing branch {:?}", target));
            return Ok(BranchPlan {
                target: Some(target),
                base: None,
            });
        }

        let Some(base) = base.filter(|b| !b.trim().is_empty()) else {
            return Err(Error::config(format!(
                "branch {:?} does not exist in project {}; a base branch is required to create it",
                target, project_id
            )));
        };

        if !branches.iter().any(|b| b.name == base) {
            let mut known: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
            known.sort_unstable();
            return Err(Error::config(format!(
                "base branch {:?} does not exist in project {} (available: {})",
                base,
                project_id,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )));
        }

        self.api.sink().info(&format!(
            "Analysis will create branch {:?} from {:?}",
            target, base
        ));

        Ok(BranchPlan {
            target: Some(target),
            base: Some(base),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_none() {
        let plan = BranchPlan::none();
        assert!(plan.target.is_none());
        assert!(plan.base.is_none());
        assert!(!plan.creates_branch());
    }

    #[test]
    fn test_creates_branch() {
        let plan = BranchPlan {
            target: Some("feature".into()),
            base: Some("main".into()),
        };
        assert!(plan.creates_branch());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("main")), Some("main"));
    }
}
