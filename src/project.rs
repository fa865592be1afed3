//! Project resolution.

use std::fmt;

use crate::api::{AnalysisApi, HttpBackend};
use crate::error::{Error, Result};

/// How the user identified the target project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSelection {
    /// Numeric id, as entered (parsed during resolution).
    BySpecificId(String),
    /// Exact, case-sensitive project name.
    ByName { name: String, auto_create: bool },
}

impl fmt::Display for ProjectSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectSelection::BySpecificId(id) => write!(f, "project id {}", id),
            ProjectSelection::ByName { name, .. } => write!(f, "project {:?}", name),
        }
    }
}

/// Maps a [`ProjectSelection`] to a project id on the server.
pub struct ProjectResolver<'a, B> {
    api: &'a AnalysisApi<B>,
}

impl<'a, B: HttpBackend> ProjectResolver<'a, B> {
    pub fn new(api: &'a AnalysisApi<B>) -> Self {
        Self { api }
    }

    /// Resolve `selection` to a project id.
    ///
    /// `default_branch` names the default branch of a project created by
    /// auto-create. Ambiguous names always fail.
    pub async fn resolve(
        &self,
        selection: &ProjectSelection,
        default_branch: Option<&str>,
    ) -> Result<i64> {
        match selection {
            ProjectSelection::BySpecificId(raw) => parse_project_id(raw),
            ProjectSelection::ByName { name, auto_create } => {
                self.resolve_by_name(name, *auto_create, default_branch).await
            }
        }
    }

    async fn resolve_by_name(
        &self,
        name: &str,
        auto_create: bool,
        default_branch: Option<&str>,
    ) -> Result<i64> {
        let projects = self
            .api
            .list_projects()
            .await
            .map_err(|e| Error::api(e, "listing projects"))?;

        let matches: Vec<_> = projects.iter().filter(|p| p.name == name).collect();

        match matches.as_slice() {
            [project] => {
                self.api
                    .sink()
                    .info(&format!("Using project {:?} (id {})", name, project.id));
                Ok(project.id)
            }
            [] if auto_create => {
                self.api.sink().info(&format!(
                    "No project named {:?}; creating it{}",
                    name,
                    default_branch
                        .map(|b| format!(" with default branch {:?}", b))
                        .unwrap_or_default()
                ));
                let created = self
                    .api
                    .create_project(name, default_branch)
                    .await
                    .map_err(|e| Error::api(e, "creating project"))?;
                self.api
                    .sink()
                    .info(&format!("Created project {:?} (id {})", name, created.id));
                Ok(created.id)
            }
            [] => Err(Error::config(format!(
                "no project named {:?} exists and auto-create is disabled",
                name
            ))),
            many => {
                let ids: Vec<String> = many.iter().map(|p| p.id.to_string()).collect();
                Err(Error::config(format!(
                    "project name {:?} is ambiguous: {} projects match (ids {}); use a project id instead",
                    name,
                    many.len(),
                    ids.join(", ")
                )))
            }
        }
    }
}

/// Parse a user-supplied project id.
pub fn parse_project_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::config(format!("invalid project id {:?}: not an integer", raw)))
}
