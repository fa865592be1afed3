//! Errors of a scanwarden run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

/// Which of the two remote jobs an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    SourceFetch,
    Analysis,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::SourceFetch => write!(f, "source fetch"),
            JobPhase::Analysis => write!(f, "analysis"),
        }
    }
}

/// Fatal errors. None of these are retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed, after retries where applicable.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Bad or contradictory user input (ids, names, branches, versions).
    #[error("{0}")]
    Config(String),
    #[error("cannot read artifact {}: {source}", .path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A remote job reached the failed state.
    #[error("{phase} job {job_id} failed on the server")]
    JobFailed { job_id: String, phase: JobPhase },
    #[error("error while waiting for {phase} job {job_id}: {source}")]
    Polling {
        job_id: String,
        phase: JobPhase,
        #[source]
        source: ApiError,
    },
    /// The server answered with data that contradicts the protocol.
    #[error("unexpected server response: {0}")]
    Protocol(String),
    #[error("{phase} job {job_id} did not finish within {}s", .waited.as_secs())]
    Timeout {
        job_id: String,
        phase: JobPhase,
        waited: Duration,
    },
    #[error("interrupted while {0}")]
    Interrupted(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Wrap an API error raised while doing `activity`.
    pub fn api(err: ApiError, activity: &str) -> Self {
        match err {
            ApiError::Interrupted => Error::Interrupted(activity.to_string()),
            other => Error::Api(other),
        }
    }

    /// Wrap an API error raised while polling a job.
    pub fn polling(err: ApiError, job_id: &str, phase: JobPhase) -> Self {
        match err {
            ApiError::Interrupted => {
                Error::Interrupted(format!("waiting for {} job {}", phase, job_id))
            }
            source => Error::Polling {
                job_id: job_id.to_string(),
                phase,
                source,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientFailure;

    #[test]
    fn test_interruption_is_not_wrapped_as_polling_failure() {
        let err = Error::polling(ApiError::Interrupted, "j1", JobPhase::Analysis);
        assert!(matches!(err, Error::Interrupted(_)));
        assert_eq!(err.to_string(), "interrupted while waiting for analysis job j1");
    }

    #[test]
    fn test_polling_failure_names_job_and_phase() {
        let failure = ClientFailure {
            method: "GET".into(),
            path: "jobs/j1".into(),
            status: 500,
            reason: "Internal Server Error".into(),
            body: String::new(),
        };
        let err = Error::polling(ApiError::Client(failure), "j1", JobPhase::SourceFetch);
        assert_eq!(
            err.to_string(),
            "error while waiting for source fetch job j1: GET jobs/j1 returned HTTP 500 Internal Server Error"
        );
    }
}
