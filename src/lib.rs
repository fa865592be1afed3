//! scanwarden - remote static-analysis quality gate.
//!
//! Submits build artifacts (or a git source fetch) to an analysis server,
//! follows the resulting jobs until the analysis finishes and turns the
//! number of remaining findings into a pass / unstable / fail outcome.
//!
//! # Architecture
//!
//! - `api`: layered REST client (transport, retries, typed operations)
//! - `monitor`: job polling for direct and chained submissions
//! - `project`: project lookup by id or name, with auto-create
//! - `branch`: target/base branch validation against the server
//! - `gate`: finding thresholds and the outcome decision
//! - `workflow`: one run from resolution to outcome
//! - `config`: YAML run configuration
//! - `report`: output formatting (text, JSON)

pub mod api;
pub mod artifacts;
pub mod branch;
pub mod cli;
pub mod config;
pub mod error;
pub mod expand;
pub mod gate;
pub mod monitor;
pub mod project;
pub mod report;
pub mod sink;
pub mod version;
pub mod workflow;

pub use api::{AnalysisApi, ApiError, HttpBackend, ReqwestBackend, RetryPolicy};
pub use branch::{BranchPlan, BranchValidator};
pub use config::RunConfig;
pub use error::{Error, JobPhase, Result};
pub use expand::{Environment, MacroResolver, ValueExpander, ValueResolver};
pub use gate::{GatePolicy, GateResult, Outcome, Threshold};
pub use monitor::{ChainedJobMonitor, DirectJobMonitor, JobMonitor, PollSettings, Poller};
pub use project::{ProjectResolver, ProjectSelection};
pub use sink::{ProgressSink, RecordingSink, TracingSink};
pub use version::ServerVersion;
pub use workflow::{RunRequest, RunSummary, Workflow};
