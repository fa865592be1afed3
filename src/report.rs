//! Output formatting for run results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};

use crate::gate::Outcome;
use crate::workflow::RunSummary;

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    pub outcome: String,
    pub project_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_branch: Option<String>,
    pub artifacts: usize,
    pub analysis_id: i64,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unstable_count: Option<u64>,
}

impl JsonReport {
    pub fn new(server: &str, config_path: Option<&str>, summary: &RunSummary) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            server: server.to_string(),
            config: config_path.map(str::to_string),
            outcome: summary.outcome().to_string(),
            project_id: summary.project_id,
            branch: summary.branch.clone(),
            parent_branch: summary.parent_branch.clone(),
            artifacts: summary.artifact_count,
            analysis_id: summary.analysis_id,
            job_id: summary.submission_job_id.clone(),
            analysis_job_id: summary.analysis_job_id.clone(),
            failure_count: summary.gate.failure_count,
            unstable_count: summary.gate.unstable_count,
        }
    }
}

/// Write results in JSON format.
pub fn write_json(
    server: &str,
    config_path: Option<&str>,
    summary: &RunSummary,
) -> anyhow::Result<()> {
    let report = JsonReport::new(server, config_path, summary);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(server: &str, config_path: Option<&str>, summary: &RunSummary) {
    // Header
    println!();
    print!("  ");
    print!("{}", "scanwarden".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Server:   ".dimmed());
    println!("{}", server);
    if let Some(config) = config_path {
        print!("  {}", "Config:   ".dimmed());
        println!("{}", config);
    }
    print!("  {}", "Project:  ".dimmed());
    println!("{}", summary.project_id);
    if let Some(branch) = &summary.branch {
        print!("  {}", "Branch:   ".dimmed());
        print!("{}", branch.blue());
        if let Some(parent) = &summary.parent_branch {
            print!("{}", format!(" (new, from {})", parent).dimmed());
        }
        println!();
    }
    println!();

    write_submission(summary);
    println!();

    if summary.gate.failure_count.is_some() || summary.gate.unstable_count.is_some() {
        write_counts(summary);
        println!();
    }

    write_final_status(summary.outcome());
    println!();
}

fn write_submission(summary: &RunSummary) {
    println!("  {}", "Analysis:".bold());
    println!(
        "    {:<20} {}",
        "artifacts",
        summary.artifact_count
    );
    println!("    {:<20} {}", "analysis id", summary.analysis_id);
    println!("    {:<20} {}", "submission job", summary.submission_job_id);
    if let Some(job) = &summary.analysis_job_id {
        if job != &summary.submission_job_id {
            println!("    {:<20} {}", "analysis job", job);
        }
    }
}

fn write_counts(summary: &RunSummary) {
    println!("  {}", "Findings:".bold());
    if let Some(count) = summary.gate.failure_count {
        print!("    {:<20} ", "failure threshold");
        write_colored_count(count, Outcome::Failed);
        println!();
    }
    if let Some(count) = summary.gate.unstable_count {
        print!("    {:<20} ", "unstable threshold");
        write_colored_count(count, Outcome::Unstable);
        println!();
    }
}

fn write_colored_count(count: u64, crossed: Outcome) {
    let text = count.to_string();
    match (count, crossed) {
        (0, _) => print!("{}", text.green()),
        (_, Outcome::Failed) => print!("{}", text.red().bold()),
        _ => print!("{}", text.yellow()),
    }
}

fn write_final_status(outcome: Outcome) {
    match outcome {
        Outcome::Passed => print!("  {}", "✓ PASSED".green()),
        Outcome::Unstable => print!("  {}", "! UNSTABLE".yellow()),
        Outcome::Failed => print!("  {}", "✗ FAILED".red()),
        Outcome::Submitted => print!("  {}", "→ SUBMITTED".cyan()),
    }
    if outcome == Outcome::Submitted {
        print!("  {}", "(results not awaited)".dimmed());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateResult;

    fn summary(gate: GateResult) -> RunSummary {
        RunSummary {
            project_id: 12,
            branch: Some("feature/x".into()),
            parent_branch: Some("main".into()),
            artifact_count: 2,
            submission_job_id: "fetch-1".into(),
            analysis_id: 40,
            analysis_job_id: Some("job-40".into()),
            gate,
        }
    }

    #[test]
    fn test_json_report_fields() {
        let report = JsonReport::new(
            "https://srm.example.com/srm",
            Some("scanwarden.yaml"),
            &summary(GateResult {
                outcome: Outcome::Unstable,
                failure_count: Some(0),
                unstable_count: Some(3),
            }),
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["outcome"], "unstable");
        assert_eq!(value["project_id"], 12);
        assert_eq!(value["branch"], "feature/x");
        assert_eq!(value["unstable_count"], 3);
        assert_eq!(value["job_id"], "fetch-1");
    }

    #[test]
    fn test_json_report_omits_absent_counts() {
        let report = JsonReport::new(
            "http://localhost",
            None,
            &summary(GateResult {
                outcome: Outcome::Submitted,
                failure_count: None,
                unstable_count: None,
            }),
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("failure_count"));
        assert!(!json.contains("\"config\""));
        assert!(json.contains("\"submitted\""));
    }
}
