//! Command-line interface for scanwarden.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::{AnalysisApi, Endpoint, ReqwestBackend, RetryingClient, TransportClient};
use crate::artifacts;
use crate::config::{self, RunConfig, DEFAULT_API_KEY_ENV, DEFAULT_CONFIG_NAMES};
use crate::expand::{Environment, ValueExpander};
use crate::gate::Outcome;
use crate::report;
use crate::sink::TracingSink;
use crate::workflow::{RunRequest, Workflow};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;
pub const EXIT_UNSTABLE: i32 = 3;

/// Submit build artifacts to an analysis server and gate on the findings.
///
/// scanwarden uploads artifacts (or asks the server to fetch the project's
/// git source), waits for the analysis to finish and fails the build when
/// findings cross the configured severity thresholds.
#[derive(Parser)]
#[command(name = "scanwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit an analysis and apply the finding gate
    #[command(visible_alias = "scan")]
    Analyze(AnalyzeArgs),
    /// Create a new run configuration from a template
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser, Default)]
pub struct AnalyzeArgs {
    /// Files or glob patterns to upload (default: analysis.artifacts)
    pub artifacts: Vec<String>,

    /// Path to run configuration YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Analysis server URL
    #[arg(long)]
    pub url: Option<String>,

    /// Target project id
    #[arg(long, conflicts_with = "project_name")]
    pub project_id: Option<String>,

    /// Target project name
    #[arg(long)]
    pub project_name: Option<String>,

    /// Create the project when no project has the given name
    #[arg(long)]
    pub auto_create: bool,

    /// Branch that receives the analysis
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Parent branch used when the target branch does not exist
    #[arg(long)]
    pub base_branch: Option<String>,

    /// Include the project's configured git source
    #[arg(long)]
    pub git: bool,

    /// Git branch to fetch (implies --git)
    #[arg(long)]
    pub git_branch: Option<String>,

    /// Return after submission without waiting for results
    #[arg(long)]
    pub no_wait: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "scanwarden.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

/// Template used by `init` when none is named.
pub const DEFAULT_TEMPLATE: &str = "minimal";

/// Available configuration templates.
#[derive(Debug)]
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

/// All available templates.
static TEMPLATES: &[Template] = &[
    Template {
        name: "minimal",
        description: "Upload build artifacts, fail on high severity findings",
        content: include_str!("templates/minimal.yaml"),
    },
    Template {
        name: "git-source",
        description: "Analyze the project's git source on a per-branch basis",
        content: include_str!("templates/git-source.yaml"),
    },
];

/// Load the run configuration and apply command-line overrides.
///
/// Without `--config` the file is looked up in `cwd`, then in `user_dir`.
pub fn load_config(
    args: &AnalyzeArgs,
    cwd: &Path,
    user_dir: Option<&Path>,
) -> anyhow::Result<(RunConfig, Option<PathBuf>)> {
    let path = match &args.config {
        Some(p) => Some(p.clone()),
        None => config::discover(cwd, user_dir),
    };

    let mut config = match &path {
        Some(p) => RunConfig::parse_file(p)
            .map_err(|e| anyhow::anyhow!("cannot parse {}: {}", p.display(), e))?,
        None if args.url.is_some() => RunConfig::default(),
        None => anyhow::bail!(
            "no configuration file found (looked for {}); run 'scanwarden init' or pass --url",
            DEFAULT_CONFIG_NAMES.join(", ")
        ),
    };

    apply_overrides(&mut config, args);
    config::validate(&config).map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    Ok((config, path))
}

fn apply_overrides(config: &mut RunConfig, args: &AnalyzeArgs) {
    if let Some(url) = &args.url {
        config.server.url = Some(url.clone());
    }
    if let Some(id) = &args.project_id {
        config.project.id = Some(id.clone());
        config.project.name = None;
    }
    if let Some(name) = &args.project_name {
        config.project.name = Some(name.clone());
        config.project.id = None;
    }
    if args.auto_create {
        config.project.auto_create = true;
    }
    if let Some(branch) = &args.branch {
        config.analysis.branch = Some(branch.clone());
    }
    if let Some(base) = &args.base_branch {
        config.analysis.base_branch = Some(base.clone());
    }
    if args.git || args.git_branch.is_some() {
        config.analysis.include_git_source = true;
    }
    if let Some(git_branch) = &args.git_branch {
        config.analysis.git_branch = Some(git_branch.clone());
    }
    if !args.artifacts.is_empty() {
        config.analysis.artifacts = args.artifacts.clone();
    }
    if args.no_wait {
        config.wait.enabled = false;
    }
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let cwd = std::env::current_dir()?;
    let user_dir = config::user_config_dir();
    let (config, config_path) = load_config(args, &cwd, user_dir.as_deref())?;
    let env = Environment::from_process();

    let url = config.server.url.clone().unwrap_or_default();
    let Some(api_key) = config.api_key(&env) else {
        anyhow::bail!(
            "no API key configured; set server.api_key or the {} environment variable",
            config
                .server
                .api_key_env
                .as_deref()
                .unwrap_or(DEFAULT_API_KEY_ENV)
        );
    };

    let files = artifacts::collect(&config.base_dir(), &config.analysis.artifacts)?;
    tracing::debug!(count = files.len(), "collected artifacts");
    let loaded = artifacts::load(&files)?;

    let selection = config
        .project_selection()
        .ok_or_else(|| anyhow::anyhow!("no project configured"))?;

    let request = RunRequest {
        selection,
        default_branch: config.project.default_branch.clone(),
        branch: config.analysis.branch.clone(),
        base_branch: config.analysis.base_branch.clone(),
        include_git_source: config.analysis.include_git_source,
        git_branch: config.analysis.git_branch.clone(),
        artifacts: loaded,
        wait: config.wait.enabled,
        poll: config.poll_settings(),
        gate: config.gate_policy(),
    };

    let endpoint = Endpoint::new(&url, api_key);
    let transport = TransportClient::new(ReqwestBackend::new(config.request_timeout()), endpoint)?;
    let cancel = CancellationToken::new();
    let api = AnalysisApi::new(RetryingClient::new(
        transport,
        config.retry_policy(),
        Arc::new(TracingSink),
        cancel.clone(),
    ));
    let expander = ValueExpander::with_env(env);

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                interrupt.cancel();
            }
        });
        Workflow::new(&api, &expander).run(request).await
    })?;

    let config_str = config_path.map(|p| p.to_string_lossy().to_string());
    match args.format.as_str() {
        "json" => report::write_json(&url, config_str.as_deref(), &summary)?,
        _ => report::write_pretty(&url, config_str.as_deref(), &summary),
    }

    Ok(exit_code(summary.outcome()))
}

/// Process exit code for a run outcome.
pub fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Passed | Outcome::Submitted => EXIT_SUCCESS,
        Outcome::Failed => EXIT_FAILED,
        Outcome::Unstable => EXIT_UNSTABLE,
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.list {
        print!("{}", template_listing());
        return Ok(EXIT_SUCCESS);
    }

    let template = write_template(&args.template, &args.output)?;
    let out = args.output.display();
    println!("Wrote {} ({} template)", out, template.name);
    println!();
    println!("Before the first run:");
    println!("  - point server.url at your analysis server and pick the project in {}", out);
    println!("  - export {} or set server.api_key", DEFAULT_API_KEY_ENV);
    println!("  - scanwarden analyze --config {}", out);

    Ok(EXIT_SUCCESS)
}

/// Write the named template to `output`, refusing to replace an existing file.
fn write_template(name: &str, output: &Path) -> anyhow::Result<&'static Template> {
    let template = TEMPLATES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown template {:?} (available: {})",
                name,
                TEMPLATES.iter().map(|t| t.name).collect::<Vec<_>>().join(", ")
            )
        })?;

    if output.exists() {
        anyhow::bail!("{} already exists; pass --output to write elsewhere", output.display());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(output, template.content)
        .with_context(|| format!("cannot write {}", output.display()))?;

    Ok(template)
}

/// Template names and descriptions, the default marked.
fn template_listing() -> String {
    let mut out = String::from("Templates for 'scanwarden init --template <name>':\n");
    for template in TEMPLATES {
        let marker = if template.name == DEFAULT_TEMPLATE { "*" } else { " " };
        out.push_str(&format!("  {} {:<12} {}\n", marker, template.name, template.description));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(Outcome::Passed), EXIT_SUCCESS);
        assert_eq!(exit_code(Outcome::Submitted), EXIT_SUCCESS);
        assert_eq!(exit_code(Outcome::Failed), EXIT_FAILED);
        assert_eq!(exit_code(Outcome::Unstable), EXIT_UNSTABLE);
    }

    #[test]
    fn test_templates_parse_and_validate() {
        for template in TEMPLATES {
            let config: RunConfig = serde_yaml::from_str(template.content)
                .unwrap_or_else(|e| panic!("template {} does not parse: {}", template.name, e));
            config::validate(&config)
                .unwrap_or_else(|e| panic!("template {} is invalid: {}", template.name, e));
        }
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "server:\n  url: http://file\nproject:\n  name: from-file\nanalysis:\n  artifacts: ['*.jar']\n",
        )
        .unwrap();

        let args = AnalyzeArgs {
            config: Some(path.clone()),
            project_id: Some("5".into()),
            git_branch: Some("develop".into()),
            artifacts: vec!["dist/*.zip".into()],
            no_wait: true,
            format: "json".into(),
            ..Default::default()
        };
        let (config, found) = load_config(&args, dir.path(), None).unwrap();

        assert_eq!(found, Some(path));
        assert_eq!(config.server.url.as_deref(), Some("http://file"));
        assert_eq!(config.project.id.as_deref(), Some("5"));
        assert!(config.project.name.is_none());
        assert!(config.analysis.include_git_source);
        assert_eq!(config.analysis.artifacts, vec!["dist/*.zip".to_string()]);
        assert!(!config.wait.enabled);
    }

    #[test]
    fn test_url_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = AnalyzeArgs {
            url: Some("https://srm.local".into()),
            project_name: Some("svc".into()),
            ..Default::default()
        };
        let (config, found) = load_config(&args, dir.path(), None).unwrap();
        assert_eq!(found, None);
        assert_eq!(config.server.url.as_deref(), Some("https://srm.local"));
        assert_eq!(config.project.name.as_deref(), Some("svc"));
    }

    #[test]
    fn test_missing_config_and_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&AnalyzeArgs::default(), dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("no configuration file found"));
    }

    #[test]
    fn test_user_dir_config_is_used() {
        let cwd = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        let path = user.path().join("scanwarden.yaml");
        std::fs::write(&path, "server:\n  url: http://user\nproject:\n  id: '3'\n").unwrap();

        let (config, found) =
            load_config(&AnalyzeArgs::default(), cwd.path(), Some(user.path())).unwrap();
        assert_eq!(found, Some(path));
        assert_eq!(config.project.id.as_deref(), Some("3"));
    }

    #[test]
    fn test_write_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ci/scanwarden.yaml");

        let template = write_template("git-source", &output).unwrap();
        assert_eq!(template.name, "git-source");
        let written: RunConfig =
            serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert!(written.analysis.include_git_source);

        let err = write_template(DEFAULT_TEMPLATE, &output).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_write_unknown_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("scanwarden.yaml");

        let err = write_template("nightly", &output).unwrap_err();
        assert!(err.to_string().contains("minimal, git-source"));
        assert!(!output.exists());
    }

    #[test]
    fn test_template_listing_marks_default() {
        let listing = template_listing();
        assert!(listing.contains("* minimal"));
        assert!(listing.contains("  git-source"));
    }
}
