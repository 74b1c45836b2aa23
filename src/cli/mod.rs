use crate::definitions::DEFAULT_DEFINITIONS_PATH;
use crate::gitlab::{BranchConflictResolver, ScriptedResolver};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

pub mod commands;
pub mod interact;

/// Tokens shorter than this are rejected before any request is made.
pub const MIN_TOKEN_LENGTH: usize = 10;

#[derive(Parser)]
#[command(name = "pipeops")]
#[command(version)]
#[command(about = "GitLab pipeline automation for DevOps teams")]
#[command(long_about = "PipeOps analyzes a GitLab project, generates its CI/CD pipeline from \
                       templates, commits it to a feature branch with a merge request and \
                       monitors the pipeline that follows. Get started with 'pipeops init'.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up a GitLab CI/CD pipeline for a project and monitor its first run
    Init {
        /// GitLab project URL
        #[arg(short = 'p', long, help = "GitLab project URL, e.g. https://gitlab.com/group/project")]
        project_url: String,
        /// GitLab API token
        #[arg(short = 't', long, help = "GitLab API token (falls back to configuration or GITLAB_TOKEN)")]
        token: Option<String>,
        /// Pipeline definitions document
        #[arg(short = 'c', long, default_value = DEFAULT_DEFINITIONS_PATH, help = "Path to the pipeline definitions file")]
        config: PathBuf,
        /// Show what would be done without making changes
        #[arg(long, help = "Show what would be done without making changes")]
        dry_run: bool,
        /// Accept the detected settings without prompting
        #[arg(long, help = "Skip confirmation prompts and use the detected settings")]
        auto_confirm: bool,
        /// Do not monitor the pipeline after generation
        #[arg(long, help = "Skip pipeline monitoring (enabled by default)")]
        no_monitor: bool,
        /// What to do when the feature branch already exists
        #[arg(long, value_enum, default_value_t = ConflictMode::Ask, help = "Handling of an existing feature branch")]
        on_branch_conflict: ConflictMode,
    },
    /// Monitor a pipeline until it finishes
    Monitor {
        /// GitLab project URL
        #[arg(short = 'p', long, help = "GitLab project URL")]
        project_url: String,
        /// GitLab API token
        #[arg(short = 't', long, help = "GitLab API token (falls back to configuration or GITLAB_TOKEN)")]
        token: Option<String>,
        /// Pipeline to monitor
        #[arg(long, conflicts_with = "reference", help = "Pipeline ID to monitor")]
        pipeline_id: Option<u64>,
        /// Branch whose latest pipeline is monitored
        #[arg(long = "ref", id = "reference", help = "Monitor the latest pipeline of this branch (default branch when omitted)")]
        reference: Option<String>,
        /// Maximum wait in seconds
        #[arg(long, help = "Maximum time to wait in seconds (defaults to configuration)")]
        max_wait: Option<u64>,
        /// Start a new pipeline instead of following an existing one
        #[arg(long, conflicts_with = "pipeline_id", help = "Trigger a new pipeline on the ref and monitor it")]
        trigger: bool,
    },
    /// Validate the pipeline definitions file
    Validate {
        #[arg(short = 'c', long, default_value = DEFAULT_DEFINITIONS_PATH, help = "Definitions file to validate")]
        config: PathBuf,
    },
    /// List the available pipeline templates
    List {
        #[arg(short = 'c', long, default_value = DEFAULT_DEFINITIONS_PATH, help = "Definitions file to read")]
        config: PathBuf,
    },
}

/// Handling of a feature branch that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConflictMode {
    /// Show the branch and ask
    Ask,
    /// Delete and recreate the branch
    Recreate,
    /// Stop the run
    Abort,
}

impl ConflictMode {
    pub fn resolver(self) -> Arc<dyn BranchConflictResolver> {
        match self {
            ConflictMode::Ask => Arc::new(interact::InteractiveResolver),
            ConflictMode::Recreate => Arc::new(ScriptedResolver::recreate()),
            ConflictMode::Abort => Arc::new(ScriptedResolver::abort()),
        }
    }
}

/// Reject obviously malformed input before talking to GitLab.
pub fn validate_inputs(project_url: &str, token: &str) -> Result<()> {
    if !(project_url.starts_with("http://") || project_url.starts_with("https://")) {
        bail!("Project URL must start with http:// or https://");
    }
    if token.len() < MIN_TOKEN_LENGTH {
        bail!("Token appears to be too short");
    }
    Ok(())
}

/// Token from the command line, else from configuration.
pub fn resolve_token(flag: Option<String>, configured: Option<&str>) -> Result<String> {
    match flag.or_else(|| configured.map(str::to_string)) {
        Some(token) => Ok(token),
        None => bail!("No GitLab token given: pass --token or set GITLAB_TOKEN"),
    }
}
