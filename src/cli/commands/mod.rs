use crate::config::PipeopsConfig;
use crate::definitions::PipelineDefinitions;
use crate::gitlab::{BranchConflictResolver, GitLabClient, RetryPolicy};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod init;
pub mod list;
pub mod monitor;
pub mod validate;

pub(crate) fn print_banner(title: &str, width: usize) {
    println!("{}", "=".repeat(width));
    println!("    {title}");
    println!("{}", "=".repeat(width));
}

pub(crate) fn load_definitions(path: &Path) -> Result<PipelineDefinitions> {
    PipelineDefinitions::load(path)
        .with_context(|| format!("Failed to load pipeline definitions from {}", path.display()))
}

/// Build the GitLab client for `project_url` from the tool configuration.
pub(crate) fn connect(
    project_url: &str,
    token: &str,
    config: &PipeopsConfig,
    resolver: Arc<dyn BranchConflictResolver>,
) -> Result<Arc<GitLabClient>> {
    print!("🔄 Connecting to GitLab... ");
    std::io::stdout().flush()?;

    let retry = RetryPolicy::new(config.retry.max_attempts, config.retry.backoff_unit());
    match GitLabClient::builder(project_url, token)
        .timeout(config.gitlab.timeout())
        .retry_policy(retry)
        .conflict_resolver(resolver)
        .build()
    {
        Ok(client) => {
            println!("✅");
            Ok(Arc::new(client))
        }
        Err(e) => {
            println!("❌");
            Err(e).context("Failed to create GitLab client")
        }
    }
}
