use super::client::GitLabClient;
use super::errors::GitLabError;
use super::types::{CommitRecord, FileAction, TreeEntry};
use reqwest::Method;
use serde_json::json;
use tracing::{error, info, warn};

/// Branches probed, in order, when even the default branch cannot be listed.
pub const COMMON_BRANCHES: [&str; 3] = ["main", "master", "develop"];

impl GitLabClient {
    async fn fetch_tree(&self, reference: &str) -> Result<Vec<String>, GitLabError> {
        let url = self.endpoint(["repository", "tree"]);
        let query = [
            ("ref", reference.to_string()),
            ("recursive", "true".to_string()),
        ];
        let entries: Vec<TreeEntry> = self.get_paginated("list_files", url, &query).await?;
        let files: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect();
        info!(reference, count = files.len(), "Retrieved files");
        Ok(files)
    }

    /// Recursive list of file paths on `reference`.
    ///
    /// A missing ref falls back to the default branch, then to the first
    /// listable branch among [`COMMON_BRANCHES`]. Any other failure, or
    /// running out of candidates, yields an empty list.
    pub async fn list_files(&self, reference: &str) -> Vec<String> {
        match self.fetch_tree(reference).await {
            Ok(files) => return files,
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                error!(reference, error = %err, "Failed to get file list");
                return Vec::new();
            }
        }

        let default_branch = self.default_branch().await;
        if reference != default_branch {
            warn!(reference, fallback = %default_branch, "Branch not found, trying default branch");
            match self.fetch_tree(&default_branch).await {
                Ok(files) => return files,
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    error!(reference = %default_branch, error = %err, "Failed to get file list");
                    return Vec::new();
                }
            }
        }

        self.probe_common_branches(&default_branch).await
    }

    async fn probe_common_branches(&self, exclude: &str) -> Vec<String> {
        let available = self.list_branches().await;

        for candidate in COMMON_BRANCHES {
            if candidate == exclude || !available.iter().any(|b| b == candidate) {
                continue;
            }
            warn!(reference = candidate, "Trying common branch");
            match self.fetch_tree(candidate).await {
                Ok(files) => return files,
                Err(err) => {
                    warn!(reference = candidate, error = %err, "Common branch not listable");
                }
            }
        }

        error!("Could not retrieve files from any branch");
        Vec::new()
    }

    /// Commit every action to `branch` in one request.
    pub async fn commit_files(
        &self,
        branch: &str,
        message: &str,
        actions: &[FileAction],
    ) -> Result<CommitRecord, GitLabError> {
        let url = self.endpoint(["repository", "commits"]);
        let body = json!({
            "branch": branch,
            "commit_message": message,
            "actions": actions,
        });

        let commit: CommitRecord = self
            .request_json("commit_files", Method::POST, url, &[], Some(&body))
            .await
            .inspect_err(|err| error!(branch, error = %err, "Failed to commit files"))?;

        info!(branch, sha = %commit.id, files = actions.len(), "Commit succeeded");
        Ok(commit)
    }
}
