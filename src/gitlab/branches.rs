use super::client::GitLabClient;
use super::errors::GitLabError;
use super::types::{BranchInfo, BranchRef};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{error, info, warn};

const COMMIT_MESSAGE_PREVIEW: usize = 50;

/// First of `candidates`, in order, that appears in `available`.
pub fn first_available<'a>(candidates: &[&'a str], available: &[String]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|candidate| available.iter().any(|b| b == candidate))
}

/// What is known about a branch that blocks branch creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchConflict {
    pub name: String,
    pub last_commit_message: Option<String>,
    pub last_commit_date: Option<String>,
}

impl BranchConflict {
    pub fn from_info(info: &BranchInfo) -> Self {
        let commit = info.commit.as_ref();
        Self {
            name: info.name.clone(),
            last_commit_message: commit
                .and_then(|c| c.message.as_deref())
                .map(|m| m.chars().take(COMMIT_MESSAGE_PREVIEW).collect()),
            last_commit_date: commit.and_then(|c| c.created_at.clone()),
        }
    }

    /// Conflict for a branch whose metadata could not be read.
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            last_commit_message: None,
            last_commit_date: None,
        }
    }

    pub fn has_metadata(&self) -> bool {
        self.last_commit_message.is_some() || self.last_commit_date.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Delete the existing branch and create it again from the requested ref.
    Recreate,
    Abort,
}

/// Decides what to do when a branch about to be created already exists.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BranchConflictResolver: Send + Sync {
    async fn resolve(&self, conflict: &BranchConflict) -> ConflictDecision;
}

/// Resolver that always gives the same answer (non-interactive runs).
#[derive(Debug, Clone, Copy)]
pub struct ScriptedResolver {
    decision: ConflictDecision,
}

impl ScriptedResolver {
    pub fn new(decision: ConflictDecision) -> Self {
        Self { decision }
    }

    pub fn recreate() -> Self {
        Self::new(ConflictDecision::Recreate)
    }

    pub fn abort() -> Self {
        Self::new(ConflictDecision::Abort)
    }
}

#[async_trait]
impl BranchConflictResolver for ScriptedResolver {
    async fn resolve(&self, conflict: &BranchConflict) -> ConflictDecision {
        info!(branch = %conflict.name, decision = ?self.decision, "Resolving branch conflict");
        self.decision
    }
}

impl GitLabClient {
    /// Names of all branches; empty when the listing fails.
    pub async fn list_branches(&self) -> Vec<String> {
        let url = self.endpoint(["repository", "branches"]);
        match self
            .get_paginated::<BranchInfo>("list_branches", url, &[])
            .await
        {
            Ok(branches) => {
                let names: Vec<String> = branches.into_iter().map(|b| b.name).collect();
                info!(
                    count = names.len(),
                    first = %names.iter().take(5).cloned().collect::<Vec<_>>().join(", "),
                    "Found branches"
                );
                names
            }
            Err(err) => {
                error!(error = %err, "Failed to get branches");
                Vec::new()
            }
        }
    }

    pub async fn branch_exists(&self, name: &str) -> bool {
        let url = self.endpoint(["repository", "branches", name]);
        match self.send("branch_exists", Method::GET, url, &[], None).await {
            Ok(_) => {
                info!(branch = name, "Branch exists");
                true
            }
            Err(err) if err.is_not_found() => {
                info!(branch = name, "Branch does not exist");
                false
            }
            Err(err) => {
                error!(branch = name, error = %err, "Error checking branch");
                false
            }
        }
    }

    pub async fn branch_info(&self, name: &str) -> Option<BranchInfo> {
        let url = self.endpoint(["repository", "branches", name]);
        match self.get_json::<BranchInfo>("get_branch", url, &[]).await {
            Ok(info) => Some(info),
            Err(err) => {
                error!(branch = name, error = %err, "Failed to get branch info");
                None
            }
        }
    }

    pub async fn delete_branch(&self, name: &str) -> bool {
        let url = self.endpoint(["repository", "branches", name]);
        match self.send("delete_branch", Method::DELETE, url, &[], None).await {
            Ok(_) => {
                info!(branch = name, "Branch deleted");
                true
            }
            Err(err) => {
                error!(branch = name, error = %err, "Failed to delete branch");
                false
            }
        }
    }

    /// Create `name` from `from_ref` (default branch when `None`).
    ///
    /// An existing branch is only replaced when the injected conflict
    /// resolver answers `Recreate`. A rejected source ref is retried once
    /// against the default branch.
    pub async fn create_branch(
        &self,
        name: &str,
        from_ref: Option<&str>,
    ) -> Result<BranchRef, GitLabError> {
        let origin = match from_ref {
            Some(r) => r.to_string(),
            None => self.default_branch().await,
        };

        if self.branch_exists(name).await {
            warn!(branch = name, "Branch already exists");

            let conflict = match self.branch_info(name).await {
                Some(info) => BranchConflict::from_info(&info),
                None => BranchConflict::unknown(name),
            };

            match self.conflict_resolver.resolve(&conflict).await {
                ConflictDecision::Recreate => {
                    if !self.delete_branch(name).await {
                        return Err(GitLabError::BranchDeleteFailed {
                            name: name.to_string(),
                        });
                    }
                }
                ConflictDecision::Abort => {
                    info!(branch = name, "Branch creation cancelled");
                    return Err(GitLabError::BranchConflictAborted {
                        name: name.to_string(),
                    });
                }
            }
        }

        match self.post_branch(name, &origin).await {
            Ok(created) => Ok(created),
            Err(err) if err.is_bad_request() => {
                let default_branch = self.default_branch().await;
                if origin == default_branch {
                    error!(branch = name, error = %err, "Failed to create branch");
                    return Err(err);
                }
                warn!(
                    reference = %origin,
                    fallback = %default_branch,
                    "Reference invalid, retrying from default branch"
                );
                self.post_branch(name, &default_branch).await.inspect_err(|err| {
                    error!(branch = name, error = %err, "Failed to create branch");
                })
            }
            Err(err) => {
                error!(branch = name, error = %err, "Failed to create branch");
                Err(err)
            }
        }
    }

    async fn post_branch(&self, name: &str, origin: &str) -> Result<BranchRef, GitLabError> {
        let url = self.endpoint(["repository", "branches"]);
        let body = json!({ "branch": name, "ref": origin });
        self.send("create_branch", Method::POST, url, &[], Some(&body))
            .await?;
        info!(branch = name, origin, "Branch created");
        Ok(BranchRef {
            name: name.to_string(),
            origin: Some(origin.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::types::CommitSummary;

    #[test]
    fn test_conflict_truncates_commit_message() {
        let info = BranchInfo {
            name: "feature/pipeops".to_string(),
            commit: Some(CommitSummary {
                id: "abc123".to_string(),
                message: Some("x".repeat(80)),
                created_at: Some("2026-10-01T12:00:00Z".to_string()),
            }),
            protected: false,
        };

        let conflict = BranchConflict::from_info(&info);
        assert_eq!(conflict.last_commit_message.unwrap().len(), COMMIT_MESSAGE_PREVIEW);
        assert_eq!(conflict.last_commit_date.as_deref(), Some("2026-10-01T12:00:00Z"));
    }

    #[test]
    fn test_first_available_respects_candidate_order() {
        let available = vec!["main".to_string(), "dev".to_string(), "develop".to_string()];
        assert_eq!(first_available(&["develop", "dev", "main"], &available), Some("develop"));
        assert_eq!(first_available(&["release", "dev"], &available), Some("dev"));
        assert_eq!(first_available(&["release"], &available), None);
    }

    #[test]
    fn test_unknown_conflict_has_no_metadata() {
        assert!(!BranchConflict::unknown("feature/pipeops").has_metadata());
    }

    #[tokio::test]
    async fn test_scripted_resolver_answers() {
        let conflict = BranchConflict::unknown("feature/pipeops");
        assert_eq!(
            ScriptedResolver::recreate().resolve(&conflict).await,
            ConflictDecision::Recreate
        );
        assert_eq!(
            ScriptedResolver::abort().resolve(&conflict).await,
            ConflictDecision::Abort
        );
    }
}
