use super::branches::first_available;
use super::client::GitLabClient;
use super::errors::GitLabError;
use super::types::MergeRequest;
use reqwest::Method;
use serde_json::json;
use tracing::{error, info, warn};

impl GitLabClient {
    /// Preferred merge target: `develop`, then `dev`, then the default branch,
    /// whichever exists first; the default branch when none is listed.
    pub async fn select_target_branch(&self) -> String {
        let available = self.list_branches().await;
        let default_branch = self.default_branch().await;
        let target = first_available(&["develop", "dev", default_branch.as_str()], &available)
            .map(str::to_string)
            .unwrap_or(default_branch.clone());
        info!(target = %target, "Auto-selected target branch");
        target
    }

    /// Open a merge request from `source_branch`.
    ///
    /// When the host reports a conflict because a merge request for the
    /// source branch is already open, that merge request is returned instead.
    pub async fn create_merge_request(
        &self,
        title: &str,
        source_branch: &str,
        target_branch: Option<&str>,
        description: Option<&str>,
    ) -> Result<MergeRequest, GitLabError> {
        let target_branch = match target_branch {
            Some(target) => target.to_string(),
            None => self.select_target_branch().await,
        };

        let mut body = json!({
            "source_branch": source_branch,
            "target_branch": target_branch,
            "title": title,
            "remove_source_branch": true,
        });
        if let Some(description) = description {
            body["description"] = json!(description);
        }

        let url = self.endpoint(["merge_requests"]);
        match self
            .request_json::<MergeRequest>("create_merge_request", Method::POST, url, &[], Some(&body))
            .await
        {
            Ok(mr) => {
                info!(
                    iid = mr.iid,
                    url = mr.web_url.as_deref().unwrap_or("unknown"),
                    source = source_branch,
                    target = %target_branch,
                    "Merge request created"
                );
                Ok(mr)
            }
            Err(err) if err.is_conflict() => {
                warn!(source = source_branch, "Merge request conflict, looking for an open one");
                match self.find_open_merge_request(source_branch).await {
                    Some(existing) => {
                        info!(
                            iid = existing.iid,
                            url = existing.web_url.as_deref().unwrap_or("unknown"),
                            "Using existing merge request"
                        );
                        Ok(existing)
                    }
                    None => {
                        error!(source = source_branch, "Conflict reported but no open merge request found");
                        Err(GitLabError::MissingExistingMergeRequest {
                            source_branch: source_branch.to_string(),
                        })
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "Failed to create merge request");
                Err(err)
            }
        }
    }

    pub async fn find_open_merge_request(&self, source_branch: &str) -> Option<MergeRequest> {
        let url = self.endpoint(["merge_requests"]);
        let query = [
            ("source_branch", source_branch.to_string()),
            ("state", "opened".to_string()),
            ("per_page", "1".to_string()),
        ];

        match self
            .get_json::<Vec<MergeRequest>>("find_merge_request", url, &query)
            .await
        {
            Ok(found) => {
                let existing = found.into_iter().next();
                if existing.is_none() {
                    warn!(source = source_branch, "No open merge request for branch");
                }
                existing
            }
            Err(err) => {
                error!(error = %err, "Error finding existing merge request");
                None
            }
        }
    }
}
