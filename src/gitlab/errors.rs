use reqwest::StatusCode;
use thiserror::Error;

/// Longest slice of a response body kept in an error message.
const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum GitLabError {
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid project URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Unexpected response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Branch '{name}' already exists and was not replaced")]
    BranchConflictAborted { name: String },
    #[error("Existing branch '{name}' could not be deleted")]
    BranchDeleteFailed { name: String },
    #[error("Merge request conflict for '{source_branch}' but no open merge request was found")]
    MissingExistingMergeRequest { source_branch: String },
}

impl GitLabError {
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let body = body.chars().take(BODY_EXCERPT_LEN).collect();
        GitLabError::Http { status, body }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GitLabError::Http { status, .. } => Some(*status),
            GitLabError::Network(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(StatusCode::CONFLICT)
    }

    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(StatusCode::BAD_REQUEST)
    }
}
