use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a pipeline or job as reported by the repository host.
///
/// States the tool does not reason about (`created`, `manual`, `preparing`, ...)
/// are kept verbatim in `Unknown` and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PipelineStatus {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Unknown(String),
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Success
                | PipelineStatus::Failed
                | PipelineStatus::Canceled
                | PipelineStatus::Skipped
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Success => "success",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Canceled => "canceled",
            PipelineStatus::Skipped => "skipped",
            PipelineStatus::Unknown(other) => other,
        }
    }
}

impl From<&str> for PipelineStatus {
    fn from(status: &str) -> Self {
        match status {
            "pending" => PipelineStatus::Pending,
            "running" => PipelineStatus::Running,
            "success" => PipelineStatus::Success,
            "failed" => PipelineStatus::Failed,
            "canceled" => PipelineStatus::Canceled,
            "skipped" => PipelineStatus::Skipped,
            _ => PipelineStatus::Unknown(status.to_string()),
        }
    }
}

impl From<String> for PipelineStatus {
    fn from(status: String) -> Self {
        PipelineStatus::from(status.as_str())
    }
}

impl From<PipelineStatus> for String {
    fn from(status: PipelineStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project metadata, memoised by the client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommitSummary {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Branch detail as returned by the branches endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BranchInfo {
    pub name: String,
    #[serde(default)]
    pub commit: Option<CommitSummary>,
    #[serde(default)]
    pub protected: bool,
}

/// A branch by name, with the ref it was created from when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Update,
}

impl FileOperation {
    /// A path already present on the base branch must be updated, never created.
    pub fn for_presence(exists_on_source: bool) -> Self {
        if exists_on_source {
            FileOperation::Update
        } else {
            FileOperation::Create
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            FileOperation::Create => "created",
            FileOperation::Update => "updated",
        }
    }
}

/// One entry of a multi-file commit, serialised in the commits API shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAction {
    pub action: FileOperation,
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommitRecord {
    pub id: String,
    #[serde(default)]
    pub short_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MergeRequest {
    pub id: u64,
    pub iid: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub web_url: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineRecord {
    pub id: u64,
    pub status: PipelineStatus,
    #[serde(rename = "ref", default)]
    pub ref_name: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub stage: String,
    pub status: PipelineStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CiVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
}
