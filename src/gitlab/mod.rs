pub mod client;
pub mod branches;
pub mod repository;
pub mod merge_requests;
pub mod pipelines;
pub mod variables;
pub mod types;
pub mod errors;
pub mod retry;

pub use client::{GitLabClient, GitLabClientBuilder, FALLBACK_BRANCH};
pub use errors::GitLabError;
pub use branches::{BranchConflict, BranchConflictResolver, ConflictDecision, ScriptedResolver};
pub use pipelines::PipelineApi;
pub use retry::RetryPolicy;
pub use types::{
    BranchInfo, BranchRef, CommitRecord, FileAction, FileOperation, JobRecord, MergeRequest,
    PipelineRecord, PipelineStatus, ProjectInfo,
};
