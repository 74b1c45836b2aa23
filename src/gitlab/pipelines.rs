use super::client::GitLabClient;
use super::errors::GitLabError;
use super::types::{JobRecord, PipelineRecord, PipelineStatus};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{error, info, warn};

/// Pipeline reads and job actions needed by the monitor.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PipelineApi: Send + Sync {
    async fn pipeline_by_id(&self, pipeline_id: u64) -> Option<PipelineRecord>;
    async fn pipeline_jobs(&self, pipeline_id: u64) -> Vec<JobRecord>;
    /// Like `pipeline_jobs`, but a failed fetch is an error instead of an empty list.
    async fn try_pipeline_jobs(&self, pipeline_id: u64) -> Result<Vec<JobRecord>, GitLabError>;
    async fn retry_job(&self, job_id: u64) -> bool;
}

impl GitLabClient {
    /// Most recent pipeline for `reference`.
    pub async fn latest_pipeline(&self, reference: &str) -> Option<PipelineRecord> {
        let url = self.endpoint(["pipelines"]);
        let query = [
            ("ref", reference.to_string()),
            ("per_page", "1".to_string()),
            ("order_by", "id".to_string()),
            ("sort", "desc".to_string()),
        ];

        match self
            .get_json::<Vec<PipelineRecord>>("latest_pipeline", url, &query)
            .await
        {
            Ok(pipelines) => match pipelines.into_iter().next() {
                Some(pipeline) => {
                    info!(reference, pipeline_id = pipeline.id, status = %pipeline.status, "Latest pipeline");
                    Some(pipeline)
                }
                None => {
                    warn!(reference, "No pipelines found for branch");
                    None
                }
            },
            Err(err) => {
                error!(reference, error = %err, "Failed to get pipeline details");
                None
            }
        }
    }

    pub async fn latest_pipeline_status(&self, reference: &str) -> PipelineStatus {
        self.latest_pipeline(reference)
            .await
            .map(|pipeline| pipeline.status)
            .unwrap_or_else(|| PipelineStatus::Unknown("unknown".to_string()))
    }

    pub async fn pipeline_by_id(&self, pipeline_id: u64) -> Option<PipelineRecord> {
        let url = self.endpoint(["pipelines", &pipeline_id.to_string()]);
        match self.get_json::<PipelineRecord>("get_pipeline", url, &[]).await {
            Ok(pipeline) => Some(pipeline),
            Err(err) => {
                error!(pipeline_id, error = %err, "Failed to get pipeline");
                None
            }
        }
    }

    pub async fn try_pipeline_jobs(&self, pipeline_id: u64) -> Result<Vec<JobRecord>, GitLabError> {
        let url = self.endpoint(["pipelines", &pipeline_id.to_string(), "jobs"]);
        self.get_paginated::<JobRecord>("pipeline_jobs", url, &[]).await
    }

    pub async fn pipeline_jobs(&self, pipeline_id: u64) -> Vec<JobRecord> {
        match self.try_pipeline_jobs(pipeline_id).await {
            Ok(jobs) => {
                info!(pipeline_id, count = jobs.len(), "Retrieved pipeline jobs");
                jobs
            }
            Err(err) => {
                error!(pipeline_id, error = %err, "Failed to get pipeline jobs");
                Vec::new()
            }
        }
    }

    pub async fn retry_job(&self, job_id: u64) -> bool {
        let url = self.endpoint(["jobs", &job_id.to_string(), "retry"]);
        match self.send("retry_job", Method::POST, url, &[], None).await {
            Ok(_) => {
                info!(job_id, "Job retried");
                true
            }
            Err(err) => {
                error!(job_id, error = %err, "Failed to retry job");
                false
            }
        }
    }

    /// Start a pipeline on `reference` with optional CI variables.
    pub async fn trigger_pipeline(
        &self,
        reference: &str,
        variables: &[(String, String)],
    ) -> Option<PipelineRecord> {
        let url = self.endpoint(["pipeline"]);
        let mut body = json!({ "ref": reference });
        if !variables.is_empty() {
            body["variables"] = variables
                .iter()
                .map(|(key, value)| json!({ "key": key, "value": value }))
                .collect();
        }

        match self
            .request_json::<PipelineRecord>("trigger_pipeline", Method::POST, url, &[], Some(&body))
            .await
        {
            Ok(pipeline) => {
                info!(pipeline_id = pipeline.id, reference, "Pipeline triggered");
                Some(pipeline)
            }
            Err(err) => {
                error!(reference, error = %err, "Failed to trigger pipeline");
                None
            }
        }
    }
}

#[async_trait]
impl PipelineApi for GitLabClient {
    async fn pipeline_by_id(&self, pipeline_id: u64) -> Option<PipelineRecord> {
        GitLabClient::pipeline_by_id(self, pipeline_id).await
    }

    async fn pipeline_jobs(&self, pipeline_id: u64) -> Vec<JobRecord> {
        GitLabClient::pipeline_jobs(self, pipeline_id).await
    }

    async fn try_pipeline_jobs(&self, pipeline_id: u64) -> Result<Vec<JobRecord>, GitLabError> {
        GitLabClient::try_pipeline_jobs(self, pipeline_id).await
    }

    async fn retry_job(&self, job_id: u64) -> bool {
        GitLabClient::retry_job(self, job_id).await
    }
}
