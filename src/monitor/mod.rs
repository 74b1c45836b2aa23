//! Pipeline monitoring
//!
//! Polls one pipeline until it reaches a terminal state or the wait bound
//! runs out, analyses failures and drives the deploy recovery cycle
//! (cluster cleanup followed by a job retry).

pub mod analysis;

pub use analysis::{FailedJob, FailureAnalysis, FailureKind, Severity, StageTally};

use crate::external::{CleanupRequest, ClusterCleanup};
use crate::gitlab::{JobRecord, PipelineApi, PipelineStatus};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Name of the job the recovery cycle retries.
pub const DEPLOY_JOB: &str = "deploy";

/// How monitoring of a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorOutcome {
    Success,
    Failed,
    Canceled,
    Skipped,
    /// No terminal state within the wait bound. Says nothing about the
    /// pipeline's eventual result.
    Timeout,
}

impl MonitorOutcome {
    pub fn from_terminal(status: &PipelineStatus) -> Option<Self> {
        match status {
            PipelineStatus::Success => Some(MonitorOutcome::Success),
            PipelineStatus::Failed => Some(MonitorOutcome::Failed),
            PipelineStatus::Canceled => Some(MonitorOutcome::Canceled),
            PipelineStatus::Skipped => Some(MonitorOutcome::Skipped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorOutcome::Success => "success",
            MonitorOutcome::Failed => "failed",
            MonitorOutcome::Canceled => "canceled",
            MonitorOutcome::Skipped => "skipped",
            MonitorOutcome::Timeout => "timeout",
        }
    }
}

impl fmt::Display for MonitorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorResult {
    pub pipeline_id: u64,
    pub outcome: MonitorOutcome,
    pub elapsed: Duration,
    pub checks: u32,
    /// Present when the pipeline failed.
    pub failure_analysis: Option<FailureAnalysis>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobCompletion {
    Finished { job: JobRecord, elapsed: Duration },
    TimedOut { job_name: String, elapsed: Duration },
    /// The pipeline has no job with that name.
    NotFound { job_name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Retry accepted; cleanup may still have reported problems.
    Retried { job_id: u64, cleanup_succeeded: bool },
    RetryFailed { job_id: u64 },
    NoFailedDeployJob,
    /// Monitor was built without a cleanup capability.
    CleanupUnavailable,
}

impl RecoveryOutcome {
    pub fn is_retried(&self) -> bool {
        matches!(self, RecoveryOutcome::Retried { .. })
    }
}

pub struct PipelineMonitor {
    api: Arc<dyn PipelineApi>,
    cleanup: Option<Arc<dyn ClusterCleanup>>,
    poll_interval: Duration,
}

impl PipelineMonitor {
    pub fn new(api: Arc<dyn PipelineApi>, poll_interval: Duration) -> Self {
        Self {
            api,
            cleanup: None,
            poll_interval,
        }
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn ClusterCleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    pub fn can_recover(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Poll `pipeline_id` until it is terminal or `max_wait` has elapsed.
    ///
    /// A status that cannot be fetched counts as a non-terminal check.
    pub async fn monitor_pipeline(&self, pipeline_id: u64, max_wait: Duration) -> MonitorResult {
        info!(pipeline_id, max_wait_secs = max_wait.as_secs(), "Starting pipeline monitoring");

        let start = Instant::now();
        let mut checks = 0u32;

        while start.elapsed() < max_wait {
            checks += 1;

            match self.api.pipeline_by_id(pipeline_id).await {
                Some(pipeline) => {
                    let elapsed = start.elapsed();
                    info!(
                        pipeline_id,
                        status = %pipeline.status,
                        check = checks,
                        elapsed_secs = elapsed.as_secs(),
                        "Pipeline status"
                    );

                    if let Some(outcome) = MonitorOutcome::from_terminal(&pipeline.status) {
                        let failure_analysis = if outcome == MonitorOutcome::Failed {
                            warn!(pipeline_id, "Pipeline failed, analyzing");
                            Some(self.analyze_failure(pipeline_id).await)
                        } else {
                            None
                        };
                        return MonitorResult {
                            pipeline_id,
                            outcome,
                            elapsed,
                            checks,
                            failure_analysis,
                        };
                    }
                }
                None => {
                    error!(pipeline_id, check = checks, "Could not get pipeline information");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        warn!(pipeline_id, max_wait_secs = max_wait.as_secs(), "Pipeline monitoring timed out");
        MonitorResult {
            pipeline_id,
            outcome: MonitorOutcome::Timeout,
            elapsed: start.elapsed(),
            checks,
            failure_analysis: None,
        }
    }

    pub async fn analyze_failure(&self, pipeline_id: u64) -> FailureAnalysis {
        let jobs = self.api.pipeline_jobs(pipeline_id).await;
        let analysis = FailureAnalysis::from_jobs(&jobs);
        info!(
            pipeline_id,
            failed = analysis.failed_jobs.len(),
            total = analysis.total_jobs,
            severity = %analysis.severity(),
            "Failure analysis"
        );
        analysis
    }

    /// Clean up the cluster and retry the failed `deploy` job.
    ///
    /// The retry happens whatever the cleanup reports.
    pub async fn handle_deploy_failure(
        &self,
        pipeline_id: u64,
        request: &CleanupRequest,
    ) -> RecoveryOutcome {
        info!(pipeline_id, service = %request.service_name, "Handling deploy failure");

        let analysis = FailureAnalysis::from_jobs(&self.api.pipeline_jobs(pipeline_id).await);
        let Some(deploy_job) = analysis.recoverable_deploy_job() else {
            info!(pipeline_id, "No failed deploy job found");
            return RecoveryOutcome::NoFailedDeployJob;
        };
        let job_id = deploy_job.id;
        info!(job_id, "Found failed deploy job");

        let Some(cleanup) = &self.cleanup else {
            warn!(job_id, "No cluster cleanup configured, not retrying");
            return RecoveryOutcome::CleanupUnavailable;
        };

        let cleanup_succeeded = cleanup.cleanup(request).await;
        if cleanup_succeeded {
            info!(job_id, "Cluster cleanup successful");
        } else {
            warn!(job_id, "Cluster cleanup had issues, retrying anyway");
        }

        if self.api.retry_job(job_id).await {
            info!(job_id, "Deploy job retry initiated");
            RecoveryOutcome::Retried {
                job_id,
                cleanup_succeeded,
            }
        } else {
            error!(job_id, "Failed to retry deploy job");
            RecoveryOutcome::RetryFailed { job_id }
        }
    }

    /// Poll the job named `job_name` until it is terminal or `timeout` elapses.
    pub async fn wait_for_job_completion(
        &self,
        pipeline_id: u64,
        job_name: &str,
        timeout: Duration,
    ) -> JobCompletion {
        info!(pipeline_id, job = job_name, "Waiting for job");
        let start = Instant::now();

        while start.elapsed() < timeout {
            let jobs = match self.api.try_pipeline_jobs(pipeline_id).await {
                Ok(jobs) => jobs,
                Err(err) => {
                    warn!(pipeline_id, job = job_name, error = %err, "Could not list jobs, will retry");
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };
            let Some(job) = jobs.into_iter().find(|job| job.name == job_name) else {
                warn!(pipeline_id, job = job_name, "Job not found");
                return JobCompletion::NotFound {
                    job_name: job_name.to_string(),
                };
            };

            if job.status.is_terminal() {
                info!(job = job_name, status = %job.status, "Job completed");
                return JobCompletion::Finished {
                    job,
                    elapsed: start.elapsed(),
                };
            }

            info!(job = job_name, status = %job.status, "Job still running");
            tokio::time::sleep(self.poll_interval).await;
        }

        JobCompletion::TimedOut {
            job_name: job_name.to_string(),
            elapsed: start.elapsed(),
        }
    }
}
