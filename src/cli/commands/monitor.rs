use super::{connect, print_banner};
use crate::cli::{interact, resolve_token, validate_inputs};
use crate::config::PipeopsConfig;
use crate::external::{CleanupRequest, OpenShiftCleaner, ProcessCommandExecutor};
use crate::gitlab::{GitLabClient, PipelineRecord, PipelineStatus, ScriptedResolver};
use crate::monitor::{
    FailureAnalysis, FailureKind, JobCompletion, MonitorOutcome, MonitorResult, PipelineMonitor, RecoveryOutcome, DEPLOY_JOB,
};
use crate::shutdown::{Completion, ShutdownCoordinator};
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const CLUSTER_SERVER_VARIABLE: &str = "OPENSHIFT_SERVER";
pub const CLUSTER_TOKEN_VARIABLE: &str = "OPENSHIFT_TOKEN";

pub struct MonitorCommand {
    pub project_url: String,
    pub token: Option<String>,
    pub pipeline_id: Option<u64>,
    pub reference: Option<String>,
    pub max_wait: Option<Duration>,
    pub trigger: bool,
    pub config: PipeopsConfig,
}

impl MonitorCommand {
    pub fn new(project_url: String, token: Option<String>, config: PipeopsConfig) -> Self {
        Self {
            project_url,
            token,
            pipeline_id: None,
            reference: None,
            max_wait: None,
            trigger: false,
            config,
        }
    }

    pub fn with_pipeline_id(mut self, pipeline_id: Option<u64>) -> Self {
        self.pipeline_id = pipeline_id;
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_trigger(mut self, trigger: bool) -> Self {
        self.trigger = trigger;
        self
    }

    pub async fn execute(&self) -> Result<()> {
        let token = resolve_token(self.token.clone(), self.config.gitlab.token.as_deref())?;
        validate_inputs(&self.project_url, &token)?;

        print_banner("PIPEOPS CLI - PIPELINE MONITOR", 60);

        let client = connect(
            &self.project_url,
            &token,
            &self.config,
            Arc::new(ScriptedResolver::abort()),
        )?;

        let pipeline = match self.pipeline_id {
            Some(id) => client.pipeline_by_id(id).await,
            None => {
                let reference = match &self.reference {
                    Some(reference) => reference.clone(),
                    None => client.default_branch().await,
                };
                if self.trigger {
                    println!("🚀 Triggering pipeline on {reference}...");
                    client.trigger_pipeline(&reference, &[]).await
                } else {
                    client.latest_pipeline(&reference).await
                }
            }
        };

        let Some(pipeline) = pipeline else {
            bail!("No pipeline found");
        };

        let watcher = PipelineWatcher::new(client, &self.config)
            .with_max_wait(self.max_wait.unwrap_or_else(|| self.config.monitor.max_wait()));
        watcher.follow(&pipeline).await;
        Ok(())
    }
}

/// Monitors one pipeline from the command line and offers deploy recovery
/// when it fails.
pub(crate) struct PipelineWatcher {
    client: Arc<GitLabClient>,
    poll_interval: Duration,
    max_wait: Duration,
    job_timeout: Duration,
    auto_confirm: bool,
}

impl PipelineWatcher {
    pub(crate) fn new(client: Arc<GitLabClient>, config: &PipeopsConfig) -> Self {
        Self {
            client,
            poll_interval: config.monitor.poll_interval(),
            max_wait: config.monitor.max_wait(),
            job_timeout: config.monitor.job_timeout(),
            auto_confirm: false,
        }
    }

    pub(crate) fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub(crate) fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor::new(self.client.clone(), self.poll_interval)
    }

    /// Watch `pipeline` to completion. Ctrl-C stops the wait and returns.
    pub(crate) async fn follow(&self, pipeline: &PipelineRecord) {
        println!("📊 Pipeline {}: {}", pipeline.id, pipeline.status);
        if let Some(url) = &pipeline.web_url {
            println!("🔗 {url}");
        }

        let monitor = self.monitor();
        let result = match pipeline.status {
            PipelineStatus::Pending | PipelineStatus::Running => {
                println!("🏃 Monitoring...");
                let watch = monitor.monitor_pipeline(pipeline.id, self.max_wait);
                match ShutdownCoordinator::run_until_interrupted("pipeline monitoring", watch).await {
                    Completion::Finished(result) => result,
                    Completion::Interrupted => {
                        println!("\n⏹️  Monitoring stopped");
                        return;
                    }
                }
            }
            PipelineStatus::Failed => {
                println!("💥 Pipeline failed - analyzing...");
                MonitorResult {
                    pipeline_id: pipeline.id,
                    outcome: MonitorOutcome::Failed,
                    elapsed: Duration::ZERO,
                    checks: 0,
                    failure_analysis: Some(monitor.analyze_failure(pipeline.id).await),
                }
            }
            _ => match settled_result(pipeline) {
                Some(result) => result,
                None => {
                    println!("⏸️  Pipeline is {}; nothing to monitor", pipeline.status);
                    return;
                }
            },
        };

        self.report(&result).await;
    }

    async fn report(&self, result: &MonitorResult) {
        let seconds = result.elapsed.as_secs();
        match result.outcome {
            MonitorOutcome::Success => {
                if seconds > 0 {
                    println!("🎉 Pipeline succeeded! ({seconds}s)");
                } else {
                    println!("🎉 Pipeline succeeded!");
                }
            }
            MonitorOutcome::Failed => {
                if seconds > 0 {
                    println!("💥 Pipeline failed ({seconds}s)");
                } else {
                    println!("💥 Pipeline failed");
                }
                let analysis = result.failure_analysis.clone().unwrap_or_default();
                display_failure(&analysis);

                if analysis.recoverable_deploy_job().is_some() {
                    println!("🚨 Deploy failed - offering cleanup");
                    self.recover(result.pipeline_id).await;
                }
            }
            MonitorOutcome::Timeout => {
                println!("⏰ Stopped waiting after {seconds}s ({} checks)", result.checks);
                println!("💡 The pipeline is still running; check GitLab for its result");
            }
            other => println!("🏁 Pipeline finished: {other}"),
        }
    }

    /// Clean up the cluster with the project's CI credentials and retry the
    /// failed deploy job.
    async fn recover(&self, pipeline_id: u64) {
        println!("\n🔧 DEPLOY FAILURE RECOVERY");
        println!("{}", "=".repeat(40));

        let mut variables = self.client.group_variables().await;
        variables.extend(self.client.project_variables().await);

        let (Some(server), Some(cluster_token)) = (
            variables.get(CLUSTER_SERVER_VARIABLE),
            variables.get(CLUSTER_TOKEN_VARIABLE),
        ) else {
            println!("❌ Missing OpenShift credentials ({CLUSTER_SERVER_VARIABLE}/{CLUSTER_TOKEN_VARIABLE})");
            return;
        };

        let request = cleanup_request(self.client.project_name(), server, cluster_token);
        println!("🎯 Target: {}, {}", request.service_name, request.route());
        println!("🏢 OpenShift cluster: {server}");

        if !self.auto_confirm && !interact::confirm("🤔 Clean up OpenShift and retry? [Y/n]: ", true) {
            println!("⏹️  Skipping cleanup");
            return;
        }

        println!("🧹 Cleaning up...");
        let cleaner = OpenShiftCleaner::new(Arc::new(ProcessCommandExecutor::default()));
        let monitor = self.monitor().with_cleanup(Arc::new(cleaner));

        match monitor.handle_deploy_failure(pipeline_id, &request).await {
            RecoveryOutcome::Retried {
                job_id,
                cleanup_succeeded,
            } => {
                if !cleanup_succeeded {
                    println!("⚠️  Cleanup reported problems");
                }
                info!(job_id, "Deploy job retried");
                println!("✅ Deploy job retried");
                self.await_redeploy(&monitor, pipeline_id).await;
            }
            RecoveryOutcome::RetryFailed { job_id } => {
                warn!(job_id, "Deploy job retry rejected");
                println!("❌ Failed to retry job");
            }
            RecoveryOutcome::NoFailedDeployJob => println!("⚠️  No failed deploy job found"),
            RecoveryOutcome::CleanupUnavailable => println!("❌ Cluster cleanup unavailable"),
        }
    }

    async fn await_redeploy(&self, monitor: &PipelineMonitor, pipeline_id: u64) {
        println!("⏳ Waiting for {DEPLOY_JOB} job...");
        let wait = monitor.wait_for_job_completion(pipeline_id, DEPLOY_JOB, self.job_timeout);
        match ShutdownCoordinator::run_until_interrupted("deploy job", wait).await {
            Completion::Finished(JobCompletion::Finished { job, .. }) => {
                if job.status == PipelineStatus::Success {
                    println!("🎉 Deploy succeeded after cleanup");
                } else {
                    println!("💥 Deploy finished with status {}", job.status);
                    println!("🔍 Check the job log in GitLab");
                }
            }
            Completion::Finished(JobCompletion::TimedOut { elapsed, .. }) => {
                println!("⏰ Deploy still running after {}s", elapsed.as_secs());
                println!("🔍 Check GitLab for results");
            }
            Completion::Finished(JobCompletion::NotFound { job_name }) => {
                println!("⚠️  Job {job_name} not found in pipeline {pipeline_id}");
            }
            Completion::Interrupted => println!("\n⏹️  Monitoring stopped"),
        }
    }
}

/// Result for a pipeline that already reached a terminal state before monitoring began.
pub(crate) fn settled_result(pipeline: &PipelineRecord) -> Option<MonitorResult> {
    MonitorOutcome::from_terminal(&pipeline.status).map(|outcome| MonitorResult {
        pipeline_id: pipeline.id,
        outcome,
        elapsed: Duration::ZERO,
        checks: 0,
        failure_analysis: None,
    })
}

/// Resources named after the project: `<project>-service` and `<project>-route`.
pub fn cleanup_request(project_name: &str, server: &str, token: &str) -> CleanupRequest {
    CleanupRequest::new(server, token, &format!("{project_name}-service"))
        .with_route(&format!("{project_name}-route"))
}

pub fn display_failure(analysis: &FailureAnalysis) {
    println!();
    println!("{}", "=".repeat(60));
    println!("           PIPELINE FAILURE DETAILS");
    println!("{}", "=".repeat(60));
    println!("🚨 Severity Level: {}", analysis.severity().to_string().to_uppercase());
    println!(
        "📊 Overview: {}/{} jobs failed",
        analysis.failed_jobs.len(),
        analysis.total_jobs
    );

    let failed_stages = analysis.failed_stages();
    if !failed_stages.is_empty() {
        println!("🎯 Failed Stages: {}", failed_stages.join(", "));
    }
    for job in &analysis.failed_jobs {
        let icon = match job.kind {
            FailureKind::Deploy => "🚚",
            FailureKind::Build => "🔨",
            FailureKind::Test => "🧪",
            FailureKind::Other => "⚠️",
        };
        println!("   {icon} {} ({} stage)", job.name, job.stage);
    }

    let actions = analysis.suggested_actions();
    if !actions.is_empty() {
        println!("\n💡 Suggested actions:");
        for action in actions {
            println!("   • {action}");
        }
    }
    println!("{}", "=".repeat(60));
}
