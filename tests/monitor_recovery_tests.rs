//! Monitoring and deploy recovery through the real client.

mod common;

use async_trait::async_trait;
use common::GitLabMock;
use pipeops::external::{CleanupRequest, ClusterCleanup};
use pipeops::monitor::{FailureKind, MonitorOutcome, PipelineMonitor, RecoveryOutcome, Severity};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const PIPELINE_ID: u64 = 77;
const POLL: Duration = Duration::from_millis(10);

/// Counts calls and reports a fixed result.
struct CountingCleanup {
    succeed: bool,
    calls: AtomicUsize,
}

impl CountingCleanup {
    fn new(succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            succeed,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ClusterCleanup for CountingCleanup {
    async fn cleanup(&self, request: &CleanupRequest) -> bool {
        assert_eq!(request.route(), "billing-api-route");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.succeed
    }
}

fn request() -> CleanupRequest {
    CleanupRequest::new("https://api.cluster:6443", "sha256~token", "billing-api-service")
        .with_route("billing-api-route")
}

async fn mock_failed_deploy(mock: &GitLabMock) {
    Mock::given(method("GET"))
        .and(path(GitLabMock::api(&format!("/pipelines/{PIPELINE_ID}"))))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": PIPELINE_ID,
            "status": "failed",
            "ref": "feature/pipeops"
        })))
        .mount(&mock.server)
        .await;
    mock.mock_jobs(
        PIPELINE_ID,
        json!([
            { "id": 900, "name": "build", "stage": "build", "status": "success" },
            { "id": 901, "name": "deploy", "stage": "deploy", "status": "failed" },
            { "id": 902, "name": "smoke", "stage": "verify", "status": "skipped" }
        ]),
    )
    .await;
}

#[tokio::test]
async fn test_failed_pipeline_is_analyzed() {
    let mock = GitLabMock::new().await;
    mock_failed_deploy(&mock).await;

    let monitor = PipelineMonitor::new(Arc::new(mock.client()), POLL);
    let result = monitor
        .monitor_pipeline(PIPELINE_ID, Duration::from_secs(5))
        .await;

    assert_eq!(result.outcome, MonitorOutcome::Failed);
    assert_eq!(result.checks, 1);
    let analysis = result.failure_analysis.unwrap();
    assert_eq!(analysis.total_jobs, 3);
    assert_eq!(analysis.failed_jobs.len(), 1);
    assert_eq!(analysis.failed_jobs[0].kind, FailureKind::Deploy);
    assert_eq!(analysis.severity(), Severity::Critical);
    assert_eq!(analysis.failed_stages(), vec!["deploy"]);
}

#[tokio::test]
async fn test_deploy_recovery_retries_job_once() {
    let mock = GitLabMock::new().await;
    mock_failed_deploy(&mock).await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/jobs/901/retry")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 903, "status": "pending" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let cleanup = CountingCleanup::new(true);
    let monitor = PipelineMonitor::new(Arc::new(mock.client()), POLL).with_cleanup(cleanup.clone());

    let outcome = monitor.handle_deploy_failure(PIPELINE_ID, &request()).await;

    assert_eq!(
        outcome,
        RecoveryOutcome::Retried {
            job_id: 901,
            cleanup_succeeded: true
        }
    );
    assert_eq!(cleanup.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_cleanup_still_retries() {
    let mock = GitLabMock::new().await;
    mock_failed_deploy(&mock).await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/jobs/901/retry")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 903 })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let monitor =
        PipelineMonitor::new(Arc::new(mock.client()), POLL).with_cleanup(CountingCleanup::new(false));

    let outcome = monitor.handle_deploy_failure(PIPELINE_ID, &request()).await;
    assert_eq!(
        outcome,
        RecoveryOutcome::Retried {
            job_id: 901,
            cleanup_succeeded: false
        }
    );
}

#[tokio::test]
async fn test_recovery_without_cleanup_does_not_retry() {
    let mock = GitLabMock::new().await;
    mock_failed_deploy(&mock).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock.server)
        .await;

    let monitor = PipelineMonitor::new(Arc::new(mock.client()), POLL);
    assert!(!monitor.can_recover());

    let outcome = monitor.handle_deploy_failure(PIPELINE_ID, &request()).await;
    assert_eq!(outcome, RecoveryOutcome::CleanupUnavailable);
}

#[tokio::test]
async fn test_rejected_retry_is_reported() {
    let mock = GitLabMock::new().await;
    mock_failed_deploy(&mock).await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/jobs/901/retry")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "403 Forbidden" })))
        .mount(&mock.server)
        .await;

    let monitor =
        PipelineMonitor::new(Arc::new(mock.client()), POLL).with_cleanup(CountingCleanup::new(true));

    let outcome = monitor.handle_deploy_failure(PIPELINE_ID, &request()).await;
    assert_eq!(outcome, RecoveryOutcome::RetryFailed { job_id: 901 });
    assert!(!outcome.is_retried());
}
