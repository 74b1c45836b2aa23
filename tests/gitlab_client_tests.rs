//! Repository client behaviour against a mocked GitLab API.

mod common;

use async_trait::async_trait;
use common::{GitLabMock, TOKEN};
use pipeops::gitlab::{
    BranchConflict, BranchConflictResolver, ConflictDecision, GitLabError, PipelineStatus,
    ScriptedResolver,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

const FEATURE: &str = "/repository/branches/feature%2Fpipeops";

/// Answers with a fixed decision and keeps every conflict it was shown.
struct RecordingResolver {
    decision: ConflictDecision,
    seen: Mutex<Vec<BranchConflict>>,
}

impl RecordingResolver {
    fn new(decision: ConflictDecision) -> Arc<Self> {
        Arc::new(Self {
            decision,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl BranchConflictResolver for RecordingResolver {
    async fn resolve(&self, conflict: &BranchConflict) -> ConflictDecision {
        self.seen.lock().unwrap().push(conflict.clone());
        self.decision
    }
}

async fn mock_existing_feature_branch(mock: &GitLabMock) {
    Mock::given(method("GET"))
        .and(path(GitLabMock::api(FEATURE)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "feature/pipeops",
            "commit": {
                "id": "c0ffee",
                "message": "PipeOps: Add pipeline for python_service",
                "created_at": "2026-10-01T09:30:00Z"
            }
        })))
        .mount(&mock.server)
        .await;
}

#[tokio::test]
async fn test_default_branch_is_fetched_once() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("")))
        .and(header("PRIVATE-TOKEN", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "path_with_namespace": "team/billing-api",
            "default_branch": "trunk"
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let client = mock.client();
    assert_eq!(client.default_branch().await, "trunk");
    assert_eq!(client.default_branch().await, "trunk");
}

#[tokio::test]
async fn test_default_branch_falls_back_to_main() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("")))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock.server)
        .await;

    assert_eq!(mock.client().default_branch().await, "main");
}

#[tokio::test]
async fn test_list_files_walks_the_fallback_chain() {
    let mock = GitLabMock::new().await;
    mock.mock_project("main").await;
    mock.mock_tree_missing("release").await;
    mock.mock_tree_missing("main").await;
    mock.mock_branches(&["master", "develop"]).await;
    mock.mock_tree("master", &["app.py", "requirements.txt"]).await;

    let files = mock.client().list_files("release").await;
    assert_eq!(files, vec!["app.py", "requirements.txt"]);
}

#[tokio::test]
async fn test_list_files_skips_directories() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/repository/tree")))
        .and(query_param("ref", "main"))
        .and(query_param("recursive", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "path": "src", "type": "tree" },
            { "path": "src/app.py", "type": "blob" }
        ])))
        .mount(&mock.server)
        .await;

    assert_eq!(mock.client().list_files("main").await, vec!["src/app.py"]);
}

#[tokio::test]
async fn test_existing_branch_is_recreated_after_confirmation() {
    let mock = GitLabMock::new().await;
    mock_existing_feature_branch(&mock).await;
    Mock::given(method("DELETE"))
        .and(path(GitLabMock::api(FEATURE)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/repository/branches")))
        .and(body_partial_json(json!({ "branch": "feature/pipeops", "ref": "develop" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "feature/pipeops" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let resolver = RecordingResolver::new(ConflictDecision::Recreate);
    let client = mock.client_with_resolver(resolver.clone());

    let created = client.create_branch("feature/pipeops", Some("develop")).await.unwrap();
    assert_eq!(created.name, "feature/pipeops");
    assert_eq!(created.origin.as_deref(), Some("develop"));

    let seen = resolver.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].last_commit_message.as_deref(),
        Some("PipeOps: Add pipeline for python_service")
    );
    assert_eq!(seen[0].last_commit_date.as_deref(), Some("2026-10-01T09:30:00Z"));
}

#[tokio::test]
async fn test_aborted_conflict_leaves_branch_alone() {
    let mock = GitLabMock::new().await;
    mock_existing_feature_branch(&mock).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock.server)
        .await;

    let client = mock.client_with_resolver(Arc::new(ScriptedResolver::abort()));
    let err = client
        .create_branch("feature/pipeops", Some("develop"))
        .await
        .unwrap_err();

    assert!(matches!(err, GitLabError::BranchConflictAborted { ref name } if name == "feature/pipeops"));
}

#[tokio::test]
async fn test_invalid_source_ref_retries_from_default_branch() {
    let mock = GitLabMock::new().await;
    mock.mock_project("main").await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api(FEATURE)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/repository/branches")))
        .and(body_partial_json(json!({ "ref": "develop" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid reference name" })))
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/repository/branches")))
        .and(body_partial_json(json!({ "ref": "main" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "feature/pipeops" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let created = mock
        .client()
        .create_branch("feature/pipeops", Some("develop"))
        .await
        .unwrap();
    assert_eq!(created.origin.as_deref(), Some("main"));
}

#[tokio::test]
async fn test_merge_request_conflict_returns_open_request() {
    let mock = GitLabMock::new().await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/merge_requests")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": ["Another open merge request already exists for this source branch: !7"]
        })))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/merge_requests")))
        .and(query_param("source_branch", "feature/pipeops"))
        .and(query_param("state", "opened"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1007,
            "iid": 7,
            "title": "PipeOps: Add pipeline for python_service",
            "web_url": "https://gitlab.example.com/team/billing-api/-/merge_requests/7",
            "source_branch": "feature/pipeops",
            "target_branch": "develop",
            "state": "opened"
        }])))
        .expect(1)
        .mount(&mock.server)
        .await;

    let mr = mock
        .client()
        .create_merge_request("PipeOps", "feature/pipeops", Some("develop"), None)
        .await
        .unwrap();
    assert_eq!(mr.iid, 7);
    assert_eq!(mr.target_branch, "develop");
}

#[tokio::test]
async fn test_merge_request_target_prefers_dev_branches() {
    let mock = GitLabMock::new().await;
    mock.mock_project("main").await;
    mock.mock_branches(&["main", "dev"]).await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/merge_requests")))
        .and(body_partial_json(json!({
            "source_branch": "feature/pipeops",
            "target_branch": "dev",
            "remove_source_branch": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1008,
            "iid": 8,
            "source_branch": "feature/pipeops",
            "target_branch": "dev"
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let mr = mock
        .client()
        .create_merge_request("PipeOps", "feature/pipeops", None, Some("body"))
        .await
        .unwrap();
    assert_eq!(mr.iid, 8);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/pipelines/55")))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/pipelines/55")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 55,
            "status": "running",
            "ref": "feature/pipeops"
        })))
        .mount(&mock.server)
        .await;

    let pipeline = mock.client().pipeline_by_id(55).await.unwrap();
    assert_eq!(pipeline.status, PipelineStatus::Running);
    assert_eq!(pipeline.ref_name.as_deref(), Some("feature/pipeops"));
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/pipelines/56")))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock.server)
        .await;

    assert!(mock.client().pipeline_by_id(56).await.is_none());
}

#[tokio::test]
async fn test_latest_pipeline_status_without_pipelines() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/pipelines")))
        .and(query_param("ref", "feature/pipeops"))
        .and(query_param("order_by", "id"))
        .and(query_param("sort", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock.server)
        .await;

    let status = mock.client().latest_pipeline_status("feature/pipeops").await;
    assert_eq!(status, PipelineStatus::Unknown("unknown".to_string()));
}

#[tokio::test]
async fn test_trigger_pipeline_sends_variables() {
    let mock = GitLabMock::new().await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/pipeline")))
        .and(body_partial_json(json!({
            "ref": "develop",
            "variables": [{ "key": "DEPLOY_ENV", "value": "staging" }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 777, "status": "created", "ref": "develop"
        })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let pipeline = mock
        .client()
        .trigger_pipeline("develop", &[("DEPLOY_ENV".to_string(), "staging".to_string())])
        .await
        .unwrap();
    assert_eq!(pipeline.id, 777);
    assert!(!pipeline.status.is_terminal());
}

#[tokio::test]
async fn test_missing_variables_consider_groups() {
    let mock = GitLabMock::new().await;
    Mock::given(method("GET"))
        .and(path(GitLabMock::api("/variables")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "key": "OPENSHIFT_SERVER", "value": "https://api.cluster:6443" }
        ])))
        .mount(&mock.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/groups/team/variables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "key": "OPENSHIFT_TOKEN", "value": "sha256~group" }
        ])))
        .mount(&mock.server)
        .await;
    Mock::given(method("POST"))
        .and(path(GitLabMock::api("/variables")))
        .and(body_partial_json(json!({
            "key": "DOCKER_REGISTRY",
            "value": "registry.example.com",
            "protected": false,
            "masked": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "key": "DOCKER_REGISTRY" })))
        .expect(1)
        .mount(&mock.server)
        .await;

    let client = mock.client();
    let required = vec![
        "OPENSHIFT_SERVER".to_string(),
        "OPENSHIFT_TOKEN".to_string(),
        "DOCKER_REGISTRY".to_string(),
    ];
    assert_eq!(client.find_missing_variables(&required).await, vec!["DOCKER_REGISTRY"]);
    assert!(client.add_variable("DOCKER_REGISTRY", "registry.example.com").await);
}
