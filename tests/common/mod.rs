//! Shared GitLab API mock for integration tests.

#![allow(dead_code)]

use pipeops::gitlab::{BranchConflictResolver, GitLabClient, RetryPolicy};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PROJECT_PATH: &str = "team/billing-api";
pub const ENCODED_PROJECT: &str = "team%2Fbilling-api";
pub const TOKEN: &str = "glpat-test-token";

pub struct GitLabMock {
    pub server: MockServer,
}

impl GitLabMock {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn project_url(&self) -> String {
        format!("{}/{PROJECT_PATH}", self.server.uri())
    }

    /// Project API path with `suffix` appended, as seen by the server.
    pub fn api(suffix: &str) -> String {
        format!("/api/v4/projects/{ENCODED_PROJECT}{suffix}")
    }

    pub fn client(&self) -> GitLabClient {
        GitLabClient::builder(&self.project_url(), TOKEN)
            .retry_policy(RetryPolicy::immediate(3))
            .build()
            .unwrap()
    }

    pub fn client_with_resolver(&self, resolver: Arc<dyn BranchConflictResolver>) -> GitLabClient {
        GitLabClient::builder(&self.project_url(), TOKEN)
            .retry_policy(RetryPolicy::immediate(3))
            .conflict_resolver(resolver)
            .build()
            .unwrap()
    }

    pub async fn mock_project(&self, default_branch: &str) {
        Mock::given(method("GET"))
            .and(path(Self::api("")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "name": "billing-api",
                "path_with_namespace": PROJECT_PATH,
                "default_branch": default_branch,
                "web_url": format!("https://gitlab.example.com/{PROJECT_PATH}"),
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_branches(&self, names: &[&str]) {
        let body: Vec<Value> = names
            .iter()
            .map(|name| json!({ "name": name, "commit": { "id": format!("sha-{name}") } }))
            .collect();
        Mock::given(method("GET"))
            .and(path(Self::api("/repository/branches")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_tree(&self, reference: &str, files: &[&str]) {
        let body: Vec<Value> = files
            .iter()
            .map(|file| json!({ "path": file, "type": "blob" }))
            .collect();
        Mock::given(method("GET"))
            .and(path(Self::api("/repository/tree")))
            .and(query_param("ref", reference))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_tree_missing(&self, reference: &str) {
        Mock::given(method("GET"))
            .and(path(Self::api("/repository/tree")))
            .and(query_param("ref", reference))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "404 Tree Not Found" })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_jobs(&self, pipeline_id: u64, jobs: Value) {
        Mock::given(method("GET"))
            .and(path(Self::api(&format!("/pipelines/{pipeline_id}/jobs"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(jobs))
            .mount(&self.server)
            .await;
    }

    /// Bodies of every request received for `suffix`, parsed as JSON.
    pub async fn bodies(&self, http_method: &str, suffix: &str) -> Vec<Value> {
        let expected = Self::api(suffix);
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == expected)
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }
}
