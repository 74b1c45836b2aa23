use super::branches::{BranchConflictResolver, ScriptedResolver};
use super::errors::GitLabError;
use super::retry::RetryPolicy;
use super::types::ProjectInfo;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

/// Branch name assumed when the project metadata cannot be read.
pub const FALLBACK_BRANCH: &str = "main";

const PAGE_SIZE: &str = "100";
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// Authenticated client for one project on a GitLab-compatible host.
///
/// Project metadata and the default branch are fetched at most once per
/// instance; everything else is re-fetched on every call.
pub struct GitLabClient {
    http: reqwest::Client,
    api_base: Url,
    project_api: Url,
    project_path: String,
    token: String,
    retry: RetryPolicy,
    project: OnceCell<ProjectInfo>,
    default_branch: OnceCell<String>,
    pub(crate) conflict_resolver: Arc<dyn BranchConflictResolver>,
}

pub struct GitLabClientBuilder {
    project_url: String,
    token: String,
    timeout: Duration,
    retry: RetryPolicy,
    conflict_resolver: Arc<dyn BranchConflictResolver>,
}

impl GitLabClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn conflict_resolver(mut self, resolver: Arc<dyn BranchConflictResolver>) -> Self {
        self.conflict_resolver = resolver;
        self
    }

    pub fn build(self) -> Result<GitLabClient, GitLabError> {
        let (api_base, project_api, project_path) = parse_project_url(&self.project_url)?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("pipeops/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!(project = %project_path, api = %project_api, "GitLab client ready");

        Ok(GitLabClient {
            http,
            api_base,
            project_api,
            project_path,
            token: self.token,
            retry: self.retry,
            project: OnceCell::new(),
            default_branch: OnceCell::new(),
            conflict_resolver: self.conflict_resolver,
        })
    }
}

/// Split a project web URL into the API root, the project API URL and the
/// project path (`group/subgroup/name`).
fn parse_project_url(project_url: &str) -> Result<(Url, Url, String), GitLabError> {
    let invalid = |reason: &str| GitLabError::InvalidUrl {
        url: project_url.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(project_url).map_err(|e| invalid(&e.to_string()))?;
    let project_path = parsed
        .path()
        .trim_matches('/')
        .trim_end_matches(".git")
        .to_string();
    if project_path.is_empty() {
        return Err(invalid("missing project path"));
    }

    let mut api_base = parsed.clone();
    api_base.set_query(None);
    api_base.set_fragment(None);
    api_base.set_path("");
    api_base
        .path_segments_mut()
        .map_err(|_| invalid("URL cannot be a base"))?
        .pop_if_empty()
        .extend(["api", "v4"]);

    let mut project_api = api_base.clone();
    project_api
        .path_segments_mut()
        .map_err(|_| invalid("URL cannot be a base"))?
        .push("projects")
        .push(&project_path);

    Ok((api_base, project_api, project_path))
}

impl GitLabClient {
    pub fn builder(project_url: &str, token: &str) -> GitLabClientBuilder {
        GitLabClientBuilder {
            project_url: project_url.to_string(),
            token: token.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            conflict_resolver: Arc::new(ScriptedResolver::abort()),
        }
    }

    /// Full project path, e.g. `devops/tools/pipeops`.
    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    /// Last segment of the project path.
    pub fn project_name(&self) -> &str {
        self.project_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.project_path)
    }

    pub fn project_api_url(&self) -> &Url {
        &self.project_api
    }

    pub(crate) fn endpoint<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.project_api.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    pub(crate) fn group_endpoint<I>(&self, group_path: &str, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.push("groups").push(group_path).extend(segments);
        }
        url
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, GitLabError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header("PRIVATE-TOKEN", &self.token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            let err = GitLabError::from_response(status, &text);
            debug!(%method, %url, error = %err, "Request rejected");
            return Err(err);
        }
        Ok(response)
    }

    /// Send a request through the retry policy.
    pub(crate) async fn send(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, GitLabError> {
        self.retry
            .execute(operation, || {
                self.send_once(method.clone(), url.clone(), query, body)
            })
            .await
    }

    pub(crate) async fn request_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, GitLabError> {
        let response = self.send(operation, method, url, query, body).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, GitLabError> {
        self.request_json(operation, Method::GET, url, query, None)
            .await
    }

    /// GET every page of a list endpoint, following `X-Next-Page`.
    pub(crate) async fn get_paginated<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GitLabError> {
        let mut items = Vec::new();
        let mut page = "1".to_string();

        loop {
            let mut page_query: Vec<(&str, String)> = query.to_vec();
            page_query.push(("per_page", PAGE_SIZE.to_string()));
            page_query.push(("page", page.clone()));

            let response = self
                .send(operation, Method::GET, url.clone(), &page_query, None)
                .await?;
            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let text = response.text().await?;
            let batch: Vec<T> = serde_json::from_str(&text)?;
            items.extend(batch);

            match next_page {
                Some(next) if next != page => page = next,
                _ => break,
            }
        }

        Ok(items)
    }

    /// Project metadata; memoised on success only.
    pub async fn project(&self) -> Option<ProjectInfo> {
        let result = self
            .project
            .get_or_try_init(|| async {
                let info: ProjectInfo = self
                    .get_json("get_project", self.project_api.clone(), &[])
                    .await?;
                info!(project = %info.path_with_namespace, "Retrieved project information");
                Ok::<_, GitLabError>(info)
            })
            .await;

        match result {
            Ok(info) => Some(info.clone()),
            Err(err) => {
                error!(error = %err, "Failed to get project info");
                None
            }
        }
    }

    /// Default branch of the project, falling back to `main` when the project
    /// cannot be read. The first answer is kept for the life of the client.
    pub async fn default_branch(&self) -> String {
        self.default_branch
            .get_or_init(|| async {
                match self.project().await {
                    Some(info) => {
                        let branch = info
                            .default_branch
                            .unwrap_or_else(|| FALLBACK_BRANCH.to_string());
                        info!(branch = %branch, "Default branch");
                        branch
                    }
                    None => {
                        warn!(
                            fallback = FALLBACK_BRANCH,
                            "Could not determine default branch, using fallback"
                        );
                        FALLBACK_BRANCH.to_string()
                    }
                }
            })
            .await
            .clone()
    }
}
