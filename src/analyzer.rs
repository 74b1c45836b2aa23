//! Project analysis
//!
//! Picks the branch that best represents current development, lists its
//! files and classifies the project by language and archetype using marker
//! files at the repository root.

use crate::gitlab::GitLabClient;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// File name (compared case-insensitively) that marks an existing pipeline.
pub const PIPELINE_FILE: &str = ".gitlab-ci.yml";

const PYTHON_MARKERS: [&str; 10] = [
    "app.py",
    "main.py",
    "server.py",
    "manage.py",
    "wsgi.py",
    "asgi.py",
    "requirements.txt",
    "setup.py",
    "pyproject.toml",
    "__init__.py",
];

const NODE_MARKERS: [&str; 6] = [
    "package.json",
    "server.js",
    "app.js",
    "index.js",
    "yarn.lock",
    "package-lock.json",
];

const SERVICE_MARKERS: [&str; 8] = [
    "dockerfile",
    "docker-compose.yml",
    "app.py",
    "server.py",
    "server.js",
    "manage.py",
    "wsgi.py",
    "asgi.py",
];

const PACKAGE_MARKERS: [&str; 3] = ["setup.py", "pyproject.toml", "package.json"];

const CONTAINER_MARKER: &str = "dockerfile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Archetype {
    Service,
    Package,
    Unknown,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Service => "service",
            Archetype::Package => "package",
            Archetype::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything learned about a project in one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub language: Language,
    pub archetype: Archetype,
    pub has_pipeline: bool,
    pub files: Vec<String>,
    pub default_branch: String,
    pub available_branches: Vec<String>,
    pub analysis_branch: String,
    /// Pipeline type confirmed by the user; `None` means the detected one.
    pub pipeline_type: Option<String>,
}

impl ProjectDescriptor {
    /// Detected `<language>_<archetype>` key.
    pub fn detected_type(&self) -> String {
        format!("{}_{}", self.language, self.archetype)
    }

    /// Pipeline type used for generation.
    pub fn pipeline_type(&self) -> String {
        self.pipeline_type
            .clone()
            .unwrap_or_else(|| self.detected_type())
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.available_branches.iter().any(|b| b == name)
    }
}

/// Branches tried in order when looking for the current development state.
pub fn branch_priority(default_branch: &str) -> Vec<&str> {
    let mut order: Vec<&str> = Vec::with_capacity(5);
    for candidate in ["develop", "dev", default_branch, "main", "master"] {
        if !order.contains(&candidate) {
            order.push(candidate);
        }
    }
    order
}

/// First priority branch present in `available`, else the default branch.
pub fn primary_analysis_branch(default_branch: &str, available: &[String]) -> String {
    branch_priority(default_branch)
        .into_iter()
        .find(|candidate| available.iter().any(|b| b == candidate))
        .unwrap_or(default_branch)
        .to_string()
}

fn lowercased(files: &[String]) -> Vec<String> {
    files.iter().map(|f| f.to_lowercase()).collect()
}

fn score(files: &[String], markers: &[&str], extension: &str) -> usize {
    let marker_hits = markers
        .iter()
        .filter(|marker| files.iter().any(|f| f == *marker))
        .count();
    let extension_hits = files.iter().filter(|f| f.ends_with(extension)).count();
    marker_hits + extension_hits
}

/// Score Python against Node.js; Python wins ties, nothing scored is unknown.
pub fn detect_language(files: &[String]) -> Language {
    let files = lowercased(files);
    let python = score(&files, &PYTHON_MARKERS, ".py");
    let node = score(&files, &NODE_MARKERS, ".js");

    let language = if python == 0 && node == 0 {
        Language::Unknown
    } else if python >= node {
        Language::Python
    } else {
        Language::JavaScript
    };
    info!(python, node, language = %language, "Language scores");
    language
}

/// Service when any service marker is present (including when package
/// markers are present too), package when only package markers are.
pub fn detect_archetype(files: &[String]) -> Archetype {
    let files = lowercased(files);
    let has = |markers: &[&str]| markers.iter().any(|m| files.iter().any(|f| f == m));

    match (has(&SERVICE_MARKERS[..]), has(&PACKAGE_MARKERS[..])) {
        (true, true) => {
            let containerised = files.iter().any(|f| f == CONTAINER_MARKER);
            info!(containerised, "Both service and package markers, choosing service");
            Archetype::Service
        }
        (true, false) => Archetype::Service,
        (false, true) => Archetype::Package,
        (false, false) => Archetype::Unknown,
    }
}

pub fn contains_pipeline_file(files: &[String]) -> bool {
    files.iter().any(|f| f.eq_ignore_ascii_case(PIPELINE_FILE))
}

pub struct ProjectAnalyzer<'a> {
    client: &'a GitLabClient,
}

impl<'a> ProjectAnalyzer<'a> {
    pub fn new(client: &'a GitLabClient) -> Self {
        Self { client }
    }

    /// Analyze the project. Never fails: unreadable data degrades to
    /// unknown/empty fields.
    pub async fn analyze(&self) -> ProjectDescriptor {
        let default_branch = self.client.default_branch().await;
        let available_branches = self.client.list_branches().await;

        let has_pipeline = self.check_for_pipeline(&default_branch, &available_branches).await;

        let primary = primary_analysis_branch(&default_branch, &available_branches);
        info!(branch = %primary, "Selected primary analysis branch");
        let (files, analysis_branch) = self.analysis_files(&primary, &default_branch).await;

        let language = detect_language(&files);
        let archetype = detect_archetype(&files);

        info!(
            branch = %analysis_branch,
            language = %language,
            archetype = %archetype,
            has_pipeline,
            files = files.len(),
            "Analysis complete"
        );

        ProjectDescriptor {
            name: self.client.project_name().to_string(),
            language,
            archetype,
            has_pipeline,
            files,
            default_branch,
            available_branches,
            analysis_branch,
            pipeline_type: None,
        }
    }

    async fn check_for_pipeline(&self, default_branch: &str, available: &[String]) -> bool {
        for branch in branch_priority(default_branch) {
            if !available.iter().any(|b| b == branch) {
                continue;
            }
            if contains_pipeline_file(&self.client.list_files(branch).await) {
                info!(branch, "Found existing pipeline");
                return true;
            }
        }
        info!("No existing pipeline found");
        false
    }

    async fn analysis_files(&self, primary: &str, default_branch: &str) -> (Vec<String>, String) {
        let files = self.client.list_files(primary).await;
        if !files.is_empty() || primary == default_branch {
            return (files, primary.to_string());
        }

        warn!(branch = primary, fallback = default_branch, "No files on primary branch, trying default");
        let fallback = self.client.list_files(default_branch).await;
        if fallback.is_empty() {
            (files, primary.to_string())
        } else {
            (fallback, default_branch.to_string())
        }
    }
}
