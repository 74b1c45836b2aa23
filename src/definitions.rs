//! Pipeline definitions document
//!
//! A YAML file mapping pipeline type names (`python_service`, ...) to the
//! template directory, the files rendered from it and the CI variables the
//! generated pipeline needs.

use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_DEFINITIONS_PATH: &str = "Config/pipeline_definitions.yml";

#[derive(Debug, Error)]
pub enum DefinitionsError {
    #[error("Configuration file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration file is empty: {}", .path.display())]
    Empty { path: PathBuf },
    #[error("Invalid YAML configuration: {0}")]
    Parse(#[from] config::ConfigError),
    #[error("'pipelines' section must be a non-empty mapping")]
    MissingPipelines,
    #[error("Pipeline '{pipeline}' missing required field '{field}'")]
    MissingField { pipeline: String, field: &'static str },
    #[error("Pipeline type '{name}' not found. Available: {}", .available.join(", "))]
    UnknownPipeline { name: String, available: Vec<String> },
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    global: GlobalSection,
    #[serde(default)]
    pipelines: Option<BTreeMap<String, RawPipeline>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPipeline {
    description: Option<String>,
    template_path: Option<String>,
    required_env: Option<Vec<String>>,
    files_to_create: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalSection {
    #[serde(default)]
    pub default_branches: DefaultBranches,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultBranches {
    pub feature_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    pub name: String,
    pub description: Option<String>,
    pub template_path: PathBuf,
    pub required_env: Vec<String>,
    pub files_to_create: Vec<String>,
}

impl PipelineDefinition {
    fn from_raw(name: String, raw: RawPipeline) -> Result<Self, DefinitionsError> {
        let missing = |field| DefinitionsError::MissingField {
            pipeline: name.clone(),
            field,
        };
        let template_path = raw.template_path.ok_or_else(|| missing("template_path"))?;
        let required_env = raw.required_env.ok_or_else(|| missing("required_env"))?;
        let files_to_create = raw.files_to_create.ok_or_else(|| missing("files_to_create"))?;

        Ok(Self {
            name,
            description: raw.description,
            template_path: PathBuf::from(template_path),
            required_env,
            files_to_create,
        })
    }

    pub fn template_file(&self, file_name: &str) -> PathBuf {
        self.template_path.join(file_name)
    }

    pub fn template_dir_exists(&self) -> bool {
        self.template_path.is_dir()
    }

    /// Listed files with no template under the template directory.
    pub fn missing_templates(&self) -> Vec<&str> {
        self.files_to_create
            .iter()
            .filter(|file| !self.template_file(file).exists())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineDefinitions {
    pub global: GlobalSection,
    pipelines: BTreeMap<String, PipelineDefinition>,
}

impl PipelineDefinitions {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DefinitionsError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading pipeline definitions");

        if !path.exists() {
            return Err(DefinitionsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| DefinitionsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let definitions = Self::from_yaml(&text).map_err(|err| match err {
            DefinitionsError::Empty { .. } => DefinitionsError::Empty {
                path: path.to_path_buf(),
            },
            other => other,
        })?;
        definitions.check_templates();
        Ok(definitions)
    }

    pub fn from_yaml(text: &str) -> Result<Self, DefinitionsError> {
        let body_is_blank = text
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#') || line == "---");
        if body_is_blank {
            return Err(DefinitionsError::Empty {
                path: PathBuf::new(),
            });
        }

        let raw: RawDocument = Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;

        let raw_pipelines = raw
            .pipelines
            .filter(|p| !p.is_empty())
            .ok_or(DefinitionsError::MissingPipelines)?;

        let mut pipelines = BTreeMap::new();
        for (name, pipeline) in raw_pipelines {
            let definition = PipelineDefinition::from_raw(name.clone(), pipeline)?;
            pipelines.insert(name, definition);
        }

        info!(count = pipelines.len(), "Pipeline definitions validated");
        Ok(Self {
            global: raw.global,
            pipelines,
        })
    }

    /// Warn about template directories or files that are not on disk.
    pub fn check_templates(&self) {
        for definition in self.pipelines.values() {
            if !definition.template_dir_exists() {
                warn!(
                    pipeline = %definition.name,
                    path = %definition.template_path.display(),
                    "Template directory missing"
                );
                continue;
            }
            let missing = definition.missing_templates();
            if !missing.is_empty() {
                warn!(
                    pipeline = %definition.name,
                    missing = %missing.join(", "),
                    "Missing template files"
                );
            }
        }
    }

    pub fn pipeline(&self, name: &str) -> Result<&PipelineDefinition, DefinitionsError> {
        self.pipelines
            .get(name)
            .ok_or_else(|| DefinitionsError::UnknownPipeline {
                name: name.to_string(),
                available: self.pipeline_types().iter().map(|s| s.to_string()).collect(),
            })
    }

    pub fn pipeline_types(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineDefinition> {
        self.pipelines.values()
    }

    /// Feature branch from the document, else `fallback`.
    pub fn feature_branch(&self, fallback: &str) -> String {
        self.global
            .default_branches
            .feature_prefix
            .clone()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}
