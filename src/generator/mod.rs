//! Pipeline generation
//!
//! Renders the templates of a pipeline type, commits them to a feature
//! branch cut from the project's working branch and opens a merge request.

pub mod branches;
pub mod description;
pub mod template;

pub use branches::BranchPlan;
pub use template::{PlaceholderRenderer, RenderContext, TemplateRenderer};

use crate::analyzer::ProjectDescriptor;
use crate::definitions::{DefinitionsError, PipelineDefinition, PipelineDefinitions};
use crate::gitlab::{CommitRecord, FileAction, FileOperation, GitLabClient, GitLabError, MergeRequest};
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Definitions(#[from] DefinitionsError),
    #[error("Template file not found: {}", .path.display())]
    TemplateMissing { path: PathBuf },
    #[error("Failed to read template {}: {source}", .path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Pipeline type '{pipeline_type}' lists no files to create")]
    NoFiles { pipeline_type: String },
    #[error("Failed to create branch '{branch}': {source}")]
    Branch {
        branch: String,
        #[source]
        source: GitLabError,
    },
    #[error("Failed to commit files: {0}")]
    Commit(#[source] GitLabError),
    #[error("Failed to create merge request: {0}")]
    MergeRequest(#[source] GitLabError),
}

/// Result of a completed generation run.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub branches: BranchPlan,
    pub pipeline_type: String,
    pub files: Vec<(String, FileOperation)>,
    pub commit: CommitRecord,
    pub merge_request: MergeRequest,
}

impl GenerationOutcome {
    pub fn files_created(&self) -> usize {
        self.files.len()
    }
}

/// "Update" when the project already had a pipeline, else "Add".
pub fn action_word(has_pipeline: bool) -> &'static str {
    if has_pipeline {
        "Update"
    } else {
        "Add"
    }
}

pub fn commit_message(descriptor: &ProjectDescriptor, source_branch: &str) -> String {
    format!(
        "{} pipeline configuration for {}\n\nGenerated by PipeOps CLI\nBased on: {}",
        action_word(descriptor.has_pipeline),
        descriptor.pipeline_type(),
        source_branch
    )
}

pub fn merge_request_title(descriptor: &ProjectDescriptor) -> String {
    format!(
        "PipeOps: {} pipeline for {}",
        action_word(descriptor.has_pipeline),
        descriptor.pipeline_type()
    )
}

/// Render every file of `definition`. Each file is an update when its path
/// is in `source_files`, otherwise a create.
pub async fn build_actions(
    definition: &PipelineDefinition,
    context: &RenderContext,
    renderer: &dyn TemplateRenderer,
    source_files: &[String],
) -> Result<Vec<FileAction>, GenerateError> {
    let mut actions = Vec::with_capacity(definition.files_to_create.len());

    for file_name in &definition.files_to_create {
        let path = definition.template_file(file_name);
        if !path.exists() {
            return Err(GenerateError::TemplateMissing { path });
        }
        let template = template::load_template(&path)
            .await
            .map_err(|source| GenerateError::TemplateRead {
                path: path.clone(),
                source,
            })?;

        let exists = source_files.iter().any(|f| f == file_name);
        actions.push(FileAction {
            action: FileOperation::for_presence(exists),
            file_path: file_name.clone(),
            content: renderer.render(&template, context),
        });
    }

    Ok(actions)
}

pub struct PipelineGenerator<'a> {
    client: &'a GitLabClient,
    renderer: Box<dyn TemplateRenderer>,
    feature_branch: String,
    today: NaiveDate,
}

impl<'a> PipelineGenerator<'a> {
    /// `feature_branch` is used when the definitions document names none.
    pub fn new(client: &'a GitLabClient, feature_branch: &str) -> Self {
        Self {
            client,
            renderer: Box::new(PlaceholderRenderer),
            feature_branch: feature_branch.to_string(),
            today: chrono::Local::now().date_naive(),
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn plan(&self, descriptor: &ProjectDescriptor, definitions: &PipelineDefinitions) -> BranchPlan {
        BranchPlan::resolve(descriptor, &definitions.feature_branch(&self.feature_branch))
    }

    /// Render the files without touching the remote; every file is treated
    /// as a create.
    pub async fn preview(
        &self,
        descriptor: &ProjectDescriptor,
        definitions: &PipelineDefinitions,
    ) -> Result<Vec<FileAction>, GenerateError> {
        let definition = definitions.pipeline(&descriptor.pipeline_type())?;
        let context = RenderContext::for_project(descriptor, self.today);
        build_actions(definition, &context, self.renderer.as_ref(), &[]).await
    }

    /// Create the feature branch, commit the rendered files and open the
    /// merge request. A failure at any step stops the run; a branch already
    /// created is left in place.
    pub async fn generate_and_commit(
        &self,
        descriptor: &ProjectDescriptor,
        definitions: &PipelineDefinitions,
    ) -> Result<GenerationOutcome, GenerateError> {
        let pipeline_type = descriptor.pipeline_type();
        let definition = definitions.pipeline(&pipeline_type)?;
        if definition.files_to_create.is_empty() {
            return Err(GenerateError::NoFiles { pipeline_type });
        }

        let branches = self.plan(descriptor, definitions);
        info!(
            source = %branches.source,
            feature = %branches.feature,
            target = %branches.target,
            "Branch strategy"
        );

        self.client
            .create_branch(&branches.feature, Some(branches.source.as_str()))
            .await
            .map_err(|source| GenerateError::Branch {
                branch: branches.feature.clone(),
                source,
            })?;

        let source_files = self.client.list_files(&branches.source).await;
        let context = RenderContext::for_project(descriptor, self.today);
        let actions = build_actions(definition, &context, self.renderer.as_ref(), &source_files)
            .await
            .inspect_err(|err| error!(error = %err, "Failed to prepare pipeline files"))?;
        info!(count = actions.len(), "Prepared pipeline files");

        let commit = self
            .client
            .commit_files(&branches.feature, &commit_message(descriptor, &branches.source), &actions)
            .await
            .map_err(GenerateError::Commit)?;

        let description = description::merge_request_description(
            &descriptor.name,
            &pipeline_type,
            &branches,
            &actions,
            &definition.required_env,
            self.today,
        );
        let merge_request = self
            .client
            .create_merge_request(
                &merge_request_title(descriptor),
                &branches.feature,
                Some(branches.target.as_str()),
                Some(description.as_str()),
            )
            .await
            .map_err(GenerateError::MergeRequest)?;

        info!(pipeline_type = %pipeline_type, iid = merge_request.iid, "Pipeline generation completed");

        Ok(GenerationOutcome {
            branches,
            pipeline_type,
            files: actions
                .into_iter()
                .map(|action| (action.file_path, action.action))
                .collect(),
            commit,
            merge_request,
        })
    }
}
