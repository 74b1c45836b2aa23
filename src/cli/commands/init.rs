use super::monitor::PipelineWatcher;
use super::{connect, load_definitions};
use crate::analyzer::{ProjectAnalyzer, ProjectDescriptor};
use crate::cli::{interact, resolve_token, validate_inputs, ConflictMode};
use crate::config::PipeopsConfig;
use crate::definitions::{PipelineDefinitions, DEFAULT_DEFINITIONS_PATH};
use crate::generator::{GenerationOutcome, PipelineGenerator};
use crate::gitlab::{FileOperation, GitLabClient, PipelineStatus};
use crate::telemetry::{create_run_span, generate_correlation_id};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Instrument};

pub struct InitCommand {
    pub project_url: String,
    pub token: Option<String>,
    pub definitions_path: PathBuf,
    pub dry_run: bool,
    pub auto_confirm: bool,
    pub monitor: bool,
    pub conflict_mode: ConflictMode,
    pub config: PipeopsConfig,
}

impl InitCommand {
    pub fn new(project_url: String, token: Option<String>, config: PipeopsConfig) -> Self {
        Self {
            project_url,
            token,
            definitions_path: PathBuf::from(DEFAULT_DEFINITIONS_PATH),
            dry_run: false,
            auto_confirm: false,
            monitor: true,
            conflict_mode: ConflictMode::Ask,
            config,
        }
    }

    pub fn with_definitions(mut self, path: PathBuf) -> Self {
        self.definitions_path = path;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub fn with_monitoring(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_conflict_mode(mut self, conflict_mode: ConflictMode) -> Self {
        self.conflict_mode = conflict_mode;
        self
    }

    fn monitoring_enabled(&self) -> bool {
        self.monitor && !self.dry_run
    }

    pub async fn execute(&self) -> Result<()> {
        let correlation_id = generate_correlation_id();
        let span = create_run_span("init", Some(&self.project_url), &correlation_id);
        self.run().instrument(span).await
    }

    async fn run(&self) -> Result<()> {
        println!("{}", "=".repeat(60));
        println!("          PIPEOPS CLI - PIPELINE SETUP");
        println!("{}", "=".repeat(60));
        if self.dry_run {
            println!("🧪 DRY RUN MODE - No changes will be made");
        } else if self.monitoring_enabled() {
            println!("🔍 PIPELINE MONITORING ENABLED");
        } else {
            println!("⏭️  PIPELINE MONITORING DISABLED");
        }
        println!("{}", "-".repeat(60));

        let token = resolve_token(self.token.clone(), self.config.gitlab.token.as_deref())?;
        validate_inputs(&self.project_url, &token)?;

        println!("[1/6] Loading configuration...");
        let definitions = load_definitions(&self.definitions_path)?;
        definitions.check_templates();
        println!("✅ Configuration loaded");

        println!("\n[2/6] Analyzing project...");
        let client = connect(
            &self.project_url,
            &token,
            &self.config,
            self.conflict_mode.resolver(),
        )?;
        let mut descriptor = ProjectAnalyzer::new(&client).analyze().await;
        println!("✅ Project analyzed");

        println!("\n[3/6] Configuration...");
        let Some(pipeline_type) = self.choose_pipeline_type(&descriptor, &definitions) else {
            println!("👋 Cancelled - nothing was changed");
            return Ok(());
        };
        let definition = definitions.pipeline(&pipeline_type)?;
        descriptor.pipeline_type = Some(pipeline_type);
        println!("✅ Configuration confirmed");

        println!("\n[4/6] Checking environment variables...");
        self.check_variables(&client, &definition.required_env).await;
        println!("✅ Environment variables checked");

        println!("\n[5/6] Generating pipeline...");
        let generator = PipelineGenerator::new(&client, &self.config.generator.feature_branch);
        if self.dry_run {
            let actions = generator.preview(&descriptor, &definitions).await?;
            let plan = generator.plan(&descriptor, &definitions);
            println!("🧪 DRY RUN: Would create the following files:");
            for action in &actions {
                println!("  - {}", action.file_path);
            }
            println!("📁 From template: {}", definition.template_path.display());
            println!("🔀 {} → {} → {}", plan.source, plan.feature, plan.target);
            println!("✅ Pipeline generated");
            println!("\n[6/6] Complete!");
            println!("\n🎉 DRY RUN COMPLETED SUCCESSFULLY");
            println!("Run without --dry-run to make actual changes");
            return Ok(());
        }

        let outcome = generator
            .generate_and_commit(&descriptor, &definitions)
            .await
            .context("Failed to generate pipeline")?;
        println!("✅ Pipeline generated");

        println!("\n[6/6] Complete!");
        display_success(&outcome);

        if self.monitoring_enabled() {
            self.watch_first_pipeline(client.clone(), &outcome).await;
        } else {
            println!("\n💡 To monitor pipeline: use without --no-monitor flag");
        }

        Ok(())
    }

    fn choose_pipeline_type(
        &self,
        descriptor: &ProjectDescriptor,
        definitions: &PipelineDefinitions,
    ) -> Option<String> {
        if self.auto_confirm {
            println!("⚡ Auto-confirm mode - using detected settings");
            interact::display_project_analysis(descriptor);
            return Some(descriptor.detected_type());
        }
        interact::confirm_pipeline_type(descriptor, &definitions.pipeline_types())
    }

    async fn check_variables(&self, client: &GitLabClient, required: &[String]) {
        let missing = client.find_missing_variables(required).await;
        if missing.is_empty() {
            println!("✅ All required environment variables are present");
            return;
        }

        if self.dry_run {
            println!(
                "⚠️  Would need to add {} variables: {}",
                missing.len(),
                missing.join(", ")
            );
            return;
        }

        if self.auto_confirm {
            println!("⚠️  Missing variables: {}", missing.join(", "));
            println!("💡 Add them in Project Settings → CI/CD → Variables");
            return;
        }

        for (key, value) in interact::ask_for_variables(&missing) {
            if client.add_variable(&key, &value).await {
                println!("✅ Added {key}");
            } else {
                println!("❌ Failed to add {key}");
            }
        }
    }

    async fn watch_first_pipeline(&self, client: Arc<GitLabClient>, outcome: &GenerationOutcome) {
        println!("\n🔍 Starting pipeline monitoring...");
        println!("⏳ Waiting for pipeline to start...");
        tokio::time::sleep(self.config.monitor.start_delay()).await;

        let Some(pipeline) = client.latest_pipeline(&outcome.branches.feature).await else {
            println!("⚠️  No pipeline found - it may start soon");
            if let Some(url) = &outcome.merge_request.web_url {
                println!("💡 Check manually: {url}");
            }
            return;
        };

        info!(pipeline_id = pipeline.id, status = %pipeline.status, "Found pipeline for feature branch");
        if !matches!(
            pipeline.status,
            PipelineStatus::Pending | PipelineStatus::Running | PipelineStatus::Failed
        ) {
            println!("📊 Pipeline {}: {}", pipeline.id, pipeline.status);
            return;
        }

        PipelineWatcher::new(client, &self.config)
            .with_auto_confirm(self.auto_confirm)
            .follow(&pipeline)
            .await;
    }
}

fn display_success(outcome: &GenerationOutcome) {
    println!("\n🎉 SUCCESS!");
    println!("{}", "=".repeat(30));
    println!(
        "🔀 {} → {} → {}",
        outcome.branches.source, outcome.branches.feature, outcome.branches.target
    );
    for (file, operation) in &outcome.files {
        let marker = match operation {
            FileOperation::Update => "📝",
            FileOperation::Create => "✨",
        };
        println!("{marker} {file} ({})", operation.past_tense());
    }
    println!("📁 {} files committed", outcome.files_created());
    if let Some(url) = &outcome.merge_request.web_url {
        println!("🔗 MR: {url}");
    }
    println!("✅ Pipeline setup complete!");
    println!("💡 Merge the MR to activate");
    println!("{}", "=".repeat(30));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_disables_monitoring() {
        let command = InitCommand::new(
            "https://gitlab.example.com/team/app".to_string(),
            None,
            PipeopsConfig::default(),
        );
        assert!(command.monitoring_enabled());

        let command = command.with_dry_run(true);
        assert!(!command.monitoring_enabled());

        let command = InitCommand::new(
            "https://gitlab.example.com/team/app".to_string(),
            None,
            PipeopsConfig::default(),
        )
        .with_monitoring(false);
        assert!(!command.monitoring_enabled());
    }
}
