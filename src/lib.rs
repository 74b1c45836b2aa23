// PipeOps Library - GitLab CI/CD pipeline orchestration
// This exposes the core components for testing and integration

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod definitions;
pub mod external;
pub mod generator;
pub mod gitlab;
pub mod monitor;
pub mod shutdown;
pub mod telemetry;

// Re-export key types for easy access
pub use analyzer::{Archetype, Language, ProjectAnalyzer, ProjectDescriptor};
pub use config::PipeopsConfig;
pub use definitions::{DefinitionsError, PipelineDefinition, PipelineDefinitions};
pub use external::{CleanupRequest, ClusterCleanup, CommandExecutor, OpenShiftCleaner};
pub use generator::{BranchPlan, GenerateError, GenerationOutcome, PipelineGenerator};
pub use gitlab::{GitLabClient, GitLabError, PipelineApi, PipelineStatus, RetryPolicy};
pub use monitor::{FailureAnalysis, MonitorOutcome, MonitorResult, PipelineMonitor, RecoveryOutcome};
pub use shutdown::{Completion, ShutdownCoordinator};
pub use telemetry::{create_run_span, generate_correlation_id, init_telemetry};
