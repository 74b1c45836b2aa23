use super::DEPLOY_JOB;
use crate::gitlab::{JobRecord, PipelineStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Deploy,
    Build,
    Test,
    Other,
}

impl FailureKind {
    /// Classify by stage, then by job name.
    pub fn classify(stage: &str, name: &str) -> Self {
        Self::from_label(stage)
            .or_else(|| Self::from_label(name))
            .unwrap_or(FailureKind::Other)
    }

    fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("deploy") {
            Some(FailureKind::Deploy)
        } else if label.contains("build") {
            Some(FailureKind::Build)
        } else if label.contains("test") {
            Some(FailureKind::Test)
        } else {
            None
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FailureKind::Deploy => Severity::Critical,
            FailureKind::Build => Severity::High,
            FailureKind::Test => Severity::Medium,
            FailureKind::Other => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTally {
    pub success: usize,
    pub failed: usize,
    pub other: usize,
}

/// Failed jobs of one pipeline snapshot, grouped and graded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureAnalysis {
    pub failed_jobs: Vec<FailedJob>,
    pub total_jobs: usize,
    pub stages: BTreeMap<String, StageTally>,
}

impl FailureAnalysis {
    pub fn from_jobs(jobs: &[JobRecord]) -> Self {
        let mut analysis = FailureAnalysis {
            total_jobs: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            let tally = analysis.stages.entry(job.stage.clone()).or_default();
            match job.status {
                PipelineStatus::Success => tally.success += 1,
                PipelineStatus::Failed => {
                    tally.failed += 1;
                    analysis.failed_jobs.push(FailedJob {
                        id: job.id,
                        name: job.name.clone(),
                        stage: job.stage.clone(),
                        kind: FailureKind::classify(&job.stage, &job.name),
                    });
                }
                _ => tally.other += 1,
            }
        }

        analysis
    }

    pub fn severity(&self) -> Severity {
        self.failed_jobs
            .iter()
            .map(|job| job.kind.severity())
            .max()
            .unwrap_or(Severity::None)
    }

    pub fn deploy_failures(&self) -> Vec<&FailedJob> {
        self.failed_jobs
            .iter()
            .filter(|job| job.kind == FailureKind::Deploy)
            .collect()
    }

    /// The failed job the recovery cycle retries, if any.
    pub fn recoverable_deploy_job(&self) -> Option<&FailedJob> {
        self.deploy_failures()
            .into_iter()
            .find(|job| job.name == DEPLOY_JOB)
    }

    /// Stages with at least one failed job, in stage-name order.
    pub fn failed_stages(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|(_, tally)| tally.failed > 0)
            .map(|(stage, _)| stage.as_str())
            .collect()
    }

    pub fn suggested_actions(&self) -> Vec<String> {
        let mut actions = Vec::new();
        let has = |kind: FailureKind| self.failed_jobs.iter().any(|job| job.kind == kind);

        if has(FailureKind::Deploy) {
            actions.push("Clean up cluster resources left by the failed deployment and retry the deploy job".to_string());
            actions.push("Check that OPENSHIFT_SERVER and OPENSHIFT_TOKEN are set and valid".to_string());
        }
        if has(FailureKind::Build) {
            actions.push("Check the build log for dependency or compilation errors".to_string());
        }
        if has(FailureKind::Test) {
            actions.push("Run the failing tests locally and fix them before retrying".to_string());
        }
        if has(FailureKind::Other) {
            actions.push("Review the job logs of the failed jobs in the pipeline page".to_string());
        }
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u64, name: &str, stage: &str, status: &str) -> JobRecord {
        JobRecord {
            id,
            name: name.to_string(),
            stage: stage.to_string(),
            status: PipelineStatus::from(status),
        }
    }

    #[test]
    fn test_classification_prefers_stage() {
        assert_eq!(FailureKind::classify("deploy", "push-image"), FailureKind::Deploy);
        assert_eq!(FailureKind::classify("verify", "unit-tests"), FailureKind::Test);
        assert_eq!(FailureKind::classify("Build", "compile"), FailureKind::Build);
        assert_eq!(FailureKind::classify("lint", "flake8"), FailureKind::Other);
    }

    #[test]
    fn test_analysis_tallies_stages() {
        let jobs = vec![
            job(1, "build", "build", "success"),
            job(2, "unit", "test", "failed"),
            job(3, "lint", "test", "success"),
            job(4, "deploy", "deploy", "failed"),
            job(5, "notify", ".post", "skipped"),
        ];

        let analysis = FailureAnalysis::from_jobs(&jobs);

        assert_eq!(analysis.total_jobs, 5);
        assert_eq!(analysis.failed_jobs.len(), 2);
        assert_eq!(
            analysis.stages["test"],
            StageTally { success: 1, failed: 1, other: 0 }
        );
        assert_eq!(analysis.stages[".post"].other, 1);
        assert_eq!(analysis.failed_stages(), vec!["deploy", "test"]);
        assert_eq!(analysis.severity(), Severity::Critical);
        assert_eq!(analysis.deploy_failures()[0].id, 4);
        assert_eq!(analysis.suggested_actions().len(), 3);
    }

    #[test]
    fn test_recoverable_deploy_job_needs_deploy_name() {
        let analysis = FailureAnalysis::from_jobs(&[
            job(7, "push-image", "deploy", "failed"),
            job(8, "deploy", "deploy", "failed"),
        ]);
        assert_eq!(analysis.deploy_failures().len(), 2);
        assert_eq!(analysis.recoverable_deploy_job().map(|job| job.id), Some(8));

        let analysis = FailureAnalysis::from_jobs(&[
            job(7, "push-image", "deploy", "failed"),
            job(8, "deploy", "deploy", "success"),
        ]);
        assert!(analysis.recoverable_deploy_job().is_none());
    }

    #[test]
    fn test_no_failures_is_severity_none() {
        let analysis = FailureAnalysis::from_jobs(&[job(1, "build", "build", "success")]);
        assert_eq!(analysis.severity(), Severity::None);
        assert!(analysis.suggested_actions().is_empty());
        assert_eq!(FailureAnalysis::default().total_jobs, 0);
    }
}
