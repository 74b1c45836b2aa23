use crate::analyzer::ProjectDescriptor;
use crate::gitlab::branches::first_available;
use crate::gitlab::FALLBACK_BRANCH;

/// The three branches one generation run works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPlan {
    /// Branch created and committed to.
    pub feature: String,
    /// Base of the feature branch; file presence is checked here.
    pub source: String,
    /// Merge request target.
    pub target: String,
}

impl BranchPlan {
    pub fn resolve(descriptor: &ProjectDescriptor, feature_branch: &str) -> Self {
        Self {
            feature: feature_branch.to_string(),
            source: source_branch(descriptor),
            target: target_branch(descriptor),
        }
    }
}

/// Analysis branch, then default branch, then the first listed branch,
/// then `main`.
pub fn source_branch(descriptor: &ProjectDescriptor) -> String {
    if descriptor.has_branch(&descriptor.analysis_branch) {
        descriptor.analysis_branch.clone()
    } else if descriptor.has_branch(&descriptor.default_branch) {
        descriptor.default_branch.clone()
    } else {
        descriptor
            .available_branches
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_BRANCH.to_string())
    }
}

/// A `develop`/`dev` analysis branch is its own target; otherwise the first
/// of `develop`, `dev` and the default branch that exists, else the default
/// branch.
pub fn target_branch(descriptor: &ProjectDescriptor) -> String {
    let analysis = descriptor.analysis_branch.as_str();
    if analysis == "develop" || analysis == "dev" {
        return analysis.to_string();
    }

    let default_branch = descriptor.default_branch.as_str();
    first_available(&["develop", "dev", default_branch], &descriptor.available_branches)
        .unwrap_or(default_branch)
        .to_string()
}
