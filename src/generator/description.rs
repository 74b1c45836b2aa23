use super::branches::BranchPlan;
use crate::gitlab::{FileAction, FileOperation};
use chrono::NaiveDate;

/// Markdown body of the merge request opened for generated files.
pub fn merge_request_description(
    project_name: &str,
    pipeline_type: &str,
    branches: &BranchPlan,
    actions: &[FileAction],
    required_env: &[String],
    today: NaiveDate,
) -> String {
    let mut text = format!(
        "## PipeOps: Automated Pipeline Setup\n\n\
         ### Project Information\n\
         - **Project**: `{project_name}`\n\
         - **Pipeline Type**: `{pipeline_type}`\n\
         - **Source Branch**: `{}` (used as base for new pipeline)\n\
         - **Generated**: {}\n\n",
        branches.source,
        today.format("%Y-%m-%d")
    );

    text.push_str(&format!(
        "### Branch Flow\n```\n{} → {} → {}\n```\n\n",
        branches.source, branches.feature, branches.target
    ));

    text.push_str("### Files Modified\n");
    for action in actions {
        let marker = match action.action {
            FileOperation::Update => "📝",
            FileOperation::Create => "✨",
        };
        text.push_str(&format!(
            "- {marker} `{}` ({})\n",
            action.file_path,
            action.action.past_tense()
        ));
    }

    text.push_str("\n### Required Environment Variables\n");
    for var in required_env {
        text.push_str(&format!("- `{var}`\n"));
    }

    text.push_str(
        "\n### Next Steps\n\
         1. Review the pipeline configuration files\n\
         2. Ensure all required environment variables are configured\n\
         3. Merge this MR to activate the pipeline\n\
         4. Monitor the first pipeline run\n\n\
         ---\n",
    );
    text.push_str(&format!(
        "*Generated by PipeOps CLI from `{}` branch*\n",
        branches.source
    ));

    text
}
