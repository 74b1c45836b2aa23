use super::client::GitLabClient;
use super::types::CiVariable;
use reqwest::Method;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Parent groups of `project_path`, deepest first.
///
/// `devops/tools/pipeops` yields `["devops/tools", "devops"]`.
pub fn group_hierarchy(project_path: &str) -> Vec<String> {
    let mut parts: Vec<&str> = project_path.split('/').collect();
    parts.pop();

    let mut groups = Vec::with_capacity(parts.len());
    while !parts.is_empty() {
        groups.push(parts.join("/"));
        parts.pop();
    }
    groups
}

impl GitLabClient {
    /// CI/CD variables defined on the project itself; empty on failure.
    pub async fn project_variables(&self) -> HashMap<String, String> {
        let url = self.endpoint(["variables"]);
        match self
            .get_paginated::<CiVariable>("project_variables", url, &[])
            .await
        {
            Ok(vars) => vars.into_iter().map(|v| (v.key, v.value)).collect(),
            Err(err) => {
                error!(error = %err, "Failed to get project variables");
                HashMap::new()
            }
        }
    }

    /// Variables inherited from every parent group. A key defined on a
    /// deeper group shadows the same key higher up.
    pub async fn group_variables(&self) -> HashMap<String, String> {
        let mut merged = HashMap::new();

        for group in group_hierarchy(self.project_path()) {
            let url = self.group_endpoint(&group, ["variables"]);
            match self
                .get_paginated::<CiVariable>("group_variables", url, &[])
                .await
            {
                Ok(vars) => {
                    for var in vars {
                        merged.entry(var.key).or_insert(var.value);
                    }
                }
                Err(err) => {
                    warn!(group = %group, error = %err, "Failed to get group variables");
                }
            }
        }

        merged
    }

    /// Names from `required` that are defined neither on the project nor on
    /// any parent group, in the order given.
    pub async fn find_missing_variables(&self, required: &[String]) -> Vec<String> {
        let mut defined = self.group_variables().await;
        defined.extend(self.project_variables().await);

        let missing: Vec<String> = required
            .iter()
            .filter(|name| !defined.contains_key(name.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            info!("All required variables are present");
        } else {
            warn!(missing = %missing.join(", "), "Required variables are missing");
        }
        missing
    }

    /// Add an unprotected, unmasked project variable.
    pub async fn add_variable(&self, key: &str, value: &str) -> bool {
        let url = self.endpoint(["variables"]);
        let body = json!({
            "key": key,
            "value": value,
            "protected": false,
            "masked": false,
        });

        match self
            .send("add_variable", Method::POST, url, &[], Some(&body))
            .await
        {
            Ok(_) => {
                info!(key, "Variable added");
                true
            }
            Err(err) => {
                error!(key, error = %err, "Failed to add variable");
                false
            }
        }
    }
}
