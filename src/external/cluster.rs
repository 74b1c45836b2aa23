//! Cluster resource cleanup
//!
//! Removes the resources a failed deploy job may have left behind so the
//! retried job starts from a clean namespace.

use super::command::{CommandError, CommandExecutor};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What to remove and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRequest {
    pub cluster_url: String,
    pub token: String,
    pub service_name: String,
    /// Defaults to `<service_name>-route`
    pub route_name: Option<String>,
}

impl CleanupRequest {
    pub fn new(cluster_url: &str, token: &str, service_name: &str) -> Self {
        Self {
            cluster_url: cluster_url.to_string(),
            token: token.to_string(),
            service_name: service_name.to_string(),
            route_name: None,
        }
    }

    pub fn with_route(mut self, route_name: &str) -> Self {
        self.route_name = Some(route_name.to_string());
        self
    }

    pub fn route(&self) -> String {
        self.route_name
            .clone()
            .unwrap_or_else(|| format!("{}-route", self.service_name))
    }
}

/// Deletes named service resources on a cluster; `true` when the service
/// and its route are gone (absent already counts).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ClusterCleanup: Send + Sync {
    async fn cleanup(&self, request: &CleanupRequest) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub logged_in: bool,
    pub route: bool,
    pub service: bool,
    pub deployment: bool,
    pub pods: bool,
    /// Resources (`type/name`) still present after deletion.
    pub remaining: Vec<String>,
}

impl CleanupReport {
    pub fn success(&self) -> bool {
        self.logged_in && self.service && self.route
    }

    fn cleaned_count(&self) -> usize {
        [self.route, self.service, self.deployment, self.pods]
            .iter()
            .filter(|done| **done)
            .count()
    }
}

/// Cleanup through the OpenShift `oc` CLI.
pub struct OpenShiftCleaner {
    executor: Arc<dyn CommandExecutor>,
}

impl OpenShiftCleaner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    async fn oc(&self, args: &[&str]) -> Result<super::command::CommandOutput, CommandError> {
        self.executor.execute("oc", args).await
    }

    pub async fn login(&self, cluster_url: &str, token: &str) -> bool {
        info!(cluster = cluster_url, "Logging in to OpenShift cluster");

        match self.oc(&["version", "--client"]).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                error!(stderr = %output.stderr.trim(), "OpenShift CLI check failed");
                return false;
            }
            Err(CommandError::CommandNotFound { .. }) => {
                error!("OpenShift CLI ('oc') not found");
                return false;
            }
            Err(err) => {
                error!(error = %err, "OpenShift CLI check failed");
                return false;
            }
        }

        let token_arg = format!("--token={token}");
        match self
            .oc(&["login", cluster_url, &token_arg, "--insecure-skip-tls-verify=true"])
            .await
        {
            Ok(output) if output.success() => {
                info!("OpenShift login successful");
                true
            }
            Ok(output) => {
                error!(stderr = %output.stderr.trim(), "OpenShift login failed");
                false
            }
            Err(err) => {
                error!(error = %err, "OpenShift login failed");
                false
            }
        }
    }

    async fn delete_resource(&self, kind: &str, name: &str) -> bool {
        match self.oc(&["delete", kind, name, "--ignore-not-found=true"]).await {
            Ok(output) if output.success() => {
                if output.stdout.contains("deleted") {
                    info!(kind, name, "Resource deleted");
                } else {
                    info!(kind, name, "Resource already absent");
                }
                true
            }
            Ok(output) => {
                warn!(kind, name, stderr = %output.stderr.trim(), "Could not delete resource");
                false
            }
            Err(err) => {
                error!(kind, name, error = %err, "Could not delete resource");
                false
            }
        }
    }

    async fn delete_pods(&self, app: &str) -> bool {
        let selector = format!("app={app}");
        match self
            .oc(&["delete", "pods", "-l", &selector, "--ignore-not-found=true"])
            .await
        {
            Ok(output) if output.success() => {
                info!(app, "Pods cleaned up");
                true
            }
            Ok(output) => {
                warn!(app, stderr = %output.stderr.trim(), "Could not delete pods");
                false
            }
            Err(err) => {
                warn!(app, error = %err, "Could not delete pods");
                false
            }
        }
    }

    async fn resource_exists(&self, kind: &str, name: &str) -> bool {
        matches!(self.oc(&["get", kind, name]).await, Ok(output) if output.success())
    }

    /// Log in, delete route, service, deployment and pods, then check what
    /// is left.
    pub async fn run(&self, request: &CleanupRequest) -> CleanupReport {
        let mut report = CleanupReport::default();
        if !self.login(&request.cluster_url, &request.token).await {
            return report;
        }
        report.logged_in = true;

        let service = request.service_name.as_str();
        let route = request.route();
        info!(service, route = %route, "Starting cluster cleanup");

        report.route = self.delete_resource("route", &route).await;
        report.service = self.delete_resource("service", service).await;
        report.deployment = self.delete_resource("deployment", service).await;
        report.pods = self.delete_pods(service).await;

        info!(cleaned = report.cleaned_count(), total = 4, "Cleanup completed");

        for (kind, name) in [("service", service), ("route", route.as_str()), ("deployment", service)] {
            if self.resource_exists(kind, name).await {
                report.remaining.push(format!("{kind}/{name}"));
            }
        }
        if report.remaining.is_empty() {
            info!("All resources removed");
        } else {
            warn!(remaining = %report.remaining.join(", "), "Some resources still exist");
        }

        report
    }
}

#[async_trait]
impl ClusterCleanup for OpenShiftCleaner {
    async fn cleanup(&self, request: &CleanupRequest) -> bool {
        self.run(request).await.success()
    }
}
