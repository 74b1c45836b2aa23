use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for PipeOps
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipeopsConfig {
    /// GitLab connection settings
    pub gitlab: GitLabConfig,
    /// Retry settings for API calls
    pub retry: RetryConfig,
    /// Pipeline monitoring settings
    pub monitor: MonitorConfig,
    /// Pipeline generation settings
    pub generator: GeneratorConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// Personal access token (can be set via env var)
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Delay before retry `n` is `n * backoff_unit_secs`
    pub backoff_unit_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    /// Wait before looking for the pipeline created by a new commit
    pub start_delay_secs: u64,
    pub job_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Branch the generated files are committed to
    pub feature_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of compact text
    pub json: bool,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None, // Will be read from env var or .pipeops-rc
            timeout_secs: 30,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit_secs: 2,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_wait_secs: 1800, // 30 minutes
            start_delay_secs: 10,
            job_timeout_secs: 600,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            feature_branch: "feature/pipeops".to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl GitLabConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_secs(self.backoff_unit_secs)
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

impl PipeopsConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (pipeops.toml, .pipeops-rc)
    /// 3. Environment variables (prefixed with PIPEOPS_, `__` between sections)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`PipeopsConfig::load`] with configuration files looked up in `dir`.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let toml_path = dir.join("pipeops.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".pipeops-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::new(&rc_path.to_string_lossy(), FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("PIPEOPS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut pipeops_config: PipeopsConfig = builder.build()?.try_deserialize()?;

        if pipeops_config.gitlab.token.is_none() {
            if let Ok(token) = std::env::var("GITLAB_TOKEN") {
                pipeops_config.gitlab.token = Some(token);
            }
        }

        Ok(pipeops_config)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipeopsConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_unit(), Duration::from_secs(2));
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.monitor.max_wait(), Duration::from_secs(1800));
        assert_eq!(config.generator.feature_branch, "feature/pipeops");
        assert_eq!(config.gitlab.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("pipeops.toml"),
            "[monitor]\npoll_interval_secs = 5\n\n[generator]\nfeature_branch = \"feature/ci\"\n",
        )
        .unwrap();

        let config = PipeopsConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 5);
        assert_eq!(config.monitor.max_wait_secs, 1800);
        assert_eq!(config.generator.feature_branch, "feature/ci");
    }

    #[test]
    fn test_retry_settings_from_rc_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".pipeops-rc"),
            "[retry]\nmax_attempts = 5\nbackoff_unit_secs = 1\n\n[observability]\njson = true\n",
        )
        .unwrap();

        let config = PipeopsConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.retry.max_attempts, 5u32);
        assert_eq!(config.retry.backoff_unit(), Duration::from_secs(1));
        assert!(config.observability.json);
    }

    #[test]
    fn test_negative_attempts_are_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pipeops.toml"), "[retry]\nmax_attempts = -1\n").unwrap();

        assert!(PipeopsConfig::load_from(dir.path()).is_err());
    }
}
