use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// A named queue created at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    /// Number of callbacks this queue may run at once
    #[serde(default = "default_queue_concurrency")]
    pub concurrency: usize,
}

impl QueueConfig {
    pub fn new<S: Into<String>>(name: S, concurrency: usize) -> Self {
        Self {
            name: name.into(),
            concurrency,
        }
    }
}

/// Cluster support: stamps jobs with the owning instance index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_enabled")]
    pub enabled: bool,
    /// Environment variable holding this process's instance index
    #[serde(default = "default_instance_index_env")]
    pub instance_index_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Route failed executions through `JobSubmitter::handle_failure` automatically.
    /// When disabled the job is left Failed for the host to decide.
    #[serde(default = "default_automatic_retry")]
    pub automatic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// How long queues may drain scheduled work before pending jobs are cancelled
    #[serde(default = "default_grace_period", with = "duration_serde::duration")]
    pub grace_period: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeZoneConfig {
    /// IANA time zone id, empty to skip session configuration
    #[serde(default = "default_time_zone_id")]
    pub id: String,
    #[serde(default = "default_use_dst")]
    pub use_dst: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_queues")]
    pub queues: Vec<QueueConfig>,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub time_zone: TimeZoneConfig,
}

fn default_queue_concurrency() -> usize {
    DEFAULT_QUEUE_CONCURRENCY
}
fn default_queues() -> Vec<QueueConfig> {
    vec![QueueConfig::new(DEFAULT_QUEUE_NAME, DEFAULT_QUEUE_CONCURRENCY)]
}
fn default_cluster_enabled() -> bool {
    DEFAULT_CLUSTER_ENABLED
}
fn default_instance_index_env() -> String {
    DEFAULT_INSTANCE_INDEX_ENV.to_string()
}
fn default_automatic_retry() -> bool {
    DEFAULT_AUTOMATIC_RETRY
}
fn default_grace_period() -> Duration {
    Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECONDS)
}
fn default_time_zone_id() -> String {
    DEFAULT_TIME_ZONE_ID.to_string()
}
fn default_use_dst() -> bool {
    DEFAULT_USE_DST
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: default_cluster_enabled(),
            instance_index_env: default_instance_index_env(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            automatic: default_automatic_retry(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
        }
    }
}

impl Default for TimeZoneConfig {
    fn default() -> Self {
        Self {
            id: default_time_zone_id(),
            use_dst: default_use_dst(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            cluster: ClusterConfig::default(),
            retry: RetryConfig::default(),
            shutdown: ShutdownConfig::default(),
            time_zone: TimeZoneConfig::default(),
        }
    }
}

impl Config {
    /// Load from `$DELAYQ_CONFIG`, falling back to `delayq.toml`
    pub fn load() -> ConfigResult<Self> {
        let config_file =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_file(&config_file)
    }

    /// A missing file yields the defaults; a present but invalid one is an error
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> ConfigResult<Self> {
        let path = config_file.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&contents)?;
            info!("Configuration loaded from: {}", path.display());
            Ok(config)
        } else {
            info!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for queue in &self.queues {
            if queue.name.trim().is_empty() {
                return Err(ConfigError::invalid("queue name cannot be empty"));
            }
            if queue.concurrency == 0 {
                return Err(ConfigError::invalid(format!(
                    "queue '{}' must have a concurrency of at least 1",
                    queue.name
                )));
            }
            if !seen.insert(queue.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "queue '{}' is configured more than once",
                    queue.name
                )));
            }
        }

        if self.cluster.instance_index_env.trim().is_empty() {
            return Err(ConfigError::invalid(
                "cluster.instance_index_env cannot be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.queues, vec![QueueConfig::new("Default", 1)]);
        assert!(!config.cluster.enabled);
        assert_eq!(config.cluster.instance_index_env, "CF_INSTANCE_INDEX");
        assert!(config.retry.automatic);
        assert_eq!(config.shutdown.grace_period, Duration::from_secs(30));
        assert!(config.time_zone.id.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let config = Config::from_toml_str(
            r#"
            [[queues]]
            name = "Default"

            [[queues]]
            name = "Mail"
            concurrency = 4

            [cluster]
            enabled = true
            instance_index_env = "INSTANCE"

            [retry]
            automatic = false

            [shutdown]
            grace_period = "5s"

            [time_zone]
            id = "Europe/Amsterdam"
            use_dst = false
            "#,
        )
        .unwrap();

        assert_eq!(config.queues.len(), 2);
        assert_eq!(config.queues[0].concurrency, 1);
        assert_eq!(config.queues[1], QueueConfig::new("Mail", 4));
        assert!(config.cluster.enabled);
        assert_eq!(config.cluster.instance_index_env, "INSTANCE");
        assert!(!config.retry.automatic);
        assert_eq!(config.shutdown.grace_period, Duration::from_secs(5));
        assert_eq!(config.time_zone.id, "Europe/Amsterdam");
        assert!(!config.time_zone.use_dst);
    }

    #[test]
    fn test_validation_rejects_bad_queues() {
        let zero = Config::from_toml_str(
            r#"
            [[queues]]
            name = "Default"
            concurrency = 0
            "#,
        );
        assert!(matches!(zero, Err(ConfigError::Invalid { .. })));

        let duplicate = Config::from_toml_str(
            r#"
            [[queues]]
            name = "Default"

            [[queues]]
            name = "Default"
            "#,
        );
        assert!(matches!(duplicate, Err(ConfigError::Invalid { .. })));

        let empty = Config::from_toml_str(
            r#"
            [[queues]]
            name = " "
            "#,
        );
        assert!(matches!(empty, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = Config::from_toml_str("queues = 12");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [[queues]]
            name = "Reports"
            concurrency = 2
            "#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.queues, vec![QueueConfig::new("Reports", 2)]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
