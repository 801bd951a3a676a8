//! Cluster identity backed by configuration and the process environment

use super::collaborators::ClusterIdentity;
use crate::config::ClusterConfig;
use tracing::debug;

/// Reads the instance index from an environment variable on every call
#[derive(Debug, Clone)]
pub struct ConfiguredClusterIdentity {
    enabled: bool,
    instance_index_env: String,
}

impl ConfiguredClusterIdentity {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            enabled: config.enabled,
            instance_index_env: config.instance_index_env.clone(),
        }
    }
}

impl ClusterIdentity for ConfiguredClusterIdentity {
    fn instance_index(&self) -> i64 {
        match std::env::var(&self.instance_index_env) {
            Ok(value) => value.trim().parse().unwrap_or_else(|_| {
                debug!(
                    "{} is set to '{}', which is not an instance index",
                    self.instance_index_env, value
                );
                -1
            }),
            Err(_) => -1,
        }
    }

    fn cluster_support_enabled(&self) -> bool {
        self.enabled
    }
}

/// Fixed identity, mainly for single-process hosts and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticClusterIdentity {
    pub enabled: bool,
    pub instance_index: i64,
}

impl StaticClusterIdentity {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            instance_index: -1,
        }
    }

    pub fn instance(instance_index: i64) -> Self {
        Self {
            enabled: true,
            instance_index,
        }
    }
}

impl ClusterIdentity for StaticClusterIdentity {
    fn instance_index(&self) -> i64 {
        self.instance_index
    }

    fn cluster_support_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VAR: &str = "DELAYQ_TEST_INSTANCE_INDEX";

    fn identity() -> ConfiguredClusterIdentity {
        ConfiguredClusterIdentity::new(&ClusterConfig {
            enabled: true,
            instance_index_env: VAR.to_string(),
        })
    }

    #[test]
    #[serial]
    fn test_reads_index_from_environment() {
        unsafe { std::env::set_var(VAR, "3") };
        assert_eq!(identity().instance_index(), 3);
        assert!(identity().cluster_support_enabled());
        unsafe { std::env::remove_var(VAR) };
    }

    #[test]
    #[serial]
    fn test_missing_or_garbage_index_is_unavailable() {
        unsafe { std::env::remove_var(VAR) };
        assert_eq!(identity().instance_index(), -1);

        unsafe { std::env::set_var(VAR, "leader") };
        assert_eq!(identity().instance_index(), -1);
        unsafe { std::env::remove_var(VAR) };
    }

    #[test]
    fn test_static_identity() {
        assert!(!StaticClusterIdentity::disabled().cluster_support_enabled());
        assert_eq!(StaticClusterIdentity::instance(2).instance_index(), 2);
    }
}
