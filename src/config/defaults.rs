/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// File location
pub const DEFAULT_CONFIG_FILE: &str = "delayq.toml";
pub const CONFIG_FILE_ENV: &str = "DELAYQ_CONFIG";

// Queue defaults
pub const DEFAULT_QUEUE_NAME: &str = "Default";
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 1;

// Cluster defaults
pub const DEFAULT_CLUSTER_ENABLED: bool = false;
pub const DEFAULT_INSTANCE_INDEX_ENV: &str = "CF_INSTANCE_INDEX";

// Retry defaults
pub const DEFAULT_AUTOMATIC_RETRY: bool = true;

// Shutdown defaults
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 30;

// Time zone defaults (empty id = leave the session alone)
pub const DEFAULT_TIME_ZONE_ID: &str = "";
pub const DEFAULT_USE_DST: bool = true;
