//! Configuration loader with file and environment variable support.

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths.
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "dispatcher.toml",
    "./config/config.toml",
    "/etc/dispatcher/config.toml",
];

/// Configuration loader.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path.
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("DISPATCHER_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) {
        if let Ok(val) = env::var("DISPATCHER_TIMEZONE") {
            config.timezone = val;
        }
        if let Ok(val) = env::var("DISPATCHER_UPLOADS_DIR") {
            config.uploads_dir = val;
        }
        if let Ok(val) = env::var("DISPATCHER_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http_port = port;
            }
        }

        // Database
        if let Ok(val) = env::var("DISPATCHER_DB_KIND") {
            config.database.kind = val;
        }
        if let Ok(val) = env::var("DISPATCHER_DB_SQLITE_PATH") {
            config.database.sqlite_path = val;
        }
        if let Ok(val) = env::var("DISPATCHER_DB_POSTGRES_URL") {
            config.database.postgres_url = val;
        }
        if let Ok(val) = env::var("DISPATCHER_DB_POOL_SIZE") {
            if let Ok(size) = val.parse() {
                config.database.pool_size = size;
            }
        }

        // Publisher
        if let Ok(val) = env::var("DISPATCHER_PUBLISHER_BASE_URL") {
            config.publisher.base_url = val;
        }
        if let Ok(val) = env::var("DISPATCHER_PUBLISHER_API_TOKEN") {
            config.publisher.api_token = val;
        }
        if let Ok(val) = env::var("DISPATCHER_PUBLISHER_POOL_SIZE") {
            if let Ok(size) = val.parse() {
                config.publisher.pool_size = size;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_PUBLISHER_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.publisher.connect_timeout_secs = secs;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_PUBLISHER_READ_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.publisher.read_timeout_secs = secs;
            }
        }

        // Scheduler
        if let Ok(val) = env::var("DISPATCHER_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                config.scheduler.max_retries = n;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_PRE_FIRE_DELAY_SECS") {
            if let Ok(secs) = val.parse() {
                config.scheduler.pre_fire_delay_secs = secs;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_PAST_DUE_GRACE_SECS") {
            if let Ok(secs) = val.parse() {
                config.scheduler.past_due_grace_secs = secs;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_BACKOFF_CAP_SECS") {
            if let Ok(secs) = val.parse() {
                config.scheduler.backoff_cap_secs = secs;
            }
        }

        // Monitor
        if let Ok(val) = env::var("DISPATCHER_RECONCILIATION_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                config.monitor.reconciliation_interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_REMINDER_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                config.monitor.reminder_interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_CLEANUP_HOUR") {
            if let Ok(hour) = val.parse() {
                config.monitor.cleanup_hour = hour;
            }
        }
        if let Ok(val) = env::var("DISPATCHER_OVERDUE_REQUEUE_SECS") {
            if let Ok(secs) = val.parse() {
                config.monitor.overdue_requeue_secs = secs;
            }
        }

        // Media retention
        if let Ok(val) = env::var("DISPATCHER_MEDIA_RETENTION_DAYS") {
            if let Ok(days) = val.parse() {
                config.media_retention.retention_days = days;
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_takes_precedence_over_default() {
        env::set_var("DISPATCHER_TIMEZONE", "UTC");
        let mut config = AppConfig::default();
        ConfigLoader::new().apply_env_overrides(&mut config);
        assert_eq!(config.timezone, "UTC");
        env::remove_var("DISPATCHER_TIMEZONE");
    }
}
