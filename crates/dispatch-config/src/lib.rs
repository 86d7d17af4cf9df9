//! Dispatcher configuration system.
//!
//! TOML-based configuration with environment variable override support, covering every
//! section named in spec.md §6: timezone, upload storage, database, publisher, scheduler,
//! and monitor.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// IANA timezone name all scheduling is computed in. Default per spec: `Europe/Kiev`.
    pub timezone: String,
    /// Directory media artifacts are streamed to on save.
    pub uploads_dir: String,
    /// Port the health/readiness HTTP server binds to.
    pub http_port: u16,
    pub database: DatabaseConfig,
    pub publisher: PublisherConfig,
    pub scheduler: SchedulerConfig,
    pub monitor: MonitorConfig,
    pub media_retention: MediaRetentionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Kiev".to_string(),
            uploads_dir: "./data/uploads".to_string(),
            http_port: 8089,
            database: DatabaseConfig::default(),
            publisher: PublisherConfig::default(),
            scheduler: SchedulerConfig::default(),
            monitor: MonitorConfig::default(),
            media_retention: MediaRetentionConfig::default(),
        }
    }
}

/// Durable store backend. Either a SQLite file path or a Postgres connection URL; spec §6
/// requires "a single relational store" but leaves the engine open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlite` or `postgres`.
    pub kind: String,
    /// SQLite file path (used when `kind = "sqlite"`).
    pub sqlite_path: String,
    /// Postgres connection URL (used when `kind = "postgres"`).
    pub postgres_url: String,
    /// Connection pool size.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: "sqlite".to_string(),
            sqlite_path: "./data/dispatcher.db".to_string(),
            postgres_url: String::new(),
            pool_size: 10,
        }
    }
}

/// Publisher (external messaging-platform) connection settings, per spec §5's "bounded
/// connection pool with generous per-request timeouts for large media".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub base_url: String,
    pub api_token: String,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            pool_size: 50,
            connect_timeout_secs: 60,
            read_timeout_secs: 600,
        }
    }
}

/// Dispatcher tuning: poll granularity for the pre-fire grace delay and the retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Pre-fire grace delay in seconds (§4.5 step 1).
    pub pre_fire_delay_secs: u64,
    /// Grace period applied when registering a timer whose time has already passed
    /// (`register`: "if t <= now, schedule for now + ε").
    pub past_due_grace_secs: u64,
    /// MAX_RETRIES (§4.5): total retry attempts after the first.
    pub max_retries: u32,
    /// Exponential backoff cap in seconds for `Unknown` errors (§4.4: `5·2ⁿ s` capped at 60s).
    pub backoff_cap_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pre_fire_delay_secs: 1,
            past_due_grace_secs: 10,
            max_retries: 3,
            backoff_cap_secs: 60,
        }
    }
}

/// Monitor cadence for the three periodic jobs (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub reconciliation_interval_secs: u64,
    pub reminder_interval_secs: u64,
    /// Hour of day (local zone) the media cleanup sweep runs.
    pub cleanup_hour: u32,
    /// Re-registration delay for overdue posts found during reconciliation.
    pub overdue_requeue_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconciliation_interval_secs: 300,
            reminder_interval_secs: 3600,
            cleanup_hour: 3,
            overdue_requeue_secs: 10,
        }
    }
}

/// Media cleanup sweep retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaRetentionConfig {
    pub retention_days: u32,
}

impl Default for MediaRetentionConfig {
    fn default() -> Self {
        Self { retention_days: 7 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Generate an example TOML configuration.
    pub fn example_toml() -> String {
        r#"# Dispatcher configuration
# Environment variables override these settings

timezone = "Europe/Kiev"
uploads_dir = "./data/uploads"
http_port = 8089

[database]
kind = "sqlite"          # sqlite or postgres
sqlite_path = "./data/dispatcher.db"
postgres_url = ""
pool_size = 10

[publisher]
base_url = ""
api_token = ""
pool_size = 50
connect_timeout_secs = 60
read_timeout_secs = 600

[scheduler]
pre_fire_delay_secs = 1
past_due_grace_secs = 10
max_retries = 3
backoff_cap_secs = 60

[monitor]
reconciliation_interval_secs = 300
reminder_interval_secs = 3600
cleanup_hour = 3
overdue_requeue_secs = 10

[media_retention]
retention_days = 7
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.timezone, "Europe/Kiev");
        assert_eq!(cfg.scheduler.max_retries, 3);
        assert_eq!(cfg.monitor.reconciliation_interval_secs, 300);
        assert_eq!(cfg.monitor.reminder_interval_secs, 3600);
    }

    #[test]
    fn example_toml_round_trips() {
        let example = AppConfig::example_toml();
        let parsed: AppConfig = toml::from_str(&example).expect("example toml must parse");
        assert_eq!(parsed.database.kind, "sqlite");
    }

    #[test]
    fn from_file_loads_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timezone = \"UTC\"\n").unwrap();
        let cfg = AppConfig::from_file(&path).unwrap();
        assert_eq!(cfg.timezone, "UTC");
        // untouched sections keep their defaults
        assert_eq!(cfg.scheduler.max_retries, 3);
    }
}
