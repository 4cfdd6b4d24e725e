use crate::core::alert::AlertPolicy;
use crate::core::movement::MovementDetector;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub indexing: IndexingSettings,
    #[serde(default)]
    pub notification: NotificationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    /// Empty or missing runs the service with the in-memory store
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
}

impl DatabaseSettings {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_liveness_secs")]
    pub liveness_secs: i64,
    #[serde(default = "default_base_margin_m")]
    pub base_margin_m: i64,
    #[serde(default = "default_movement_threshold_m")]
    pub movement_threshold_m: i64,
    #[serde(default = "default_fix_latency_mps")]
    pub fix_latency_mps: f64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            liveness_secs: default_liveness_secs(),
            base_margin_m: default_base_margin_m(),
            movement_threshold_m: default_movement_threshold_m(),
            fix_latency_mps: default_fix_latency_mps(),
            window_size: default_window_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl AlertSettings {
    pub fn policy(&self) -> AlertPolicy {
        AlertPolicy {
            liveness: chrono::Duration::seconds(self.liveness_secs),
            base_margin_m: self.base_margin_m,
            fix_latency_mps: self.fix_latency_mps,
            window_size: self.window_size,
            movement: MovementDetector::new(self.movement_threshold_m),
        }
    }
}

fn default_liveness_secs() -> i64 { 300 }
fn default_base_margin_m() -> i64 { 500 }
fn default_movement_threshold_m() -> i64 { 230 }
fn default_fix_latency_mps() -> f64 { 6.0 }
fn default_window_size() -> usize { 7 }
fn default_sweep_interval_secs() -> u64 { 60 }
fn default_max_concurrent() -> usize { 16 }

#[derive(Debug, Clone, Deserialize)]
pub struct IndexingSettings {
    #[serde(default = "default_code_cache_size")]
    pub code_cache_size: u64,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            code_cache_size: default_code_cache_size(),
        }
    }
}

fn default_code_cache_size() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    /// Without a webhook, alerts are only logged
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

fn default_notify_timeout_secs() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with TRACKSENTRY_)
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., TRACKSENTRY__ALERT__LIVENESS_SECS -> alert.liveness_secs
            .add_source(environment())
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("TRACKSENTRY")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
