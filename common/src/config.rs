// Configuration management with layered configuration (defaults, file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::protocol;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub scheduler: SchedulerSettings,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

/// Remote service endpoint and the RSA public key it publishes for
/// encrypting the signing timestamp. The key is base64-encoded SPKI DER.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub public_key: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub sweep_interval_minutes: u64,
    pub checkin_interval_minutes: u64,
    pub timezone: String,
    pub shutdown_grace_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with built-in defaults so partial files stay valid
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        // Validate database config
        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        // Validate remote config
        if !self.remote.base_url.starts_with("http") {
            return Err("Remote base_url must be an http(s) URL".to_string());
        }
        if self.remote.timeout_seconds == 0 {
            return Err("Remote timeout_seconds must be greater than 0".to_string());
        }
        protocol::crypto::parse_public_key(&self.remote.public_key)
            .map_err(|e| format!("Remote public_key is not a valid RSA key: {}", e))?;

        // Validate scheduler config
        if self.scheduler.sweep_interval_minutes == 0 {
            return Err("Scheduler sweep_interval_minutes must be greater than 0".to_string());
        }
        if self.scheduler.checkin_interval_minutes == 0 {
            return Err("Scheduler checkin_interval_minutes must be greater than 0".to_string());
        }
        chrono_tz::Tz::from_str(&self.scheduler.timezone)
            .map_err(|_| format!("Unknown scheduler timezone: {}", self.scheduler.timezone))?;

        // Validate observability config
        if self.observability.metrics_port == 0 {
            return Err("Metrics port must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/seatkeeper".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
            },
            remote: RemoteConfig {
                base_url: protocol::BASE_URL.to_string(),
                public_key: protocol::PUBLIC_KEY_B64.to_string(),
                timeout_seconds: 10,
            },
            scheduler: SchedulerSettings {
                sweep_interval_minutes: 5,
                checkin_interval_minutes: 18,
                timezone: "Asia/Shanghai".to_string(),
                shutdown_grace_seconds: 2,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
            },
        }
    }
}
