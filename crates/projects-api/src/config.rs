//! Configuration for the projects API.
//!
//! Settings come from the environment (a `.env` file is honored) with a
//! default for every value, or from a TOML file using the same keys in
//! snake_case.

use projects_store::RedisOptions;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value could not be parsed or is out of range
    #[error("Invalid value for {key}: `{value}`")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Offending value
        value: String,
    },
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Requests and lifecycle events
    #[default]
    Info,
    /// Everything, including per-key store activity
    Debug,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(()),
        }
    }
}

/// API configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Directory served under `/data/` when `serve_data` is on
    pub data_dir: PathBuf,

    /// Whether to serve `data_dir` as static files
    pub serve_data: bool,

    /// Redis host
    pub redis_host: String,

    /// Redis port
    pub redis_port: u16,

    /// Redis password (empty for none)
    pub redis_password: String,

    /// Maximum pooled Redis connections
    pub redis_pool_size: u32,

    /// Bind address (e.g., "0.0.0.0")
    pub bind_address: String,

    /// Listen port
    pub port: u16,

    /// Log verbosity, overridden by `RUST_LOG` when set
    pub log_level: LogLevel,

    /// Seconds between index reconciliation passes; 0 disables them
    pub reconcile_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/mnt/external/data/"),
            serve_data: false,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: String::new(),
            redis_pool_size: 100,
            bind_address: "0.0.0.0".to_string(),
            port: 12345,
            log_level: LogLevel::Info,
            reconcile_interval_secs: 0,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })
}

fn parse_bool(key: &str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

impl ApiConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset or empty values keep
    /// their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get("DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SERVE_DATA") {
            config.serve_data = parse_bool("SERVE_DATA", v)?;
        }
        if let Some(v) = get("REDIS_HOST") {
            config.redis_host = v;
        }
        if let Some(v) = get("REDIS_PORT") {
            config.redis_port = parse_var("REDIS_PORT", v)?;
        }
        if let Some(v) = get("REDIS_PASSWORD") {
            config.redis_password = v;
        }
        if let Some(v) = get("REDIS_POOL_SIZE") {
            config.redis_pool_size = parse_var("REDIS_POOL_SIZE", v)?;
        }
        if let Some(v) = get("BIND_ADDRESS") {
            config.bind_address = v;
        }
        if let Some(v) = get("PORT") {
            config.port = parse_var("PORT", v)?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            config.log_level = parse_var("LOG_LEVEL", v)?;
        }
        if let Some(v) = get("RECONCILE_INTERVAL_SECS") {
            config.reconcile_interval_secs = parse_var("RECONCILE_INTERVAL_SECS", v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ApiConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REDIS_POOL_SIZE".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Redis connection settings
    pub fn redis_options(&self) -> RedisOptions {
        RedisOptions {
            host: self.redis_host.clone(),
            port: self.redis_port,
            password: Some(self.redis_password.clone()).filter(|p| !p.is_empty()),
            pool_size: self.redis_pool_size,
        }
    }

    /// Interval between reconciliation passes, if enabled
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.data_dir, PathBuf::from("/mnt/external/data/"));
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.redis_pool_size, 100);
        assert_eq!(config.bind_addr(), "0.0.0.0:12345");
        assert_eq!(config.reconcile_interval(), None);
    }

    #[test]
    fn test_overrides() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("DATA_DIR", "/srv/data"),
            ("SERVE_DATA", "true"),
            ("REDIS_HOST", "cache"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "pw"),
            ("REDIS_POOL_SIZE", "8"),
            ("PORT", "8080"),
            ("LOG_LEVEL", "DEBUG"),
            ("RECONCILE_INTERVAL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert!(config.serve_data);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.reconcile_interval(), Some(Duration::from_secs(60)));

        let redis = config.redis_options();
        assert_eq!(redis.host, "cache");
        assert_eq!(redis.port, 6380);
        assert_eq!(redis.password.as_deref(), Some("pw"));
        assert_eq!(redis.pool_size, 8);
    }

    #[test]
    fn test_empty_value_keeps_default() {
        let config = ApiConfig::from_lookup(lookup(&[("PORT", ""), ("REDIS_HOST", "")])).unwrap();
        assert_eq!(config.port, 12345);
        assert_eq!(config.redis_host, "localhost");
        assert_eq!(config.redis_options().password, None);
    }

    #[test]
    fn test_invalid_port() {
        let result = ApiConfig::from_lookup(lookup(&[("PORT", "http")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "PORT"
        ));
    }

    #[test]
    fn test_invalid_bool_and_level() {
        assert!(ApiConfig::from_lookup(lookup(&[("SERVE_DATA", "maybe")])).is_err());
        assert!(ApiConfig::from_lookup(lookup(&[("LOG_LEVEL", "trace")])).is_err());
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        assert!(ApiConfig::from_lookup(lookup(&[("REDIS_POOL_SIZE", "0")])).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            data_dir = "/srv/data"
            serve_data = true
            redis_host = "cache"
            port = 9000
            log_level = "error"
        "#;

        let config: ApiConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.redis_host, "cache");
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.log_level, LogLevel::Error);
        assert!(config.serve_data);
    }
}
