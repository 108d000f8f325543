use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::store::ClientOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file '{path}': {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file '{path}': {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
  #[error("invalid value '{value}' for {name}")]
  InvalidEnv { name: &'static str, value: String },
}

/// Log configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
  /// Log file path, if not set, logs will be printed to stdout
  pub file: Option<String>,
  /// Log level, default is "info"
  #[serde(default = "default_log_level")]
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      file: None,
      level: default_log_level(),
    }
  }
}

/// Store client timeouts and retry policy, in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
  pub connect_timeout_ms: u64,
  pub command_timeout_ms: u64,
  /// How long startup waits for the first connection before serving anyway
  pub initial_connect_timeout_ms: u64,
  pub retry_base_ms: u64,
  pub retry_max_ms: u64,
  /// Unset means the client retries forever
  pub max_attempts: Option<u32>,
  pub health_check_ms: u64,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      connect_timeout_ms: 2_000,
      command_timeout_ms: 5_000,
      initial_connect_timeout_ms: 10_000,
      retry_base_ms: 50,
      retry_max_ms: 2_000,
      max_attempts: None,
      health_check_ms: 5_000,
    }
  }
}

impl StoreConfig {
  pub fn client_options(&self) -> ClientOptions {
    ClientOptions {
      connect_timeout: Duration::from_millis(self.connect_timeout_ms),
      command_timeout: Duration::from_millis(self.command_timeout_ms),
      retry_base: Duration::from_millis(self.retry_base_ms),
      retry_max: Duration::from_millis(self.retry_max_ms),
      max_attempts: self.max_attempts,
      health_check: Duration::from_millis(self.health_check_ms),
    }
  }

  pub fn initial_connect_timeout(&self) -> Duration {
    Duration::from_millis(self.initial_connect_timeout_ms)
  }
}

/// Service configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
  /// HTTP listening host
  #[serde(default = "default_host")]
  pub host: String,

  /// HTTP listening port
  #[serde(default = "default_port")]
  pub port: u16,

  /// Store address, `redis://host[:port][/db]`
  #[serde(default = "default_redis_url")]
  pub redis_url: String,

  /// Delay before the first store connection attempt
  #[serde(default = "default_warmup_ms")]
  pub warmup_ms: u64,

  #[serde(default)]
  pub store: StoreConfig,

  /// Log configuration
  #[serde(default)]
  pub log: LogConfig,
}

fn default_host() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  3000
}

fn default_redis_url() -> String {
  "redis://localhost:6379".to_string()
}

fn default_warmup_ms() -> u64 {
  10_000
}

impl Default for Config {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      redis_url: default_redis_url(),
      warmup_ms: default_warmup_ms(),
      store: StoreConfig::default(),
      log: LogConfig::default(),
    }
  }
}

impl Config {
  /// Load configuration from TOML file
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref().display().to_string();
    let config_str = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;

    toml::from_str(&config_str).map_err(|source| ConfigError::Parse { path, source })
  }

  /// Apply `REDIS_URL`, `PORT` and `WARMUP_MS` overrides read through `lookup`
  pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(url) = lookup("REDIS_URL") {
      self.redis_url = url;
    }
    if let Some(port) = lookup("PORT") {
      self.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: "PORT",
        value: port,
      })?;
    }
    if let Some(warmup) = lookup("WARMUP_MS") {
      self.warmup_ms = warmup.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: "WARMUP_MS",
        value: warmup,
      })?;
    }
    Ok(self)
  }

  /// `host:port` the HTTP listener binds to
  pub fn listen_addr(&self) -> String {
    format!("{}:{}", self.host, self.port)
  }

  pub fn warmup(&self) -> Duration {
    Duration::from_millis(self.warmup_ms)
  }
}
