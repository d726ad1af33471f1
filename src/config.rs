use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blockchain::watch_set::normalize_address;
use crate::error::ConfigError;

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub scanner: ScannerConfig,
    pub analyzer: AnalyzerConfig,
    pub registry: RegistryConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

/// RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Scan loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Seconds to wait between ticks
    pub poll_interval_seconds: u64,
    /// How far back a fresh scanner starts from the chain head
    pub bootstrap_window: u64,
    /// Checkpoint file, or a directory that will hold `state.json`
    pub checkpoint_path: String,
    /// Static watch-list, used when the registry is absent or empty
    pub wallets: Vec<String>,
}

/// Risk analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Base URL of the analyzer; dispatch is disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timeout_seconds: u64,
}

/// Address registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// `sqlite://path` or a plain file path; the registry is disabled when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upper bound on the startup connection backoff
    pub connect_timeout_seconds: u64,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 15,
            bootstrap_window: 1000,
            checkpoint_path: "state.json".to_string(),
            wallets: Vec::new(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_seconds: 30,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl ScannerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl RegistryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Split a comma separated wallet list, dropping blank entries.
pub fn parse_wallet_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

impl AppConfig {
    /// Load configuration from `CONFIG_FILE` (or `config.toml`) and the environment.
    /// Environment variables take precedence over file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Same as [`AppConfig::load`], but an explicit path must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = env::var("CONFIG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
                if default_path.exists() {
                    Self::load_from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but falls back to defaults and hands back the
    /// error so the caller can report it once logging is up.
    pub fn load_or_default() -> (Self, Option<ConfigError>) {
        match Self::load() {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // RPC
        if let Ok(endpoint) = env::var("RPC_URL") {
            self.rpc.endpoint = endpoint.trim().to_string();
        }
        if let Ok(timeout) = env::var("RPC_TIMEOUT_SECONDS") {
            self.rpc.timeout_seconds = parse_env("RPC_TIMEOUT_SECONDS", timeout)?;
        }

        // Scanner
        if let Ok(wallets) = env::var("WALLETS") {
            self.scanner.wallets = parse_wallet_list(&wallets);
        }
        if let Ok(interval) = env::var("POLL_INTERVAL") {
            self.scanner.poll_interval_seconds = parse_env("POLL_INTERVAL", interval)?;
        }
        if let Ok(window) = env::var("BOOTSTRAP_WINDOW") {
            self.scanner.bootstrap_window = parse_env("BOOTSTRAP_WINDOW", window)?;
        }
        if let Ok(state_path) = env::var("STATE_PATH") {
            self.scanner.checkpoint_path = state_path;
        }

        // Analyzer
        if let Ok(url) = env::var("AI_ANALYZER_URL") {
            self.analyzer.url = non_empty(url);
        }

        // Registry
        if let Ok(url) = env::var("DATABASE_URL") {
            self.registry.url = non_empty(url);
        }
        if let Ok(timeout) = env::var("REGISTRY_CONNECT_TIMEOUT") {
            self.registry.connect_timeout_seconds = parse_env("REGISTRY_CONNECT_TIMEOUT", timeout)?;
        }

        // API
        if let Ok(enabled) = env::var("API_ENABLED") {
            self.api.enabled = parse_env("API_ENABLED", enabled)?;
        }
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = env::var("API_PORT") {
            self.api.port = parse_env("API_PORT", port)?;
        }

        // Logging
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format.to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_http_url(&self.rpc.endpoint) {
            return Err(ConfigError::InvalidUrl(self.rpc.endpoint.clone()));
        }

        if self.rpc.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }

        if self.scanner.poll_interval_seconds == 0 || self.scanner.poll_interval_seconds > 3600 {
            return Err(ConfigError::InvalidValue {
                key: "scanner.poll_interval_seconds".to_string(),
                value: self.scanner.poll_interval_seconds.to_string(),
            });
        }

        if self.scanner.checkpoint_path.trim().is_empty() {
            return Err(ConfigError::MissingValue("scanner.checkpoint_path".to_string()));
        }

        for wallet in &self.scanner.wallets {
            if normalize_address(wallet).is_err() {
                return Err(ConfigError::InvalidValue {
                    key: "scanner.wallets".to_string(),
                    value: wallet.clone(),
                });
            }
        }

        if let Some(url) = &self.analyzer.url {
            if !is_http_url(url) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }

        if self.analyzer.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "analyzer.timeout_seconds".to_string(),
                value: self.analyzer.timeout_seconds.to_string(),
            });
        }

        if self.api.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.port".to_string(),
                value: self.api.port.to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
