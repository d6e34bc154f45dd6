//! Configuration management for medgate
//!
//! Provides a layered configuration system that supports YAML files,
//! environment variables, and command-line argument overrides.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Durable state configuration
    pub data: DataConfig,

    /// Upstream backend addresses
    pub upstream: UpstreamConfig,

    /// Health probe configuration
    pub probe: ProbeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Configuration file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        // Start with defaults
        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        // Add configuration file if it exists
        if let Ok(config_path) = std::env::var("MEDGATE_CONFIG") {
            builder = builder.add_source(config::File::with_name(&config_path).required(false));
        } else {
            for path in &["./medgate.yaml", "/etc/medgate/config.yaml"] {
                builder = builder.add_source(config::File::with_name(path).required(false));
            }
        }

        // Add environment variables with MEDGATE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("MEDGATE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let parsed: Self = config.try_deserialize()?;

        parsed.validate()?;

        Ok(parsed)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path));

        let config = builder.build()?;
        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.upstream.validate()?;
        self.probe.validate()?;

        Ok(())
    }

    /// Bind address for the HTTP server
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Path of the endpoint registry document
    pub fn registry_path(&self) -> PathBuf {
        self.data.dir.join("server-registry.json")
    }

    /// Path of the registry change log
    pub fn registry_log_path(&self) -> PathBuf {
        self.data.dir.join("server-registry-logs.jsonl")
    }

    /// Path of the runtime mode document
    pub fn mode_path(&self) -> PathBuf {
        self.data.dir.join("runtime-mode.json")
    }

    /// Path of the runtime event log
    pub fn events_path(&self) -> PathBuf {
        self.data.dir.join("runtime-events.jsonl")
    }

    /// Path of the metric sample log
    pub fn metrics_path(&self) -> PathBuf {
        self.data.dir.join("runtime-metrics.jsonl")
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP server
    pub bind_address: String,

    /// HTTP server listen port
    pub port: u16,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.is_empty() {
            return Err(crate::Error::config("Bind address must not be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("HTTP port must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Durable state configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the file-backed stores
    pub dir: PathBuf,
}

impl DataConfig {
    /// Point the stores at a different directory
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
        }
    }
}

/// Upstream backend addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the local backend (control surface and CPU inference)
    pub backend_url: String,

    /// Default GPU tunnel URL used when neither the mode document nor the
    /// registry provides one
    pub default_gpu_url: String,

    /// Local friend-chat completions URL, the fixed fallback target
    pub cpu_chat_url: String,

    /// Local consultation-chat completions URL
    pub internal_llm_url: String,
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("backend_url", &self.backend_url),
            ("default_gpu_url", &self.default_gpu_url),
            ("cpu_chat_url", &self.cpu_chat_url),
            ("internal_llm_url", &self.internal_llm_url),
        ] {
            if value.is_empty() {
                return Err(crate::Error::config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            default_gpu_url: "https://elissa-villous-scourgingly.ngrok-free.dev".to_string(),
            cpu_chat_url: "http://127.0.0.1:8000/v1/friend-chat/completions".to_string(),
            internal_llm_url: "http://127.0.0.1:8000/v1/chat/completions".to_string(),
        }
    }
}

/// Health probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Default timeout budget for a probe, in milliseconds
    pub timeout_ms: u64,
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("Probe timeout must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.upstream.backend_url, "http://127.0.0.1:8000");
        assert_eq!(config.probe.timeout_ms, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upstream.backend_url = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.probe.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_paths() {
        let mut config = Config::default();
        config.data = DataConfig::with_dir("/var/lib/medgate");
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/var/lib/medgate/server-registry.json")
        );
        assert_eq!(
            config.events_path(),
            PathBuf::from("/var/lib/medgate/runtime-events.jsonl")
        );
        assert_eq!(
            config.metrics_path(),
            PathBuf::from("/var/lib/medgate/runtime-metrics.jsonl")
        );
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config::default();
        assert_eq!(config.http_bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medgate.yaml");
        std::fs::write(
            &path,
            "server:\n  bind_address: 127.0.0.1\n  port: 9999\nprobe:\n  timeout_ms: 500\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.probe.timeout_ms, 500);
        // Untouched sections keep their defaults
        assert_eq!(config.upstream.backend_url, "http://127.0.0.1:8000");
    }
}
