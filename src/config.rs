use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_MAX_HOPS, DEFAULT_PIN_TIMEOUT_SECONDS, DEFAULT_SOURCE_TAG, DEFAULT_USER_AGENT,
    PINATA_PIN_JSON_URL,
};
use crate::error::{PhishError, Result};
use crate::rate_limiter::RateLimitConfig;

pub const DEFAULT_CONFIG_PATH: &str = "phishblock.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub resolver: ResolverConfig,
    pub rate_limit: RateLimitConfig,
    pub pinning: PinningConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: PathBuf::from("data/phishblock.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub max_hops: usize,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinningProvider {
    Pinata,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PinningConfig {
    pub provider: PinningProvider,
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub source_tag: String,
    pub local_root: PathBuf,
}

impl Default for PinningConfig {
    fn default() -> Self {
        Self {
            provider: PinningProvider::Pinata,
            endpoint: PINATA_PIN_JSON_URL.to_string(),
            timeout_seconds: DEFAULT_PIN_TIMEOUT_SECONDS,
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            local_root: PathBuf::from("data/evidence"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus listener address; metrics are not exported when unset
    pub addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Load from a TOML file (defaults when the file does not exist), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PhishError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        config.rate_limit.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.rate_limit.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("PHISHBLOCK_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| PhishError::Config(format!("PHISHBLOCK_PORT '{}': {}", port, e)))?;
        }
        if let Ok(path) = std::env::var("PHISHBLOCK_DATABASE") {
            self.storage.backend = StorageBackend::Sqlite;
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(addr) = std::env::var("PHISHBLOCK_METRICS_ADDR") {
            let parsed = addr.parse().map_err(|e| {
                PhishError::Config(format!("PHISHBLOCK_METRICS_ADDR '{}': {}", addr, e))
            })?;
            self.metrics.addr = Some(parsed);
        }
        Ok(())
    }
}
