//! Server configuration.
//!
//! Loaded from an optional TOML file merged with `WEBSTORE_`-prefixed
//! environment variables (`__` separates sections, e.g.
//! `WEBSTORE_STORE__ADDRESS=unix:/run/redis.sock`). Every field has a default,
//! so an empty configuration is a working one.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default for `server.max_payload_bytes` (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "WEBSTORE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tls: TlsConfig,
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
}

/// Listener and dispatch settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Multi-threaded dispatch (mutex-guarded store) or a single cooperative loop.
    pub threaded: bool,
    pub max_payload_bytes: usize,
    /// How long open connections get to finish after a shutdown signal.
    pub drain_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            threaded: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            drain_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// PEM certificate chain and private key. TLS is on when both are set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TlsConfig {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    pub fn paths(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

/// Which store implementation backs the service.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// A Redis-compatible server over TCP or a Unix socket.
    #[default]
    Redis,
    /// Process-local map. Contents are lost on exit.
    Memory,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// `host:port` or `unix:/path/to/socket`.
    pub address: String,
    /// Sent with AUTH on every (re)connect.
    /// Prefer WEBSTORE_STORE__PASSWORD over storing it in the file.
    pub password: Option<String>,
    pub io_timeout_secs: u64,
    /// TTL applied to every stored record; unset means records never expire.
    pub expiration_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            address: "127.0.0.1:6379".to_string(),
            password: None,
            io_timeout_secs: 5,
            expiration_secs: None,
        }
    }
}

impl StoreConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.expiration_secs.map(Duration::from_secs)
    }
}

/// Admission control settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Connections allowed per address in one window.
    pub limit: u32,
    pub period_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 5,
            period_secs: 2,
        }
    }
}

impl RateLimitConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl AppConfig {
    /// Loads `path` (skipped when it does not exist) and the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if path.exists() {
            tracing::info!(config_path = %path.display(), "Loading configuration from file");
            figment = figment.merge(Toml::file(path));
        } else {
            tracing::debug!(config_path = %path.display(), "No config file found");
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Parses a TOML document, without consulting the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::new().merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// How often the memory backend should reclaim expired keys.
    ///
    /// Rate-limit counters die once per window, so that is the pace. With the
    /// limiter off only records expire, and only if an expiration is set.
    pub fn sweep_interval(&self) -> Option<Duration> {
        if self.rate_limit.enabled {
            Some(self.rate_limit.period())
        } else {
            self.store.expiration()
        }
    }

    /// Checks the configuration, returning warnings worth logging.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();

        if self.server.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_payload_bytes must be greater than 0".to_string(),
            ));
        }
        if self.store.io_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "store.io_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.store.expiration_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "store.expiration_secs must be greater than 0 when set".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Redis && self.store.address.trim().is_empty() {
            return Err(ConfigError::Invalid("store.address must not be empty".to_string()));
        }
        match (&self.tls.cert_path, &self.tls.key_path) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "tls requires both cert_path and key_path when either is set".to_string(),
                ))
            }
            _ => {}
        }

        if self.rate_limit.enabled {
            if self.rate_limit.limit == 0 {
                return Err(ConfigError::Invalid(
                    "rate_limit.limit must be greater than 0".to_string(),
                ));
            }
            if self.rate_limit.period_secs == 0 {
                return Err(ConfigError::Invalid(
                    "rate_limit.period_secs must be greater than 0".to_string(),
                ));
            }
        } else {
            warnings.push("rate limiting is disabled; every connection is admitted".to_string());
        }

        if self.store.backend == StoreBackend::Memory {
            warnings.push("memory backend selected; stored records are lost on exit".to_string());
            if self.store.password.is_some() {
                warnings.push("store.password is ignored by the memory backend".to_string());
            }
        }

        Ok(warnings)
    }
}
