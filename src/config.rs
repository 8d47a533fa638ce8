use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::services::registry::RegistrySettings;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_PREFIX: &str = "REGISTRY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid environment variable: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid listen address '{addr}': {source}")]
    ListenAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:50051".to_string(),
        }
    }
}

// 心跳超时与清理间隔，单位秒
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub heartbeat_timeout: u64,
    pub cleanup_interval: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: 30,
            cleanup_interval: 10,
        }
    }
}

// 环境变量覆盖项：REGISTRY_HEARTBEAT_TIMEOUT 等
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    heartbeat_timeout: Option<u64>,
    cleanup_interval: Option<u64>,
    listen_addr: Option<String>,
}

impl Config {
    /// 加载配置：.env -> config.toml（可选）-> REGISTRY_* 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }

        let mut config = Self::from_file_or_default(DEFAULT_CONFIG_PATH)?;
        let overrides = envy::prefixed(ENV_PREFIX).from_env::<EnvOverrides>()?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match fs::read_to_string(path.as_ref()) {
            Ok(config_str) => Self::from_toml_str(&config_str),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_str)?;
        Ok(config)
    }

    /// 用给定的键值对覆盖配置，键名与环境变量相同
    pub fn with_env_iter<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_iter(vars)?;
        self.apply(overrides);
        self.validate()?;
        Ok(self)
    }

    fn apply(&mut self, overrides: EnvOverrides) {
        if let Some(timeout) = overrides.heartbeat_timeout {
            self.registry.heartbeat_timeout = timeout;
        }
        if let Some(interval) = overrides.cleanup_interval {
            self.registry.cleanup_interval = interval;
        }
        if let Some(addr) = overrides.listen_addr {
            self.server.listen_addr = addr;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.heartbeat_timeout == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_timeout must be greater than zero".into(),
            ));
        }
        if self.registry.cleanup_interval == 0 {
            return Err(ConfigError::Invalid(
                "cleanup_interval must be greater than zero".into(),
            ));
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|source| ConfigError::ListenAddr {
                addr: self.server.listen_addr.clone(),
                source,
            })
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            heartbeat_timeout: Duration::from_secs(self.registry.heartbeat_timeout),
            cleanup_interval: Duration::from_secs(self.registry.cleanup_interval),
        }
    }
}
