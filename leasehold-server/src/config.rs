//! Server configuration
//!
//! Layered lowest to highest: built-in defaults, the TOML config file
//! (`~/.leasehold/config.toml` unless a path is given), then environment
//! variables. Command-line flags are applied on top by the binary.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::pool::DEFAULT_MAX_CONNECTIONS;

/// Deployment environment. Production adds the HSTS header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "ENVIRONMENT",
                value: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Development => "development",
            Self::Production => "production",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    pub bind_addr: SocketAddr,

    pub environment: Environment,

    /// Postgres URL. `None` is only valid for in-memory mode.
    pub database_url: Option<String>,

    pub max_connections: u32,

    /// Per-request deadline, applied by the timeout layer and the request context
    pub request_timeout: Duration,

    /// Allow any CORS origin (default: false = localhost only)
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            environment: Environment::Development,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            request_timeout: Duration::from_secs(30),
            cors_permissive: false,
        }
    }
}

/// Config file shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind: Option<SocketAddr>,
    environment: Option<Environment>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    request_timeout_secs: Option<u64>,
    cors_permissive: Option<bool>,
}

impl ServerConfig {
    /// `~/.leasehold/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".leasehold").join("config.toml"))
    }

    /// Defaults plus environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults, then the config file, then environment variables.
    ///
    /// An explicit `path` must exist; the default location is skipped when absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match path {
            Some(path) => config.apply_file(path)?,
            None => {
                if let Some(path) = Self::default_config_path().filter(|p| p.exists()) {
                    config.apply_file(&path)?;
                }
            }
        }

        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "loaded config file");
        self.merge(file);
        Ok(())
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(bind) = file.bind {
            self.bind_addr = bind;
        }
        if let Some(environment) = file.environment {
            self.environment = environment;
        }
        if file.database_url.is_some() {
            self.database_url = file.database_url;
        }
        if let Some(max) = file.max_connections {
            self.max_connections = max;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(permissive) = file.cors_permissive {
            self.cors_permissive = permissive;
        }
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply variables looked up through `get`. Empty values count as unset.
    ///
    /// `PORT` only changes the port; `LEASEHOLD_BIND` replaces the whole address.
    pub fn apply_env_with(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let lookup = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = lookup("PORT") {
            self.bind_addr.set_port(parse("PORT", &port)?);
        }
        if let Some(bind) = lookup("LEASEHOLD_BIND") {
            self.bind_addr = parse("LEASEHOLD_BIND", &bind)?;
        }
        if let Some(environment) = lookup("ENVIRONMENT") {
            self.environment = environment.parse()?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(max) = lookup("LEASEHOLD_MAX_CONNECTIONS") {
            self.max_connections = parse("LEASEHOLD_MAX_CONNECTIONS", &max)?;
        }
        if let Some(secs) = lookup("LEASEHOLD_REQUEST_TIMEOUT_SECS") {
            self.request_timeout =
                Duration::from_secs(parse("LEASEHOLD_REQUEST_TIMEOUT_SECS", &secs)?);
        }
        if let Some(flag) = lookup("LEASEHOLD_CORS_PERMISSIVE") {
            self.cors_permissive = parse_flag("LEASEHOLD_CORS_PERMISSIVE", &flag)?;
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
