//! Environment-backed configuration.
//!
//! Every setting has a default; override with the environment variables
//! listed on [`Config`].

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;
use pipeline::RecencyMode;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Port value is outside valid range (1-65535).
    #[error("invalid port '{value}': must be between 1 and 65535")]
    InvalidPort { value: String },

    /// Port string could not be parsed as a number.
    #[error("failed to parse port '{value}': {source}")]
    PortParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Bind address string could not be parsed.
    #[error("failed to parse bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid ML timeout '{value}': expected a positive number of milliseconds")]
    InvalidTimeout { value: String },

    #[error("invalid client origin '{value}'")]
    InvalidOrigin { value: String },

    #[error("invalid recency mode: {0}")]
    InvalidRecencyMode(String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (`PORT`). Default: `5000`.
    pub port: u16,

    /// IP address to bind to (`BIND_ADDR`). Default: `0.0.0.0`.
    pub bind_addr: IpAddr,

    /// Origin allowed by CORS (`CLIENT_ORIGIN`). Default: `http://localhost:5173`.
    pub client_origin: String,

    /// External recommendation service (`ML_URL`). Unset means local scoring only.
    pub ml_url: Option<String>,

    /// Upper bound on a remote ranking call (`ML_TIMEOUT_MS`). Default: 2 s.
    pub ml_timeout: Duration,

    /// JSON database file (`EVENTS_DB`). Default: `./db.json`.
    pub db_path: PathBuf,

    /// Recency handling for past events (`RECENCY_MODE`). Default: `clamp`.
    pub recency_mode: RecencyMode,
}

/// Default CORS origin, the frontend dev server.
pub const DEFAULT_CLIENT_ORIGIN: &str = "http://localhost:5173";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            client_origin: DEFAULT_CLIENT_ORIGIN.to_string(),
            ml_url: None,
            ml_timeout: Duration::from_millis(2000),
            db_path: PathBuf::from("./db.json"),
            recency_mode: RecencyMode::default(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "PORT";
    const ENV_BIND_ADDR: &'static str = "BIND_ADDR";
    const ENV_CLIENT_ORIGIN: &'static str = "CLIENT_ORIGIN";
    const ENV_ML_URL: &'static str = "ML_URL";
    const ENV_ML_TIMEOUT_MS: &'static str = "ML_TIMEOUT_MS";
    const ENV_DB_PATH: &'static str = "EVENTS_DB";
    const ENV_RECENCY_MODE: &'static str = "RECENCY_MODE";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        // Blank values count as unset
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get(Self::ENV_PORT) {
            Some(value) => parse_port(value)?,
            None => defaults.port,
        };

        let bind_addr = match get(Self::ENV_BIND_ADDR) {
            Some(value) => value
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddr { value, source })?,
            None => defaults.bind_addr,
        };

        let client_origin = get(Self::ENV_CLIENT_ORIGIN).unwrap_or(defaults.client_origin);
        if HeaderValue::from_str(&client_origin).is_err() {
            return Err(ConfigError::InvalidOrigin {
                value: client_origin,
            });
        }

        let ml_timeout = match get(Self::ENV_ML_TIMEOUT_MS) {
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ConfigError::InvalidTimeout { value }),
            },
            None => defaults.ml_timeout,
        };

        let recency_mode = match get(Self::ENV_RECENCY_MODE) {
            Some(value) => value.parse().map_err(ConfigError::InvalidRecencyMode)?,
            None => defaults.recency_mode,
        };

        Ok(Self {
            port,
            bind_addr,
            client_origin,
            ml_url: get(Self::ENV_ML_URL),
            ml_timeout,
            db_path: get(Self::ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            recency_mode,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_port(value: String) -> Result<u16, ConfigError> {
    let port: u16 = value.parse().map_err(|source| ConfigError::PortParseError {
        value: value.clone(),
        source,
    })?;
    if port == 0 {
        return Err(ConfigError::InvalidPort { value });
    }
    Ok(port)
}
