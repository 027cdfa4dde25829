//! Configuration management for the page extraction server

use serde::Deserialize;
use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on request body size
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Wall-clock limit for one extraction
    pub timeout_secs: u64,
}

/// Errors from reading the environment
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_body_bytes: 64 * 1024 * 1024,
            },
            extraction: ExtractionConfig { timeout_secs: 30 },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
                max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.server.max_body_bytes)?,
            },
            extraction: ExtractionConfig {
                timeout_secs: parse_var("EXTRACT_TIMEOUT_SECS", defaults.extraction.timeout_secs)?,
            },
        })
    }

    /// Address to bind, falling back to all interfaces if the host does not parse
    pub fn bind_addr(&self) -> SocketAddr {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.server.port)))
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
