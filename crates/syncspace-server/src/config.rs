//! Server configuration from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CHANNEL_CAPACITY: &str = "SYNCSPACE_CHANNEL_CAPACITY";

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Per-room broadcast buffer. Slow clients past this many frames skip
    /// ahead.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST) {
            config.host = parse(ENV_HOST, host)?;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse(ENV_PORT, port)?;
        }
        if let Some(capacity) = lookup(ENV_CHANNEL_CAPACITY) {
            config.channel_capacity = parse(ENV_CHANNEL_CAPACITY, capacity)?;
            if config.channel_capacity == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_CHANNEL_CAPACITY,
                    value: "0".to_string(),
                });
            }
        }
        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
