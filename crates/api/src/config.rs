//! Runtime configuration for the API binary, read from the environment.

use std::net::SocketAddr;

use thiserror::Error;

use crate::app::{BatchLimits, LimitsError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error(transparent)]
    Limits(#[from] LimitsError),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Unset means in-memory stores (dev mode).
    pub database_url: Option<String>,
    pub limits: BatchLimits,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = parse_or(&lookup, "BIND_ADDR", "0.0.0.0:8000".parse().ok())?;
        let fetch = parse_or(&lookup, "NOTIFICATION_BATCH_LIMIT", Some(100))?;
        let ack = parse_or(&lookup, "ACK_BATCH_LIMIT", Some(100))?;

        Ok(Self {
            bind_addr,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            limits: BatchLimits::new(fetch, ack)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => default.ok_or(ConfigError::Invalid {
            var,
            value: String::new(),
        }),
    }
}
