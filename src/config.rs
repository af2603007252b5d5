//! Service configuration read from environment variables (a `.env` file is
//! loaded first by `main`).

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::CircuitBreakerConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub host: String,
    pub port: u16,
    pub products_base_url: String,
    pub products_timeout: Duration,
    pub breaker: CircuitBreakerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let breaker = CircuitBreakerConfig::builder()
            .failure_threshold(parse_or(&lookup, "BREAKER_FAILURE_THRESHOLD", 5)?)
            .open_duration(Duration::from_secs(parse_or(&lookup, "BREAKER_OPEN_SECS", 30)?))
            .half_open_max_calls(parse_or(&lookup, "BREAKER_HALF_OPEN_CALLS", 1)?)
            .success_threshold(parse_or(&lookup, "BREAKER_SUCCESS_THRESHOLD", 1)?)
            .build();

        Ok(Self {
            database_url,
            db_pool_size: parse_or(&lookup, "DB_POOL_SIZE", 10)?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            products_base_url: lookup("PRODUCTS_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8081".to_string()),
            products_timeout: Duration::from_millis(parse_or(&lookup, "PRODUCTS_TIMEOUT_MS", 2000)?),
            breaker,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
