//! Occupancy rollover configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use chrono_tz::Tz;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default reference time zone for day boundaries.
pub const DEFAULT_TIME_ZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Default maximum database pool connections.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default database pool acquire timeout in seconds.
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_SECONDS: u64 = 5;

/// Occupancy rollover configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Reference time zone defining "the day" for scheduling and snapshot windows.
    pub time_zone: Tz,

    /// Maximum connections held by the database pool.
    pub db_max_connections: u32,

    /// Seconds to wait when acquiring a pooled connection.
    pub db_acquire_timeout_seconds: u64,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("time_zone", &self.time_zone.name())
            .field("db_max_connections", &self.db_max_connections)
            .field(
                "db_acquire_timeout_seconds",
                &self.db_acquire_timeout_seconds,
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid time zone configuration: {0}")]
    InvalidTimeZone(String),

    #[error("Invalid database pool configuration: {0}")]
    InvalidPool(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let time_zone = match vars.get("ROLLOVER_TIME_ZONE") {
            Some(value_str) => value_str.parse::<Tz>().map_err(|e| {
                ConfigError::InvalidTimeZone(format!(
                    "ROLLOVER_TIME_ZONE must be an IANA zone name, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_TIME_ZONE,
        };

        let db_max_connections =
            parse_positive(vars, "ROLLOVER_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;

        let db_acquire_timeout_seconds = parse_positive(
            vars,
            "ROLLOVER_DB_ACQUIRE_TIMEOUT_SECONDS",
            DEFAULT_DB_ACQUIRE_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            database_url,
            time_zone,
            db_max_connections,
            db_acquire_timeout_seconds,
        })
    }
}

fn parse_positive<T>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| {
        ConfigError::InvalidPool(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidPool(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}
