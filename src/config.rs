//! Process configuration read once from the environment at startup

use std::env;

use chrono::TimeDelta;
use thiserror::Error;

use crate::token::{DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_TOKEN_TTL_SECS};

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Settings of a running server
///
/// # Environment Variables
///
/// - `DATABASE_URL` - Path to the database file (required)
/// - `JWT_SECRET` - Token signing secret (required, non-empty)
/// - `PORT` - Server port number (default: 5000)
/// - `BASE_URL` - Prefix for rendered short URLs (default: `http://localhost:{PORT}`)
/// - `TOKEN_TTL_SECS` - Token validity window (default: 86400)
/// - `TOKEN_REFRESH_SECS` - Remaining validity that triggers reissue (default: 300,
///   must be below `TOKEN_TTL_SECS`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub base_url: String,
    pub token_ttl: TimeDelta,
    pub refresh_threshold: TimeDelta,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let port: u16 = match lookup("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let base_url = lookup("BASE_URL")
            .filter(|value| !value.is_empty())
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let token_ttl = seconds(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        let refresh_threshold =
            seconds(&lookup, "TOKEN_REFRESH_SECS", DEFAULT_REFRESH_THRESHOLD_SECS)?;
        // A threshold covering the whole validity would reissue on every request
        if refresh_threshold >= token_ttl {
            return Err(ConfigError::Invalid {
                name: "TOKEN_REFRESH_SECS",
                value: refresh_threshold.num_seconds().to_string(),
            });
        }

        Ok(Self {
            port,
            database_url,
            jwt_secret,
            base_url,
            token_ttl,
            refresh_threshold,
        })
    }
}

fn seconds<F>(lookup: &F, name: &'static str, default: i64) -> Result<TimeDelta, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(TimeDelta::seconds(default));
    };
    match value.parse::<u32>() {
        Ok(secs) if secs > 0 => Ok(TimeDelta::seconds(i64::from(secs))),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}
