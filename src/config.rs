//! Configuration loading from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::ratelimit::{DEFAULT_BURST, DEFAULT_REQUESTS_PER_SECOND};
use crate::webhooks::MIN_SECRET_LEN;
use crate::worker::{DEFAULT_MAX_BACKLOG, DEFAULT_WORKERS};

pub const ENV_PORT: &str = "CLOUD_UPDATE_PORT";
pub const ENV_SECRET: &str = "CLOUD_UPDATE_SECRET";
pub const ENV_LOG_LEVEL: &str = "CLOUD_UPDATE_LOG_LEVEL";
pub const ENV_LOG_FILE: &str = "CLOUD_UPDATE_LOG_FILE";
pub const ENV_WORKERS: &str = "CLOUD_UPDATE_WORKERS";
pub const ENV_MAX_BACKLOG: &str = "CLOUD_UPDATE_MAX_BACKLOG";
pub const ENV_RATE_LIMIT_RPS: &str = "CLOUD_UPDATE_RATE_LIMIT_RPS";
pub const ENV_RATE_LIMIT_BURST: &str = "CLOUD_UPDATE_RATE_LIMIT_BURST";
pub const ENV_TRUST_PROXY_HEADERS: &str = "CLOUD_UPDATE_TRUST_PROXY_HEADERS";

pub const DEFAULT_PORT: u16 = 9999;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable CLOUD_UPDATE_SECRET")]
    MissingSecret,

    #[error("webhook secret must be at least {min} bytes, got {0}", min = MIN_SECRET_LEN)]
    SecretTooShort(usize),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Minimum severity that gets logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Invalid {
                var: ENV_LOG_LEVEL,
                value: s.to_string(),
                reason: "expected one of debug, info, warn, error",
            }),
        }
    }
}

/// Service configuration.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// HMAC key for request signatures.
    pub secret: String,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub workers: usize,
    pub max_backlog: usize,
    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
    /// Whether `X-Forwarded-For` / `X-Real-IP` may identify the client.
    pub trust_proxy_headers: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("workers", &self.workers)
            .field("max_backlog", &self.max_backlog)
            .field("rate_limit_rps", &self.rate_limit_rps)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CLOUD_UPDATE_SECRET`: HMAC key, at least 32 bytes
    ///
    /// Optional (with defaults):
    /// - `CLOUD_UPDATE_PORT` (9999)
    /// - `CLOUD_UPDATE_LOG_LEVEL` (info)
    /// - `CLOUD_UPDATE_LOG_FILE` (unset: stdout only)
    /// - `CLOUD_UPDATE_WORKERS` (10), `CLOUD_UPDATE_MAX_BACKLOG` (100)
    /// - `CLOUD_UPDATE_RATE_LIMIT_RPS` (10), `CLOUD_UPDATE_RATE_LIMIT_BURST` (20)
    /// - `CLOUD_UPDATE_TRUST_PROXY_HEADERS` (true)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(ENV_SECRET)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        validate_secret(&secret)?;

        let log_level = match lookup(ENV_LOG_LEVEL) {
            Some(level) => level.parse()?,
            None => LogLevel::default(),
        };

        let rate_limit_rps = parse_or(
            &lookup,
            ENV_RATE_LIMIT_RPS,
            DEFAULT_REQUESTS_PER_SECOND,
            "must be a number",
        )?;
        if !(rate_limit_rps.is_finite() && rate_limit_rps > 0.0) {
            return Err(ConfigError::Invalid {
                var: ENV_RATE_LIMIT_RPS,
                value: rate_limit_rps.to_string(),
                reason: "must be a positive number",
            });
        }

        Ok(Config {
            port: parse_or(&lookup, ENV_PORT, DEFAULT_PORT, "must be a valid port number")?,
            secret,
            log_level,
            log_file: lookup(ENV_LOG_FILE)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            workers: parse_or(
                &lookup,
                ENV_WORKERS,
                DEFAULT_WORKERS,
                "must be a positive integer",
            )?
            .max(1),
            max_backlog: parse_or(
                &lookup,
                ENV_MAX_BACKLOG,
                DEFAULT_MAX_BACKLOG,
                "must be a positive integer",
            )?
            .max(1),
            rate_limit_rps,
            rate_limit_burst: parse_or(
                &lookup,
                ENV_RATE_LIMIT_BURST,
                DEFAULT_BURST,
                "must be a positive integer",
            )?
            .max(1),
            trust_proxy_headers: match lookup(ENV_TRUST_PROXY_HEADERS) {
                Some(value) => parse_bool(ENV_TRUST_PROXY_HEADERS, &value)?,
                None => true,
            },
        })
    }
}

/// Rejects secrets shorter than [`MIN_SECRET_LEN`] bytes.
pub fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::SecretTooShort(secret.len()));
    }
    Ok(())
}

fn parse_or<F, T>(
    lookup: &F,
    var: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            reason,
        }),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected true or false",
        }),
    }
}
