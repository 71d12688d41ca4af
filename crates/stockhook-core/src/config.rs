//! Configuration module
//!
//! The configuration is read from the environment exactly once at startup and then
//! passed down explicitly. Core logic never looks at environment variables.

use std::env;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_LIST_LIMIT, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_RECORDS, DEFAULT_PORT,
    DEFAULT_PREVIEW_BYTES, DEFAULT_RENDER_MAX_BYTES,
};

/// Console log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Shared secret required for ingestion. `None` means ingestion fails closed.
    pub auth_token: Option<String>,
    pub max_body_bytes: u64,
    pub preview_bytes: u64,
    pub render_max_bytes: u64,
    /// Number of records kept by retention; zero or negative disables eviction.
    pub max_records: i64,
    pub list_limit: usize,
    pub environment: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Configuration with defaults for everything but the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            data_dir: data_dir.into(),
            auth_token: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
            render_max_bytes: DEFAULT_RENDER_MAX_BYTES,
            max_records: DEFAULT_MAX_RECORDS,
            list_limit: DEFAULT_LIST_LIMIT,
            environment: "development".to_string(),
            log_format: LogFormat::Compact,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let log_format = match lookup("LOG_FORMAT")
            .unwrap_or_default()
            .trim()
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        let config = Config {
            host: lookup("STOCKHOOK_HOST")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("STOCKHOOK_PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("STOCKHOOK_PORT must be a valid port number"))?,
            data_dir: lookup("STOCKHOOK_DATA_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            auth_token: lookup("STOCKHOOK_TOKEN")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            max_body_bytes: parse_or(&lookup, "STOCKHOOK_MAX_BODY", DEFAULT_MAX_BODY_BYTES),
            preview_bytes: parse_or(&lookup, "STOCKHOOK_PREVIEW_BYTES", DEFAULT_PREVIEW_BYTES),
            render_max_bytes: parse_or(
                &lookup,
                "STOCKHOOK_RENDER_MAX_BYTES",
                DEFAULT_RENDER_MAX_BYTES,
            ),
            max_records: parse_or(&lookup, "STOCKHOOK_MAX_RECORDS", DEFAULT_MAX_RECORDS),
            list_limit: parse_or(&lookup, "STOCKHOOK_LIST_LIMIT", DEFAULT_LIST_LIMIT),
            environment,
            log_format,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_body_bytes == 0 {
            return Err(anyhow::anyhow!("STOCKHOOK_MAX_BODY must be greater than zero"));
        }
        if self.preview_bytes == 0 {
            return Err(anyhow::anyhow!(
                "STOCKHOOK_PREVIEW_BYTES must be greater than zero"
            ));
        }
        if self.render_max_bytes == 0 {
            return Err(anyhow::anyhow!(
                "STOCKHOOK_RENDER_MAX_BYTES must be greater than zero"
            ));
        }
        if self.list_limit == 0 {
            return Err(anyhow::anyhow!("STOCKHOOK_LIST_LIMIT must be greater than zero"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
