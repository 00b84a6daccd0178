//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// Connection string of the primary document store. Optional: without it
    /// the fallback chain starts at the gist mirror.
    pub database_url: Option<String>,
    /// Gist id + token of the remote mirror backend. Both must be present
    /// for the backend to report itself available.
    pub gist_id: Option<String>,
    pub github_token: Option<String>,
    /// Path of the local JSON mirror, the backend of last resort.
    pub data_file: PathBuf,
    /// Optional JSON file with a list of ISO holiday dates.
    pub holiday_file: Option<PathBuf>,
    /// Session lifetime in days.
    pub session_ttl_days: i64,
    /// Origin allowed by the CORS layer.
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Storage Backend Settings (all optional except the local file) ---
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let gist_id = std::env::var("GIST_ID").ok().filter(|v| !v.is_empty());
        let github_token = std::env::var("GITHUB_TOKEN").ok().filter(|v| !v.is_empty());

        let data_file = std::env::var("DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./attendance_data.json"));

        let holiday_file = std::env::var("HOLIDAY_FILE").ok().map(PathBuf::from);

        let session_ttl_days = match std::env::var("SESSION_TTL_DAYS") {
            Ok(raw) => raw.parse::<i64>().map_err(|e| {
                ConfigError::InvalidValue("SESSION_TTL_DAYS".to_string(), e.to_string())
            })?,
            Err(_) => 30,
        };

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            log_level,
            database_url,
            gist_id,
            github_token,
            data_file,
            holiday_file,
            session_ttl_days,
            allowed_origin,
        })
    }
}
