//! Terminal configuration management
//!
//! Loads the API location and the election/polling-place identifiers from
//! environment variables with validation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api";

/// Connection settings for the external voting API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root for all calls (e.g. `http://localhost:3001/api`)
    pub base_url: String,

    /// Per-request timeout in seconds (default: 10)
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    /// Load API configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let base_url =
            std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        Self::validate_base_url(&base_url)?;

        let request_timeout_seconds = std::env::var("API_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| Error::config("Invalid API_TIMEOUT_SECONDS"))?;

        if request_timeout_seconds == 0 {
            return Err(Error::config("API_TIMEOUT_SECONDS must be positive"));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout_seconds,
        })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_seconds: 2,
        }
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    fn validate_base_url(base_url: &str) -> Result<()> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(Error::config("API_BASE_URL must not be empty"));
        }
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(Error::config(format!(
                "API_BASE_URL must be an http(s) URL, got {trimmed}"
            )));
        }
        Ok(())
    }
}

/// Settings the session state machine needs for every episode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminalSettings {
    /// Target election
    pub election_id: i64,

    /// Polling place included in every vote payload
    pub establishment_id: i64,

    /// Delay before the success screen locks the terminal (default: 4000 ms)
    pub success_lock_delay_ms: u64,
}

impl TerminalSettings {
    /// Load terminal settings from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let election_id = Self::positive_id("ELECTION_ID")?;
        let establishment_id = Self::positive_id("ESTABLECIMIENTO_ID")?;

        let success_lock_delay_ms = std::env::var("SUCCESS_LOCK_DELAY_MS")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| Error::config("Invalid SUCCESS_LOCK_DELAY_MS"))?;

        Ok(Self {
            election_id,
            establishment_id,
            success_lock_delay_ms,
        })
    }

    /// Delay before the success screen locks the terminal
    pub fn success_lock_delay(&self) -> Duration {
        Duration::from_millis(self.success_lock_delay_ms)
    }

    fn positive_id(name: &str) -> Result<i64> {
        let id: i64 = std::env::var(name)
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| Error::config(format!("Invalid {name}")))?;

        if id <= 0 {
            return Err(Error::config(format!("{name} must be positive")));
        }
        Ok(id)
    }
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            election_id: 1,
            establishment_id: 1,
            success_lock_delay_ms: 4000,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub terminal: TerminalSettings,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        let api = ApiConfig::from_env()?;
        let terminal = TerminalSettings::from_env()?;

        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        Ok(Self {
            api,
            terminal,
            logging,
        })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            api: ApiConfig::for_testing(),
            terminal: TerminalSettings::default(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
