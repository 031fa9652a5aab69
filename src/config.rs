//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup; a `.env` file is honored for local
//! development.

use crate::time_utils::{parse_weekday, WeekCalendar};
use chrono::{FixedOffset, Weekday};
use std::env;

/// Default trailing window for insight generation.
pub const DEFAULT_INSIGHT_WINDOW_DAYS: i64 = 7;
/// Default number of records returned by history endpoints.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Google Cloud Firestore (or the emulator)
    Firestore,
    /// In-process store; data is lost on restart
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub storage_backend: StorageBackend,

    // --- Engine Settings ---
    /// First day of a goal week
    pub week_start: Weekday,
    /// Local offset used for day and week boundaries, in minutes east of UTC
    pub utc_offset_minutes: i32,
    /// Trailing window for insight generation, in days
    pub insight_window_days: i64,
    /// Records returned by history endpoints
    pub history_limit: u32,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            week_start: Weekday::Sun,
            utc_offset_minutes: 0,
            insight_window_days: DEFAULT_INSIGHT_WINDOW_DAYS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_lowercase()
            .as_str()
        {
            "firestore" => StorageBackend::Firestore,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let week_start = match env::var("WEEK_START") {
            Ok(raw) => parse_weekday(&raw).ok_or(ConfigError::Invalid {
                name: "WEEK_START",
                value: raw,
            })?,
            Err(_) => Weekday::Sun,
        };

        let utc_offset_minutes = parse_or("UTC_OFFSET_MINUTES", 0)?;
        // Validate now so `calendar()` cannot fail later
        if FixedOffset::east_opt(utc_offset_minutes * 60).is_none() {
            return Err(ConfigError::Invalid {
                name: "UTC_OFFSET_MINUTES",
                value: utc_offset_minutes.to_string(),
            });
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend,
            week_start,
            utc_offset_minutes,
            insight_window_days: window_days(parse_or(
                "INSIGHT_WINDOW_DAYS",
                DEFAULT_INSIGHT_WINDOW_DAYS,
            )?)?,
            history_limit: parse_or("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }

    /// Calendar used for day and week boundaries.
    pub fn calendar(&self) -> WeekCalendar {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| WeekCalendar::default().offset);
        WeekCalendar::new(self.week_start, offset)
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Insight window length; an empty or negative window never yields data.
fn window_days(days: i64) -> Result<i64, ConfigError> {
    if days <= 0 {
        return Err(ConfigError::Invalid {
            name: "INSIGHT_WINDOW_DAYS",
            value: days.to_string(),
        });
    }
    Ok(days)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
