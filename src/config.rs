use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::TrackerError;

pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const DEFAULT_COURSE_DETAIL_URL: &str =
    "https://oscar.gatech.edu/pls/bprod/bwckschd.p_disp_detail_sched";
pub const DEFAULT_REGISTRATION_URL: &str =
    "https://registration.banner.gatech.edu/StudentRegistrationSsb/ssb/registration/registration";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub telegram: TelegramConfig,
    pub registration: RegistrationConfig,
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: String,
    pub updates_timeout_secs: u64, // long-poll window for getUpdates
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub term: String,
    pub course_detail_url: String,
    pub registration_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, TrackerError> {
        let defaults = TrackerConfig::default();

        Ok(Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "file://data.db".to_string()),

            telegram: TelegramConfig {
                bot_token: env::var("BOT_TOKEN")
                    .map_err(|_| TrackerError::Config("BOT_TOKEN must be set".to_string()))?,
                api_url: env::var("TELEGRAM_API_URL")
                    .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.to_string()),
                updates_timeout_secs: parse_var("UPDATES_TIMEOUT_SECS", 25)?,
            },

            registration: RegistrationConfig {
                term: term_from_env()?,
                course_detail_url: env::var("COURSE_DETAIL_URL")
                    .unwrap_or_else(|_| DEFAULT_COURSE_DETAIL_URL.to_string()),
                registration_url: env::var("REGISTRATION_URL")
                    .unwrap_or_else(|_| DEFAULT_REGISTRATION_URL.to_string()),
            },

            tracker: TrackerConfig {
                poll_interval_secs: require_nonzero(
                    "POLL_INTERVAL_SECS",
                    parse_var("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
                )?,
                request_timeout_secs: require_nonzero(
                    "REQUEST_TIMEOUT_SECS",
                    parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
                )?,
            },
        })
    }
}

fn parse_var(name: &str, default: u64) -> Result<u64, TrackerError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            TrackerError::Config(format!("{} must be a whole number of seconds, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

fn require_nonzero(name: &str, value: u64) -> Result<u64, TrackerError> {
    if value == 0 {
        return Err(TrackerError::Config(format!("{} must be at least 1 second", name)));
    }
    Ok(value)
}

fn term_from_env() -> Result<String, TrackerError> {
    if let Ok(term) = env::var("REGISTRATION_TERM") {
        return Ok(term.trim().to_string());
    }
    let session = env::var("TERM_SESSION").map_err(|_| {
        TrackerError::Config("REGISTRATION_TERM or TERM_SESSION must be set".to_string())
    })?;
    term_code(&session)
}

/// Converts a session such as "Fall 2024" into the term code "202408".
pub fn term_code(session: &str) -> Result<String, TrackerError> {
    let mut parts = session.split_whitespace();
    let (season, year) = match (parts.next(), parts.next(), parts.next()) {
        (Some(season), Some(year), None) => (season, year),
        _ => {
            return Err(TrackerError::Config(format!(
                "TERM_SESSION must look like 'Fall 2024', got '{}'",
                session
            )))
        }
    };

    let month = match season.to_ascii_lowercase().as_str() {
        "spring" => "02",
        "summer" => "05",
        "fall" => "08",
        other => {
            return Err(TrackerError::Config(format!("unknown season '{}'", other)));
        }
    };

    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(TrackerError::Config(format!("invalid year '{}'", year)));
    }

    Ok(format!("{}{}", year, month))
}
