//! Runtime configuration read from the environment.
//!
//! Every loader takes a lookup closure so callers can layer command-line
//! overrides over process environment variables, and tests can pass a map.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::codec::EmptyDatePolicy;
use crate::sync::{DuplicatePolicy, RetryPolicy, SyncOptions};
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_STEAM_API_URL: &str = "https://api.steampowered.com";
pub const DEFAULT_MAPPING_FILE: &str = "mapping.json";
pub const DEFAULT_JSON_FILE: &str = "steam_games.json";
pub const DEFAULT_COVER_FIELD: &str = "Banner";

const DEFAULT_NOTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STEAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ACHIEVEMENT_DELAY_MS: u64 = 500;
const DEFAULT_PACING_MS: u64 = 300;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 2000;

/// Snapshot of the process environment as a lookup closure.
pub fn env_lookup() -> impl Fn(&str) -> Option<String> {
    let values: HashMap<String, String> = env::vars().collect();
    move |name| values.get(name).cloned()
}

/// Connection settings for the Notion API.
#[derive(Clone, PartialEq, Eq)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub api_url: String,
    pub version: String,
    pub timeout: Duration,
}

impl fmt::Debug for NotionConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NotionConfig")
            .field("token", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .field("api_url", &self.api_url)
            .field("version", &self.version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl NotionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = required_trimmed(&lookup, "NOTION_TOKEN")?;
        let database_id = required_trimmed(&lookup, "NOTION_DATABASE_ID")?;

        let api_url = value_or_default(&lookup, "NOTION_API_URL", DEFAULT_NOTION_API_URL);
        if !is_http_url(&api_url) {
            return Err(Error::Config(
                "NOTION_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let version = value_or_default(&lookup, "NOTION_VERSION", DEFAULT_NOTION_VERSION);
        let timeout_secs =
            parse_or_default(&lookup, "NOTION_TIMEOUT_SECS", DEFAULT_NOTION_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(Error::Config(
                "NOTION_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            token,
            database_id,
            api_url: api_url.trim_end_matches('/').to_string(),
            version,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Credentials and knobs for the Steam Web API.
#[derive(Clone, PartialEq, Eq)]
pub struct SteamConfig {
    pub api_key: String,
    pub user_id: String,
    pub api_url: String,
    pub timeout: Duration,
    pub include_achievements: bool,
    /// Pause between per-game achievement requests
    pub achievement_delay: Duration,
}

impl fmt::Debug for SteamConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SteamConfig")
            .field("api_key", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .field("include_achievements", &self.include_achievements)
            .field("achievement_delay", &self.achievement_delay)
            .finish()
    }
}

impl SteamConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = required_trimmed(&lookup, "STEAM_API_KEY")?;
        let user_id = required_trimmed(&lookup, "STEAM_USER_ID")?;
        if !user_id.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(Error::Config(
                "STEAM_USER_ID must be a numeric 64-bit Steam ID".to_string(),
            ));
        }

        let api_url = value_or_default(&lookup, "STEAM_API_URL", DEFAULT_STEAM_API_URL);
        if !is_http_url(&api_url) {
            return Err(Error::Config(
                "STEAM_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let timeout_secs =
            parse_or_default(&lookup, "STEAM_TIMEOUT_SECS", DEFAULT_STEAM_TIMEOUT_SECS)?;
        let include_achievements = parse_bool_or_default(&lookup, "STEAM_ACHIEVEMENTS", true)?;
        let achievement_delay_ms =
            parse_or_default(&lookup, "STEAM_ACHIEVEMENT_DELAY_MS", DEFAULT_ACHIEVEMENT_DELAY_MS)?;

        Ok(Self {
            api_key,
            user_id,
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
            include_achievements,
            achievement_delay: Duration::from_millis(achievement_delay_ms),
        })
    }
}

/// Locations of the mapping definition and the local inventory file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub mapping_file: PathBuf,
    pub json_file: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            mapping_file: PathBuf::from(DEFAULT_MAPPING_FILE),
            json_file: PathBuf::from(DEFAULT_JSON_FILE),
        }
    }
}

impl DataPaths {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            mapping_file: PathBuf::from(value_or_default(
                &lookup,
                "MAPPING_FILE",
                DEFAULT_MAPPING_FILE,
            )),
            json_file: PathBuf::from(value_or_default(&lookup, "JSON_FILE", DEFAULT_JSON_FILE)),
        }
    }
}

impl SyncOptions {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let pacing_ms = parse_or_default(&lookup, "SYNC_PACING_MS", DEFAULT_PACING_MS)?;
        let max_attempts = parse_or_default(&lookup, "SYNC_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(Error::Config(
                "SYNC_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let backoff_ms = parse_or_default(&lookup, "SYNC_BACKOFF_MS", DEFAULT_BACKOFF_MS)?;

        let duplicate_policy = optional_trimmed(&lookup, "SYNC_DUPLICATE_POLICY")
            .map(|value| DuplicatePolicy::from_str(&value))
            .transpose()?
            .unwrap_or_default();
        let empty_date_policy = optional_trimmed(&lookup, "SYNC_EMPTY_DATE_POLICY")
            .map(|value| EmptyDatePolicy::from_str(&value))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            pacing: Duration::from_millis(pacing_ms),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(backoff_ms)),
            duplicate_policy,
            empty_date_policy,
            cover_field: value_or_default(&lookup, "COVER_FIELD", DEFAULT_COVER_FIELD),
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    optional_trimmed(lookup, name)
        .ok_or_else(|| Error::Config(format!("Missing required environment variable: {name}")))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn parse_or_default<T>(lookup: impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    optional_trimmed(lookup, name).map_or(Ok(default), |value| {
        value
            .parse::<T>()
            .map_err(|error| Error::Config(format!("{name} has invalid value '{value}': {error}")))
    })
}

fn parse_bool_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool> {
    match optional_trimmed(lookup, name) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!(
                "{name} must be a boolean, got '{value}'"
            ))),
        },
    }
}
