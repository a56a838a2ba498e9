//! Run configuration loaded from environment variables
//!
//! Call `dotenv::dotenv().ok()` before `from_env()` to pick up a local `.env`.
//! Both structs are built once and passed by reference; nothing here is
//! mutated after startup.

use crate::crm::Endpoint;
use crate::report_core::correlator::{CorrelatorSettings, MatchStrategy, SlowBoundary, ThreadSource};
use crate::report_core::model::DealStatus;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.pipedrive.com/v1";
pub const DEFAULT_APP_URL: &str = "https://app.pipedrive.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Immutable connection settings for the CRM read API
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: String,
    pub request_timeout: Duration,
    pub page_limit: u32,
    pub activities_endpoint: Endpoint,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("page_limit", &self.page_limit)
            .field("activities_endpoint", &self.activities_endpoint)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            request_timeout: Duration::from_secs(30),
            page_limit: 500,
            activities_endpoint: Endpoint::Activities,
        }
    }

    /// Environment variables:
    /// - `API_TOKEN` (required)
    /// - `CRM_BASE_URL` (default: https://api.pipedrive.com/v1)
    /// - `REQUEST_TIMEOUT_SECS` (default: 30)
    /// - `PAGE_LIMIT` (default: 500)
    /// - `ACTIVITIES_ENDPOINT` (`activities` or `activities/collection`, default: activities)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup("API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVariable("API_TOKEN".to_string()))?;

        let base_url = lookup("CRM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "CRM_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let page_limit: u32 = parse_or(&lookup, "PAGE_LIMIT", 500)?;

        let activities_endpoint = match lookup("ACTIVITIES_ENDPOINT").as_deref().map(str::trim) {
            None | Some("activities") => Endpoint::Activities,
            Some("activities/collection") => Endpoint::ActivitiesCollection,
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "ACTIVITIES_ENDPOINT must be 'activities' or 'activities/collection', got '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            page_limit: page_limit.max(1),
            activities_endpoint,
        })
    }
}

/// Report-level choices: correlation rules, filters, output location
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub correlator: CorrelatorSettings,
    pub status_filter: Option<DealStatus>,
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            correlator: CorrelatorSettings::default(),
            status_filter: None,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ReportConfig {
    /// Environment variables:
    /// - `MATCH_STRATEGY` (`any-first-message` | `agent-reply`, default: any-first-message)
    /// - `THREAD_SOURCE` (`person` | `deal`, default: person)
    /// - `SLOW_THRESHOLD_HOURS` (default: 12)
    /// - `SLOW_BOUNDARY` (`exclusive` | `inclusive`, default: exclusive)
    /// - `MAX_IN_FLIGHT` (default: 4)
    /// - `DEAL_STATUS_FILTER` (optional: open | won | lost | closed)
    /// - `APP_BASE_URL` (default: https://app.pipedrive.com)
    /// - `REPORT_OUTPUT_DIR` (default: .)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CorrelatorSettings::default();

        let slow_threshold_hours: f64 =
            parse_or(&lookup, "SLOW_THRESHOLD_HOURS", defaults.slow_threshold_hours)?;
        if !slow_threshold_hours.is_finite() || slow_threshold_hours < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "SLOW_THRESHOLD_HOURS must be a non-negative number, got {}",
                slow_threshold_hours
            )));
        }

        let max_in_flight: usize = parse_or(&lookup, "MAX_IN_FLIGHT", defaults.max_in_flight)?;

        let status_filter = match lookup("DEAL_STATUS_FILTER").filter(|s| !s.trim().is_empty()) {
            Some(raw) => Some(raw.parse::<DealStatus>().map_err(ConfigError::InvalidValue)?),
            None => None,
        };

        Ok(Self {
            correlator: CorrelatorSettings {
                strategy: parse_or::<MatchStrategy, _>(&lookup, "MATCH_STRATEGY", defaults.strategy)?,
                thread_source: parse_or::<ThreadSource, _>(
                    &lookup,
                    "THREAD_SOURCE",
                    defaults.thread_source,
                )?,
                slow_threshold_hours,
                slow_boundary: parse_or::<SlowBoundary, _>(
                    &lookup,
                    "SLOW_BOUNDARY",
                    defaults.slow_boundary,
                )?,
                max_in_flight: max_in_flight.max(1),
                app_base_url: lookup("APP_BASE_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.app_base_url),
            },
            status_filter,
            output_dir: lookup("REPORT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

/// Unset means default; set-but-unparseable is an error rather than a silent default
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            ConfigError::InvalidValue(format!("{}='{}': {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}
