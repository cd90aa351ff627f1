use crate::error::ConfigError;
use crate::poeditor::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::resolver::{RequestType, ResolverConfig};
use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    // POEditor
    pub api_token: String,
    pub project_ids: Vec<String>,
    pub api_url: String,
    pub request_timeout: Duration,

    // Cache
    /// `None` means the cache default applies
    pub keep_alive: Option<Duration>,

    // Server
    pub port: u16,
    pub resolver: ResolverConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (environment, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ResolverConfig::default();

        Ok(Self {
            api_token: lookup("POEDITOR_API_TOKEN").context("POEDITOR_API_TOKEN not set")?,
            project_ids: parse_project_ids(
                &lookup("POEDITOR_PROJECT_IDS").context("POEDITOR_PROJECT_IDS not set")?,
            ),
            api_url: lookup("POEDITOR_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            request_timeout: match lookup("POEDITOR_TIMEOUT_SECS") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| {
                        format!("POEDITOR_TIMEOUT_SECS must be a number of seconds, got '{}'", raw)
                    })?,
                None => DEFAULT_REQUEST_TIMEOUT,
            },

            keep_alive: match lookup("KEEP_ALIVE_MS") {
                Some(raw) => parse_keep_alive(&raw)?,
                None => None,
            },

            port: match lookup("PORT") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
                None => DEFAULT_PORT,
            },
            resolver: ResolverConfig {
                endpoint: lookup("LOCALIZATIONS_ENDPOINT").unwrap_or(defaults.endpoint),
                request_type: lookup("LOCALIZATIONS_REQUEST_TYPE")
                    .map(|raw| RequestType::parse(&raw))
                    .unwrap_or(defaults.request_type),
                project_id_key: lookup("PROJECT_ID_KEY").unwrap_or(defaults.project_id_key),
                languages_key: lookup("LANGUAGES_KEY").unwrap_or(defaults.languages_key),
                data_key: lookup("DATA_KEY").unwrap_or(defaults.data_key),
            }
            .normalized(),
        })
    }
}

/// Split a comma separated id list, dropping blanks.
pub fn parse_project_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a keep-alive interval in milliseconds. Blank or `0` means "use the default".
pub fn parse_keep_alive(raw: &str) -> Result<Option<Duration>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let millis: u64 = raw
        .parse()
        .map_err(|_| ConfigError::MalformedKeepAlive(raw.to_string()))?;

    Ok(Some(Duration::from_millis(millis)).filter(|interval| !interval.is_zero()))
}
