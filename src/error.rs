//! Error types shared across the cache, the backend client and the resolver.

use thiserror::Error;

pub const TOKEN_ERROR_MESSAGE: &str = "An api token is required";
pub const PROJECT_IDS_ERROR_MESSAGE: &str = "projectIds parameter is missing or malformed";
pub const KEEP_ALIVE_ERROR_MESSAGE: &str = "keepAlive parameter must be a number";

/// Invalid cache construction parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{}", TOKEN_ERROR_MESSAGE)]
    MissingToken,

    #[error("{}", PROJECT_IDS_ERROR_MESSAGE)]
    MalformedProjectIds,

    #[error("{}: got '{0}'", KEEP_ALIVE_ERROR_MESSAGE)]
    MalformedKeepAlive(String),
}

/// Failure of a single call to the translation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("POEditor API error ({status}) on {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The envelope reported something other than `"success"`.
    #[error("POEditor reported '{status}' on {endpoint}: {message}")]
    Status {
        endpoint: String,
        status: String,
        message: String,
    },

    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl BackendError {
    /// Human readable message, preferring the one the backend sent.
    pub fn message(&self) -> String {
        match self {
            BackendError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// Language discovery failed for a project during initialization.
    #[error("could not discover languages for project {project_id}: {message}")]
    Discovery { project_id: String, message: String },

    /// Term refresh failed for one project. Only ever logged.
    #[error("could not cache localizations for project {project_id}: {source}")]
    Refresh {
        project_id: String,
        #[source]
        source: BackendError,
    },

    #[error("could not normalize localizations for project {project_id}: {reason}")]
    Normalize { project_id: String, reason: String },

    /// `initialize` already ran (or is running) on this cache.
    #[error("localization cache is already initialized")]
    AlreadyInitialized,
}

/// The inbound payload could not be mapped onto cache reads.
#[derive(Debug, Error)]
pub enum QueryDecodeError {
    #[error("missing '{0}' parameter")]
    MissingData(String),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("query is missing a string '{0}' field")]
    MissingProjectId(String),

    #[error("'{0}' must only contain strings")]
    InvalidLanguages(String),
}
