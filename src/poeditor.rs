//! Thin client for the two POEditor v2 endpoints the cache needs.
//!
//! Both calls are form-encoded POSTs carrying the api token and project id.
//! The client only transports and decodes; deciding whether a non-success
//! envelope is fatal is left to the caller.

use crate::error::BackendError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.poeditor.com/v2";

/// Upper bound on a single backend call, body included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const LANGUAGES_ENDPOINT: &str = "languages/list";
const TERMS_ENDPOINT: &str = "terms/list";
const SUCCESS: &str = "success";

/// `response` block present on every POEditor reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseStatus {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: ResponseStatus,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.response.status == SUCCESS
    }

    /// Unwrap the `result` block, treating a non-success status or a missing
    /// result as an error for `endpoint`.
    pub fn into_result(self, endpoint: &str) -> Result<T, BackendError> {
        if !self.is_success() {
            return Err(BackendError::Status {
                endpoint: endpoint.to_string(),
                status: self.response.status,
                message: self.response.message,
            });
        }

        self.result.ok_or_else(|| BackendError::Malformed {
            endpoint: endpoint.to_string(),
            reason: "missing result".to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguagesResult {
    #[serde(default)]
    pub languages: Vec<LanguageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TermsResult {
    #[serde(default)]
    pub terms: Vec<TermEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TermEntry {
    pub term: String,
    #[serde(default)]
    pub translation: Option<Translation>,
}

impl TermEntry {
    /// Current translated text; untranslated terms yield an empty string.
    pub fn content(&self) -> String {
        self.translation
            .as_ref()
            .map(Translation::text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Translation {
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Translation {
    fn text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            // Plural terms carry an object of forms
            other => other.to_string(),
        }
    }
}

pub type LanguagesResponse = Envelope<LanguagesResult>;
pub type TermsResponse = Envelope<TermsResult>;

#[derive(Clone)]
pub struct PoEditorClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    timeout: Duration,
}

impl std::fmt::Debug for PoEditorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoEditorClient")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PoEditorClient {
    pub fn new(api_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replace the per-request timeout. A call exceeding it fails as
    /// [`BackendError::Transport`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// List the languages of a project, in backend order.
    pub async fn list_languages(&self, project_id: &str) -> Result<LanguagesResponse, BackendError> {
        self.post_form(
            LANGUAGES_ENDPOINT,
            &[("api_token", self.api_token.as_str()), ("id", project_id)],
        )
        .await
    }

    /// List the terms of a project together with their translation for `language`.
    pub async fn list_terms(
        &self,
        project_id: &str,
        language: &str,
    ) -> Result<TermsResponse, BackendError> {
        self.post_form(
            TERMS_ENDPOINT,
            &[
                ("api_token", self.api_token.as_str()),
                ("id", project_id),
                ("language", language),
            ],
        )
        .await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let transport = |source: reqwest::Error| BackendError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .form(form)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(BackendError::Http {
                endpoint: endpoint.to_string(),
                status,
                body,
            });
        }

        let body = response.text().await.map_err(transport)?;
        serde_json::from_str(&body).map_err(|e| BackendError::Malformed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}
