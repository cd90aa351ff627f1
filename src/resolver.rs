//! Maps inbound query payloads onto cache reads.
//!
//! A payload is either a single query object or a list of them wrapped under
//! the data field:
//!
//! ```text
//! { "projectId": "qwerty", "languages": ["en-us"] }      -> { "en-us": {...} }
//! { "data": [ { "projectId": "qwerty" }, ... ] }          -> { "qwerty": { "en-us": {...}, ... }, ... }
//! ```
//!
//! Field names are configurable through [`ResolverConfig`]. Bad input never
//! surfaces as an error at the HTTP boundary: it resolves to `{}`.

use crate::error::QueryDecodeError;
use crate::localizations::{LanguageMap, LocalizationCache};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestType {
    /// JSON payload encoded in the query string under the data field
    #[default]
    Get,
    /// JSON request body
    Post,
}

impl RequestType {
    /// `POST` (any case) selects POST; everything else falls back to GET.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("post") {
            RequestType::Post
        } else {
            RequestType::Get
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub endpoint: String,
    pub request_type: RequestType,
    pub project_id_key: String,
    pub languages_key: String,
    pub data_key: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: "/localizations".to_string(),
            request_type: RequestType::Get,
            project_id_key: "projectId".to_string(),
            languages_key: "languages".to_string(),
            data_key: "data".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Ensure the endpoint is an absolute route path.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.endpoint.trim();
        self.endpoint = if trimmed.is_empty() {
            ResolverConfig::default().endpoint
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueryResolver {
    cache: Arc<LocalizationCache>,
    config: ResolverConfig,
}

impl QueryResolver {
    pub fn new(cache: Arc<LocalizationCache>, config: ResolverConfig) -> Self {
        Self {
            cache,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<LocalizationCache> {
        &self.cache
    }

    /// Localizations for one query, not nested under the project id.
    pub fn resolve_one(&self, query: &Value) -> Result<Value, QueryDecodeError> {
        let project_id = query.get(&self.config.project_id_key).and_then(Value::as_str);
        let languages = self.decode_languages(query)?;

        Ok(to_document(self.cache.read(project_id, languages.as_deref())))
    }

    /// Localizations for several queries, keyed by project id.
    pub fn resolve_many(&self, queries: &[Value]) -> Result<Value, QueryDecodeError> {
        let mut documents = Map::with_capacity(queries.len());
        for query in queries {
            let project_id = query
                .get(&self.config.project_id_key)
                .and_then(Value::as_str)
                .ok_or_else(|| QueryDecodeError::MissingProjectId(self.config.project_id_key.clone()))?;

            documents.insert(project_id.to_string(), self.resolve_one(query)?);
        }
        Ok(Value::Object(documents))
    }

    /// Dispatch on payload shape: a list is a batch, anything else a single query.
    pub fn resolve(&self, payload: &Value) -> Result<Value, QueryDecodeError> {
        match payload {
            Value::Array(queries) => self.resolve_many(queries),
            query => self.resolve_one(query),
        }
    }

    /// GET boundary: the payload is JSON text under the data parameter.
    pub fn resolve_query_string(&self, params: &HashMap<String, String>) -> Value {
        let outcome = params
            .get(&self.config.data_key)
            .ok_or_else(|| QueryDecodeError::MissingData(self.config.data_key.clone()))
            .and_then(|raw| Ok(serde_json::from_str::<Value>(raw)?))
            .and_then(|payload| self.resolve(&payload));

        recover(outcome)
    }

    /// POST boundary: the payload is the data field of the body, or the body itself.
    pub fn resolve_body(&self, body: &[u8]) -> Value {
        let outcome = serde_json::from_slice::<Value>(body)
            .map_err(QueryDecodeError::from)
            .and_then(|body| match body.get(&self.config.data_key) {
                Some(payload) => self.resolve(payload),
                None => self.resolve(&body),
            });

        recover(outcome)
    }

    fn decode_languages(&self, query: &Value) -> Result<Option<Vec<String>>, QueryDecodeError> {
        let Some(Value::Array(values)) = query.get(&self.config.languages_key) else {
            return Ok(None);
        };

        values
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| QueryDecodeError::InvalidLanguages(self.config.languages_key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn recover(outcome: Result<Value, QueryDecodeError>) -> Value {
    outcome.unwrap_or_else(|e| {
        warn!("Could not resolve localization query: {}", e);
        Value::Object(Map::new())
    })
}

fn to_document(localizations: LanguageMap) -> Value {
    Value::Object(
        localizations
            .into_iter()
            .map(|(language, terms)| {
                let terms = terms
                    .into_iter()
                    .map(|(term, content)| (term, Value::String(content)))
                    .collect();
                (language, Value::Object(terms))
            })
            .collect(),
    )
}
