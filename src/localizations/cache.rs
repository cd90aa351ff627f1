use super::normalize::{build_registry, language_codes, normalize};
use super::{LanguageMap, RefreshMetrics, TermMap};
use crate::error::{BackendError, CacheError, ConfigError};
use crate::poeditor::{LanguagesResult, PoEditorClient, TermsResult, DEFAULT_API_URL};
use crate::scheduler::{self, RefreshTask};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Refresh interval used when none (or zero) is configured.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10 * 60);

/// Everything known about one project. Replaced as a whole on every refresh.
#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    pub languages: Vec<String>,
    pub localizations: LanguageMap,
    /// `None` until a term refresh has completed for this project
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl ProjectState {
    fn registered(languages: Vec<String>) -> Self {
        Self {
            languages,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub project_id: String,
    pub languages: Vec<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

pub struct LocalizationCache {
    client: PoEditorClient,
    project_ids: Vec<String>,
    keep_alive: Duration,
    /// One slot per configured project; the key set never changes.
    /// An empty slot means the project is not in the registry yet.
    slots: HashMap<String, ArcSwapOption<ProjectState>>,
    metrics: RefreshMetrics,
    /// Set once `initialize` has started; cleared again if discovery fails
    initialized: AtomicBool,
}

impl std::fmt::Debug for LocalizationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationCache")
            .field("client", &self.client)
            .field("project_ids", &self.project_ids)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

impl LocalizationCache {
    /// Build a cache against the public POEditor API.
    pub fn new(
        token: &str,
        project_ids: Vec<String>,
        keep_alive: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        Self::with_api_url(token, DEFAULT_API_URL, project_ids, keep_alive)
    }

    /// Build a cache against a POEditor-compatible API at `api_url`.
    ///
    /// A missing or zero `keep_alive` falls back to [`DEFAULT_KEEP_ALIVE`].
    pub fn with_api_url(
        token: &str,
        api_url: &str,
        project_ids: Vec<String>,
        keep_alive: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if project_ids.is_empty() || project_ids.iter().any(|id| id.is_empty()) {
            return Err(ConfigError::MalformedProjectIds);
        }

        let unique_ids: Vec<String> = project_ids
            .into_iter()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();

        let slots = unique_ids
            .iter()
            .map(|id| (id.clone(), ArcSwapOption::empty()))
            .collect();

        Ok(Self {
            client: PoEditorClient::new(token, api_url),
            project_ids: unique_ids,
            keep_alive: keep_alive
                .filter(|interval| !interval.is_zero())
                .unwrap_or(DEFAULT_KEEP_ALIVE),
            slots,
            metrics: RefreshMetrics::default(),
            initialized: AtomicBool::new(false),
        })
    }

    /// Bound every backend call by `timeout` instead of
    /// [`DEFAULT_REQUEST_TIMEOUT`](crate::poeditor::DEFAULT_REQUEST_TIMEOUT).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    pub fn project_ids(&self) -> &[String] {
        &self.project_ids
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    pub fn metrics(&self) -> &RefreshMetrics {
        &self.metrics
    }

    /// Discover languages for every project, run the first term refresh and
    /// start the recurring refresh loop.
    ///
    /// Any discovery failure aborts before anything is stored. Term failures
    /// are logged and do not fail initialization. Only one refresh loop may
    /// exist per cache: a second call fails with
    /// [`CacheError::AlreadyInitialized`] unless the first one failed.
    pub async fn initialize(self: &Arc<Self>) -> Result<RefreshTask, CacheError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CacheError::AlreadyInitialized);
        }

        info!(
            "Discovering languages for {} project(s)",
            self.project_ids.len()
        );

        let responses = join_all(self.project_ids.iter().map(|id| self.discover(id))).await;

        let mut discovered = Vec::with_capacity(responses.len());
        for (project_id, response) in self.project_ids.iter().zip(responses) {
            match response {
                Ok(result) => discovered.push(result),
                Err(e) => {
                    self.initialized.store(false, Ordering::Release);
                    return Err(CacheError::Discovery {
                        project_id: project_id.clone(),
                        message: e.message(),
                    })
                }
            }
        }

        for (project_id, languages) in build_registry(&self.project_ids, &discovered) {
            info!("✓ Project {}: {} language(s)", project_id, languages.len());
            self.store(&project_id, ProjectState::registered(languages));
        }

        self.run_cycle(false).await;

        Ok(scheduler::spawn_refresh_loop(Arc::clone(self)))
    }

    /// Re-discover languages and re-fetch terms for every project.
    ///
    /// Failures are per project: they are logged and leave that project's
    /// previous snapshot in place.
    pub async fn refresh_all(&self) {
        self.run_cycle(true).await;
    }

    async fn run_cycle(&self, rediscover: bool) {
        let outcomes = join_all(
            self.project_ids
                .iter()
                .map(|id| self.refresh_project(id, rediscover)),
        )
        .await;

        let mut failed = 0;
        for outcome in outcomes {
            match outcome {
                Ok(()) => self.metrics.record_project_refresh(),
                Err(e) => {
                    failed += 1;
                    self.metrics.record_project_failure();
                    error!("{}", e);
                }
            }
        }
        self.metrics.record_cycle();

        info!(
            "Refresh cycle complete: {} successful, {} failed",
            self.project_ids.len() - failed,
            failed
        );
    }

    async fn refresh_project(&self, project_id: &str, rediscover: bool) -> Result<(), CacheError> {
        let refresh_error = |source: BackendError| CacheError::Refresh {
            project_id: project_id.to_string(),
            source,
        };

        let languages = if rediscover {
            let result = self.discover(project_id).await.map_err(refresh_error)?;
            language_codes(&result)
        } else {
            match self.slot_state(project_id) {
                Some(state) => state.languages.clone(),
                None => {
                    warn!("Project {} is not registered, skipping refresh", project_id);
                    return Ok(());
                }
            }
        };

        let responses = join_all(
            languages
                .iter()
                .map(|language| self.fetch_terms(project_id, language)),
        )
        .await;
        let results = responses
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(refresh_error)?;

        let localizations = normalize(project_id, &languages, &results)?;
        self.store(
            project_id,
            ProjectState {
                languages,
                localizations,
                refreshed_at: Some(Utc::now()),
            },
        );

        Ok(())
    }

    async fn discover(&self, project_id: &str) -> Result<LanguagesResult, BackendError> {
        self.client
            .list_languages(project_id)
            .await?
            .into_result("languages/list")
    }

    async fn fetch_terms(&self, project_id: &str, language: &str) -> Result<TermsResult, BackendError> {
        self.client
            .list_terms(project_id, language)
            .await?
            .into_result("terms/list")
    }

    fn store(&self, project_id: &str, state: ProjectState) {
        if let Some(slot) = self.slots.get(project_id) {
            slot.store(Some(Arc::new(state)));
        }
    }

    fn slot_state(&self, project_id: &str) -> Option<Arc<ProjectState>> {
        self.slots.get(project_id)?.load_full()
    }

    /// Replace one project's registry entry and snapshot.
    ///
    /// The registered languages are the snapshot's languages. Returns `false`
    /// when `project_id` is not one of the configured projects.
    pub fn set_localizations(&self, project_id: &str, localizations: LanguageMap) -> bool {
        if !self.slots.contains_key(project_id) {
            return false;
        }

        self.store(
            project_id,
            ProjectState {
                languages: localizations.keys().cloned().collect(),
                localizations,
                refreshed_at: Some(Utc::now()),
            },
        );
        true
    }

    /// Current registry entry, or `None` for an unknown/unregistered project.
    pub fn languages(&self, project_id: &str) -> Option<Vec<String>> {
        self.slot_state(project_id)
            .map(|state| state.languages.clone())
    }

    /// Localizations of a project, optionally narrowed to `languages`.
    ///
    /// An empty or missing `languages` returns every stored language. Requested
    /// languages are deduplicated and always present in the result, empty when
    /// nothing is stored for them.
    pub fn read(&self, project_id: Option<&str>, languages: Option<&[String]>) -> LanguageMap {
        let Some(state) = self.registered(project_id) else {
            return LanguageMap::new();
        };

        match languages {
            Some(languages) if !languages.is_empty() => {
                let mut selected = LanguageMap::with_capacity(languages.len());
                for language in languages {
                    if selected.contains_key(language) {
                        continue;
                    }
                    let terms = state
                        .localizations
                        .get(language)
                        .cloned()
                        .unwrap_or_default();
                    selected.insert(language.clone(), terms);
                }
                selected
            }
            _ => state.localizations.clone(),
        }
    }

    /// Terms of a single language, empty when anything is unknown.
    pub fn read_by_language(&self, project_id: Option<&str>, language: Option<&str>) -> TermMap {
        let Some(language) = language.filter(|language| !language.is_empty()) else {
            return TermMap::new();
        };

        self.registered(project_id)
            .and_then(|state| state.localizations.get(language).cloned())
            .unwrap_or_default()
    }

    fn registered(&self, project_id: Option<&str>) -> Option<Arc<ProjectState>> {
        let project_id = project_id.filter(|id| !id.is_empty())?;
        self.slot_state(project_id)
    }

    /// Registry and freshness of every configured project, in configuration order.
    pub fn status(&self) -> Vec<ProjectStatus> {
        self.project_ids
            .iter()
            .map(|project_id| {
                let state = self.slot_state(project_id);
                ProjectStatus {
                    project_id: project_id.clone(),
                    languages: state
                        .as_ref()
                        .map(|s| s.languages.clone())
                        .unwrap_or_default(),
                    refreshed_at: state.and_then(|s| s.refreshed_at),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const EN_US: &str = "en-us";
    const SP_MX: &str = "sp-mx";

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn langs(values: &[&str]) -> Vec<String> {
        ids(values)
    }

    fn terms(pairs: &[(&str, &str)]) -> TermMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Cache holding project "qwerty" with one en-us term.
    fn seeded_cache() -> LocalizationCache {
        let cache = LocalizationCache::new("a", ids(&["qwerty", "zxcvbn"]), None)
            .expect("Should construct");

        let mut localizations = LanguageMap::new();
        localizations.insert(EN_US.to_string(), terms(&[("KEY_1", "value 1")]));
        assert!(cache.set_localizations("qwerty", localizations));

        cache
    }

    fn languages_body(codes: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "response": { "status": "success", "code": "200", "message": "OK" },
            "result": {
                "languages": codes.iter().map(|c| serde_json::json!({ "code": c })).collect::<Vec<_>>()
            }
        })
    }

    fn terms_body(pairs: &[(&str, &str)]) -> serde_json::Value {
        serde_json::json!({
            "response": { "status": "success", "code": "200", "message": "OK" },
            "result": {
                "terms": pairs
                    .iter()
                    .map(|(t, c)| serde_json::json!({ "term": t, "translation": { "content": c } }))
                    .collect::<Vec<_>>()
            }
        })
    }

    fn fail_body(message: &str) -> serde_json::Value {
        serde_json::json!({
            "response": { "status": "fail", "code": "4011", "message": message }
        })
    }

    async fn mount_languages(server: &MockServer, project_id: &str, body: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/languages/list"))
            .and(body_string_contains(format!("id={}", project_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_terms(
        server: &MockServer,
        project_id: &str,
        language: &str,
        body: serde_json::Value,
    ) {
        Mock::given(method("POST"))
            .and(path("/terms/list"))
            .and(body_string_contains(format!("id={}", project_id)))
            .and(body_string_contains(format!("language={}", language)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_new_cache_instance() {
        let cache = LocalizationCache::new("1234", ids(&["qwerty"]), Some(Duration::from_secs(1)))
            .expect("Should construct");

        assert_eq!(cache.project_ids(), &ids(&["qwerty"])[..]);
        assert_eq!(cache.keep_alive(), Duration::from_secs(1));
        assert!(cache.read(Some("qwerty"), None).is_empty());
        assert!(cache.languages("qwerty").is_none());
    }

    #[test]
    fn test_keep_alive_defaults_when_missing_or_zero() {
        let missing = LocalizationCache::new("a", ids(&["a"]), None).expect("Should construct");
        assert_eq!(missing.keep_alive(), DEFAULT_KEEP_ALIVE);

        let zero = LocalizationCache::new("a", ids(&["a"]), Some(Duration::ZERO))
            .expect("Should construct");
        assert_eq!(zero.keep_alive(), DEFAULT_KEEP_ALIVE);
    }

    #[test]
    fn test_default_keep_alive_is_ten_minutes() {
        assert_eq!(DEFAULT_KEEP_ALIVE, Duration::from_secs(600));
    }

    #[test]
    fn test_missing_token_rejected() {
        let err = LocalizationCache::new("", ids(&["a"]), None).unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);
    }

    #[test]
    fn test_malformed_project_ids_rejected() {
        assert_eq!(
            LocalizationCache::new("a", vec![], None).unwrap_err(),
            ConfigError::MalformedProjectIds
        );
        assert_eq!(
            LocalizationCache::new("a", ids(&["a", ""]), None).unwrap_err(),
            ConfigError::MalformedProjectIds
        );
    }

    #[test]
    fn test_duplicate_project_ids_collapsed() {
        let cache =
            LocalizationCache::new("a", ids(&["a", "b", "a"]), None).expect("Should construct");
        assert_eq!(cache.project_ids(), &ids(&["a", "b"])[..]);
    }

    // ==================== Read Tests ====================

    #[test]
    fn test_read_full_project() {
        let cache = seeded_cache();

        let result = cache.read(Some("qwerty"), None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[EN_US], terms(&[("KEY_1", "value 1")]));

        let empty_filter: Vec<String> = vec![];
        assert_eq!(cache.read(Some("qwerty"), Some(empty_filter.as_slice())), result);
    }

    #[test]
    fn test_read_selected_languages() {
        let cache = seeded_cache();

        let only_english = langs(&[EN_US]);
        let result = cache.read(Some("qwerty"), Some(only_english.as_slice()));
        assert_eq!(result.len(), 1);
        assert_eq!(result[EN_US], terms(&[("KEY_1", "value 1")]));
    }

    #[test]
    fn test_read_deduplicates_languages() {
        let cache = seeded_cache();

        let repeated = langs(&[EN_US, EN_US, EN_US]);
        let result = cache.read(Some("qwerty"), Some(repeated.as_slice()));
        assert_eq!(result.len(), 1);
        assert!(result.contains_key(EN_US));
    }

    #[test]
    fn test_read_unsupported_language_is_empty() {
        let cache = seeded_cache();

        let unsupported = langs(&[SP_MX]);
        let result = cache.read(Some("qwerty"), Some(unsupported.as_slice()));
        assert_eq!(result.len(), 1);
        assert!(result[SP_MX].is_empty());
    }

    #[test]
    fn test_read_unknown_project() {
        let cache = seeded_cache();
        let english = langs(&[EN_US]);

        assert!(cache.read(Some("zxcvbn"), None).is_empty());
        assert!(cache.read(Some("zxcvbn"), Some(english.as_slice())).is_empty());
        assert!(cache.read(Some("not-configured"), None).is_empty());
        assert!(cache.read(Some(""), None).is_empty());
        assert!(cache.read(None, Some(english.as_slice())).is_empty());
    }

    #[test]
    fn test_read_by_language() {
        let cache = seeded_cache();

        assert_eq!(
            cache.read_by_language(Some("qwerty"), Some(EN_US)),
            terms(&[("KEY_1", "value 1")])
        );
        assert!(cache.read_by_language(Some("qwerty"), None).is_empty());
        assert!(cache.read_by_language(Some("qwerty"), Some("")).is_empty());
        assert!(cache.read_by_language(Some("qwerty"), Some(SP_MX)).is_empty());
        assert!(cache.read_by_language(Some("zxcvbn"), Some(EN_US)).is_empty());
        assert!(cache.read_by_language(None, Some(EN_US)).is_empty());
    }

    #[test]
    fn test_set_localizations_unknown_project() {
        let cache = seeded_cache();
        assert!(!cache.set_localizations("not-configured", LanguageMap::new()));
        assert!(cache.read(Some("not-configured"), None).is_empty());
    }

    #[test]
    fn test_set_localizations_replaces_wholesale() {
        let cache = seeded_cache();

        let mut replacement = LanguageMap::new();
        replacement.insert(SP_MX.to_string(), terms(&[("KEY_2", "valor 2")]));
        assert!(cache.set_localizations("qwerty", replacement));

        let result = cache.read(Some("qwerty"), None);
        assert_eq!(result.len(), 1);
        assert!(!result.contains_key(EN_US));
        assert_eq!(cache.languages("qwerty"), Some(langs(&[SP_MX])));
    }

    #[test]
    fn test_status_reports_every_project() {
        let cache = seeded_cache();
        let status = cache.status();

        assert_eq!(status.len(), 2);
        assert_eq!(status[0].project_id, "qwerty");
        assert!(status[0].refreshed_at.is_some());
        assert_eq!(status[1].project_id, "zxcvbn");
        assert!(status[1].languages.is_empty());
        assert!(status[1].refreshed_at.is_none());
    }

    proptest! {
        #[test]
        fn prop_read_dedup_keeps_first_occurrence_order(
            requested in proptest::collection::vec("[a-c]{1}", 1..12)
        ) {
            let cache = seeded_cache();
            let result = cache.read(Some("qwerty"), Some(requested.as_slice()));

            let mut expected: Vec<String> = Vec::new();
            for language in &requested {
                if !expected.contains(language) {
                    expected.push(language.clone());
                }
            }
            let keys: Vec<String> = result.keys().cloned().collect();
            prop_assert_eq!(keys, expected);
        }
    }

    // ==================== Initialize / Refresh Tests ====================

    #[tokio::test]
    async fn test_initialize_populates_registry_and_snapshot() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US, SP_MX])).await;
        mount_terms(&mock_server, "qwerty", EN_US, terms_body(&[("KEY_1", "hello")])).await;
        mount_terms(&mock_server, "qwerty", SP_MX, terms_body(&[("KEY_1", "hola")])).await;

        let cache = Arc::new(
            LocalizationCache::with_api_url("test-token", &mock_server.uri(), ids(&["qwerty"]), None)
                .expect("Should construct"),
        );
        let refresh = cache.initialize().await.expect("Should initialize");

        assert_eq!(cache.languages("qwerty"), Some(langs(&[EN_US, SP_MX])));
        let result = cache.read(Some("qwerty"), None);
        let keys: Vec<_> = result.keys().cloned().collect();
        assert_eq!(keys, langs(&[EN_US, SP_MX]));
        assert_eq!(result[EN_US]["KEY_1"], "hello");
        assert_eq!(result[SP_MX]["KEY_1"], "hola");
        assert_eq!(cache.metrics().cycles(), 1);

        refresh.stop();
    }

    #[tokio::test]
    async fn test_initialize_discovery_failure_is_fatal() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US])).await;
        mount_languages(&mock_server, "zxcvbn", fail_body("Invalid API Token")).await;
        mount_terms(&mock_server, "qwerty", EN_US, terms_body(&[("KEY_1", "hello")])).await;

        let cache = Arc::new(
            LocalizationCache::with_api_url(
                "test-token",
                &mock_server.uri(),
                ids(&["qwerty", "zxcvbn"]),
                None,
            )
            .expect("Should construct"),
        );

        let err = cache.initialize().await.unwrap_err();
        match err {
            CacheError::Discovery { project_id, message } => {
                assert_eq!(project_id, "zxcvbn");
                assert_eq!(message, "Invalid API Token");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing was stored, not even for the healthy project
        assert!(cache.languages("qwerty").is_none());
        assert!(cache.read(Some("qwerty"), None).is_empty());
    }

    #[tokio::test]
    async fn test_second_initialize_rejected() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US])).await;
        mount_terms(&mock_server, "qwerty", EN_US, terms_body(&[("KEY_1", "hello")])).await;

        let cache = Arc::new(
            LocalizationCache::with_api_url("test-token", &mock_server.uri(), ids(&["qwerty"]), None)
                .expect("Should construct"),
        );
        let refresh = cache.initialize().await.expect("Should initialize");

        let err = cache.initialize().await.unwrap_err();
        assert!(matches!(err, CacheError::AlreadyInitialized));
        assert_eq!(cache.metrics().cycles(), 1);

        refresh.stop();
    }

    #[tokio::test]
    async fn test_initialize_retry_after_discovery_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/languages/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fail_body("Temporarily unavailable")))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US])).await;
        mount_terms(&mock_server, "qwerty", EN_US, terms_body(&[("KEY_1", "hello")])).await;

        let cache = Arc::new(
            LocalizationCache::with_api_url("test-token", &mock_server.uri(), ids(&["qwerty"]), None)
                .expect("Should construct"),
        );

        assert!(matches!(
            cache.initialize().await.unwrap_err(),
            CacheError::Discovery { .. }
        ));

        let refresh = cache.initialize().await.expect("Retry should initialize");
        assert_eq!(cache.read_by_language(Some("qwerty"), Some(EN_US))["KEY_1"], "hello");

        refresh.stop();
    }

    #[tokio::test]
    async fn test_initialize_tolerates_term_failure() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US])).await;
        mount_languages(&mock_server, "zxcvbn", languages_body(&[EN_US])).await;
        mount_terms(&mock_server, "qwerty", EN_US, terms_body(&[("KEY_1", "hello")])).await;
        mount_terms(&mock_server, "zxcvbn", EN_US, fail_body("No access")).await;

        let cache = Arc::new(
            LocalizationCache::with_api_url(
                "test-token",
                &mock_server.uri(),
                ids(&["qwerty", "zxcvbn"]),
                None,
            )
            .expect("Should construct"),
        );
        let refresh = cache.initialize().await.expect("Should initialize");

        assert_eq!(cache.read_by_language(Some("qwerty"), Some(EN_US))["KEY_1"], "hello");

        // Registered but never fetched: full read is empty, filtered read has an empty entry
        assert!(cache.read(Some("zxcvbn"), None).is_empty());
        let english = langs(&[EN_US]);
        let filtered = cache.read(Some("zxcvbn"), Some(english.as_slice()));
        assert!(filtered[EN_US].is_empty());

        assert_eq!(cache.metrics().project_refreshes(), 1);
        assert_eq!(cache.metrics().project_failures(), 1);

        refresh.stop();
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US])).await;
        Mock::given(method("POST"))
            .and(path("/terms/list"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let cache = LocalizationCache::with_api_url(
            "test-token",
            &mock_server.uri(),
            ids(&["qwerty"]),
            None,
        )
        .expect("Should construct");

        let mut previous = LanguageMap::new();
        previous.insert(EN_US.to_string(), terms(&[("KEY_1", "stale")]));
        cache.set_localizations("qwerty", previous.clone());

        cache.refresh_all().await;

        assert_eq!(cache.read(Some("qwerty"), None), previous);
        assert_eq!(cache.metrics().project_failures(), 1);
    }

    #[tokio::test]
    async fn test_hung_backend_call_fails_softly() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[EN_US])).await;
        mount_languages(&mock_server, "zxcvbn", languages_body(&[EN_US])).await;
        Mock::given(method("POST"))
            .and(path("/terms/list"))
            .and(body_string_contains("id=qwerty"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3600)))
            .mount(&mock_server)
            .await;
        mount_terms(&mock_server, "zxcvbn", EN_US, terms_body(&[("KEY_1", "fresh")])).await;

        let cache = LocalizationCache::with_api_url(
            "test-token",
            &mock_server.uri(),
            ids(&["qwerty", "zxcvbn"]),
            None,
        )
        .expect("Should construct")
        .with_request_timeout(Duration::from_millis(200));

        let mut previous = LanguageMap::new();
        previous.insert(EN_US.to_string(), terms(&[("KEY_1", "stale")]));
        cache.set_localizations("qwerty", previous.clone());

        tokio::time::timeout(Duration::from_secs(10), cache.refresh_all())
            .await
            .expect("Refresh cycle should finish despite a hung call");

        assert_eq!(cache.read(Some("qwerty"), None), previous);
        assert_eq!(cache.read_by_language(Some("zxcvbn"), Some(EN_US))["KEY_1"], "fresh");
        assert_eq!(cache.metrics().project_failures(), 1);
        assert_eq!(cache.metrics().project_refreshes(), 1);
        assert_eq!(cache.metrics().cycles(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_languages_wholesale() {
        let mock_server = MockServer::start().await;
        mount_languages(&mock_server, "qwerty", languages_body(&[SP_MX])).await;
        mount_terms(&mock_server, "qwerty", SP_MX, terms_body(&[("KEY_1", "hola")])).await;

        let cache = LocalizationCache::with_api_url(
            "test-token",
            &mock_server.uri(),
            ids(&["qwerty"]),
            None,
        )
        .expect("Should construct");

        let mut previous = LanguageMap::new();
        previous.insert(EN_US.to_string(), terms(&[("KEY_1", "hello")]));
        cache.set_localizations("qwerty", previous);

        cache.refresh_all().await;

        let result = cache.read(Some("qwerty"), None);
        assert!(!result.contains_key(EN_US));
        assert_eq!(result[SP_MX]["KEY_1"], "hola");
        assert_eq!(cache.languages("qwerty"), Some(langs(&[SP_MX])));
    }
}
