//! Localization cache.
//!
//! Holds, per configured project, the languages discovered on the backend and
//! the latest `language -> term -> translation` snapshot, and keeps both fresh
//! on a recurring interval.
//!
//! # Architecture
//!
//! - `cache`: the [`LocalizationCache`] itself (construction, refresh, reads)
//! - `normalize`: pure registry building and term normalization
//! - `metrics`: refresh counters reported by the health endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use rookery::localizations::LocalizationCache;
//!
//! let cache = Arc::new(LocalizationCache::new("token", vec!["qwerty".into()], None)?);
//! let refresh = cache.initialize().await?;
//!
//! let everything = cache.read(Some("qwerty"), None);
//! let english = cache.read_by_language(Some("qwerty"), Some("en-us"));
//! ```

mod cache;
mod metrics;
mod normalize;

use indexmap::IndexMap;
use std::collections::BTreeMap;

pub use cache::{LocalizationCache, ProjectState, ProjectStatus, DEFAULT_KEEP_ALIVE};
pub use metrics::{MetricsReport, RefreshMetrics};
pub use normalize::{build_registry, language_codes, normalize};

/// `term -> translated content` for one language.
pub type TermMap = BTreeMap<String, String>;

/// `language -> terms`, in backend language order.
pub type LanguageMap = IndexMap<String, TermMap>;

/// `project id -> language codes`, in backend order.
pub type Registry = IndexMap<String, Vec<String>>;
