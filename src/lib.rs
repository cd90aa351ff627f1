//! Rookery: a periodically refreshed POEditor localization cache with a
//! configurable HTTP query endpoint.

pub mod app;
pub mod config;
pub mod error;
pub mod localizations;
pub mod poeditor;
pub mod resolver;
pub mod scheduler;
pub mod server;

pub use app::Rookery;
pub use error::{BackendError, CacheError, ConfigError, QueryDecodeError};
pub use localizations::LocalizationCache;
pub use resolver::{QueryResolver, RequestType, ResolverConfig};
