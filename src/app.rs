//! Wires the cache, its refresh loop and the HTTP server together.

use crate::config::Config;
use crate::localizations::LocalizationCache;
use crate::resolver::QueryResolver;
use crate::scheduler::RefreshTask;
use crate::server::{self, ServerHandle};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// A running localization cache and, once started, its HTTP server.
///
/// Dropping an instance stops the refresh loop and signals the server to shut
/// down; [`Rookery::shutdown`] also waits for the server to exit.
#[derive(Debug)]
pub struct Rookery {
    cache: Arc<LocalizationCache>,
    resolver: QueryResolver,
    bind_addr: SocketAddr,
    refresh: Option<RefreshTask>,
    server: Option<ServerHandle>,
}

impl Rookery {
    /// Build and initialize the cache. Fails if any project's languages
    /// cannot be discovered; the server is not started yet.
    pub async fn init(config: &Config) -> Result<Self> {
        let cache = Arc::new(
            LocalizationCache::with_api_url(
                &config.api_token,
                &config.api_url,
                config.project_ids.clone(),
                config.keep_alive,
            )?
            .with_request_timeout(config.request_timeout),
        );

        let refresh = cache
            .initialize()
            .await
            .context("Failed to initialize localization cache")?;

        let resolver = QueryResolver::new(Arc::clone(&cache), config.resolver.clone());

        Ok(Self {
            cache,
            resolver,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], config.port)),
            refresh: Some(refresh),
            server: None,
        })
    }

    /// Read access to the cached localizations.
    pub fn localizations(&self) -> &LocalizationCache {
        &self.cache
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::local_addr)
    }

    /// Start the HTTP server. Only one server may run per instance; a second
    /// call logs a warning and returns the running server's address.
    pub async fn start_server(&mut self) -> Result<SocketAddr> {
        if let Some(server) = &self.server {
            warn!("start_server() can only be called once per instance");
            return Ok(server.local_addr());
        }

        let handle = server::start(self.resolver.clone(), self.bind_addr).await?;
        let addr = handle.local_addr();
        self.server = Some(handle);
        Ok(addr)
    }

    /// Stop the HTTP server if one is running. It may be started again later.
    pub async fn kill_server(&mut self) -> Result<()> {
        match self.server.take() {
            Some(server) => server.stop().await,
            None => Ok(()),
        }
    }

    /// Stop the server and the refresh loop.
    pub async fn shutdown(mut self) -> Result<()> {
        self.kill_server().await?;
        if let Some(refresh) = self.refresh.take() {
            refresh.stop();
        }
        info!("Rookery stopped");
        Ok(())
    }
}
