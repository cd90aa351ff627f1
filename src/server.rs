//! HTTP shell around the [`QueryResolver`].

use crate::resolver::{QueryResolver, RequestType};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
struct AppState {
    resolver: QueryResolver,
}

/// Build the router: the localization endpoint on the configured verb and path,
/// plus a health endpoint.
pub fn router(resolver: QueryResolver) -> Router {
    let config = resolver.config().clone();

    let localizations = match config.request_type {
        RequestType::Get => get(localizations_get),
        RequestType::Post => post(localizations_post),
    };

    let mut router = Router::new().route(&config.endpoint, localizations);
    if config.endpoint != HEALTH_PATH {
        router = router.route(HEALTH_PATH, get(health));
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { resolver })
}

async fn localizations_get(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(state.resolver.resolve_query_string(&params))
}

async fn localizations_post(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    Json(state.resolver.resolve_body(&body))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let cache = state.resolver.cache();
    Json(json!({
        "status": "ok",
        "projects": cache.status(),
        "refresh": cache.metrics().report(),
    }))
}

/// A running server. Stopping it is explicit; there is no process-wide handle.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Gracefully stop accepting connections and wait for the server to exit.
    pub async fn stop(self) -> Result<()> {
        info!("Server shutting down on {}", self.local_addr);

        // The receiver is gone only if the server already exited
        let _ = self.shutdown.send(());

        self.task
            .await
            .context("Server task panicked")?
            .context("Server exited with an error")
    }
}

/// Bind `addr` and serve `resolver` in the background.
pub async fn start(resolver: QueryResolver, addr: SocketAddr) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local_addr = listener.local_addr().context("Failed to read bound address")?;

    let config = resolver.config();
    info!(
        "Serving localizations on {:?} {} at {}",
        config.request_type, config.endpoint, local_addr
    );

    let app = router(resolver);
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    info!("✓ Server is running on port {}", local_addr.port());

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}
