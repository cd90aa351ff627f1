use anyhow::Result;
use rookery::{config::Config, Rookery};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rookery=info".parse()?),
        )
        .init();

    info!("Starting localization cache");

    let config = Config::from_env()?;
    info!(
        "Caching {} project(s), refresh interval {}",
        config.project_ids.len(),
        config
            .keep_alive
            .map(|interval| format!("{:?}", interval))
            .unwrap_or_else(|| "default".to_string())
    );

    let mut rookery = Rookery::init(&config).await?;
    rookery.start_server().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    rookery.shutdown().await
}
