use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dom_replay::api::{routes::create_router, state::AppState};
use dom_replay::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG from .env applies
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(
        "Recordings are written to {}",
        config.recorder.output_dir.display()
    );

    // Create application state
    let state = Arc::new(AppState::new(config));

    // Build router
    let app = create_router(state);

    // Start server
    tracing::info!("dom-replay starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
