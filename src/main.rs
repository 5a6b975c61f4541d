// Web-based leaf disease finder using the Google Gemini API

use std::sync::Arc;

use anyhow::Context;
use leaf_disease_finder::{
    config::AppConfig,
    diagnosis::GeminiClient,
    routes::{router, AppState},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;

    let diagnoser = Arc::new(GeminiClient::new(&config));
    let app = router(AppState::new(diagnoser), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_target())
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;

    tracing::info!("🚀 Server running on http://localhost:{}", config.port);
    tracing::info!("🍃 Open in your browser to diagnose a leaf (model: {})", config.model);

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
