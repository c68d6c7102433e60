mod config;
mod fetcher;
mod ingest;
mod routes;
mod selector;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::ingest::{start_background_ingest, Ingester};
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clay_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("site.toml")?;
    info!("Loaded {} towns from configuration", config.towns.len());

    // Create the ingester and keep the feed fresh in the background
    let ingester = Arc::new(Ingester::new(&config));
    let bg_ingester = ingester.clone();
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        start_background_ingest(bg_ingester, refresh_interval).await;
    });

    // Create app state
    let fetcher = Fetcher::new(&config.feed_url);
    let data_dir = std::path::Path::new(&config.data_file)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| "data".into());
    let state = Arc::new(AppState {
        fetcher,
        selector: config.selector(),
        ingester,
        config,
    });

    // Build router
    let app = Router::new()
        .route("/town/:slug", get(routes::town))
        .route("/local-news", get(routes::hub))
        .route("/refresh", post(routes::refresh))
        .route("/health", get(routes::health))
        .nest_service("/data", ServeDir::new(data_dir))
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
