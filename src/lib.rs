mod commands;
mod config;
mod db;
mod error;
mod garmin;
mod models;
mod oauth_state;
mod rules;
mod summary;
mod telegram;
mod whoop;

#[cfg(test)]
mod test_utils;

use axum::routing::{get, post};
use axum::Router;
use config::AppConfig;
use db::AppState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Every HTTP route the service exposes
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(commands::health))
    // Whoop
    .route("/auth/whoop/start", get(commands::whoop::whoop_start))
    .route("/auth/whoop/callback", get(commands::whoop::whoop_callback))
    .route("/whoop/sync", post(commands::whoop::whoop_sync))
    // Garmin
    .route("/garmin/sync", post(commands::garmin::garmin_sync))
    // Plan and chat
    .route("/api/trigger", post(commands::plan::trigger_plan))
    .route("/telegram/webhook", post(commands::telegram::telegram_webhook))
    // Stored data
    .route("/api/recovery", get(commands::get_recent_recovery))
    .route("/api/activities", get(commands::get_recent_activities))
    .with_state(state)
}

fn init_tracing(log_level: &str) {
  let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .compact()
    .init();
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  let config = AppConfig::from_env();
  init_tracing(&config.server.log_level);
  config.log_enabled_providers();

  let pool = db::initialize_db(&config.server.database_url).await?;
  let state = Arc::new(AppState::new(pool, &config));
  let app = build_router(state);

  let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
  tracing::info!(addr = %config.server.bind_addr, "starting HTTP server");

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
      }
    })
    .await?;

  tracing::info!("server stopped");
  Ok(())
}
