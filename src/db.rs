use crate::config::AppConfig;
use crate::garmin::GarminConfig;
use crate::oauth_state::OAuthStateStore;
use crate::telegram::TelegramConfig;
use crate::whoop::WhoopConfig;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub type DbPool = SqlitePool;

/// Application state shared by every request handler
pub struct AppState {
  pub db: DbPool,
  pub whoop: Option<WhoopConfig>,
  pub garmin: Option<GarminConfig>,
  pub telegram: Option<TelegramConfig>,
  pub oauth_states: OAuthStateStore,
}

impl AppState {
  pub fn new(db: DbPool, config: &AppConfig) -> Self {
    Self {
      db,
      whoop: config.whoop.clone(),
      garmin: config.garmin.clone(),
      telegram: config.telegram.clone(),
      oauth_states: OAuthStateStore::default(),
    }
  }
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db(database_url: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
  tracing::info!("Initializing database at: {}", database_url);

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(database_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");

  Ok(pool)
}
