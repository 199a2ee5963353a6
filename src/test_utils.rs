//! Test utilities and helpers for unit and router testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown and seeding
//! - Mock provider configs and data factories
//! - A one-shot request helper for the router

use crate::db::AppState;
use crate::garmin::{GarminActivitySummary, GarminConfig};
use crate::oauth_state::OAuthStateStore;
use crate::rules::DailySummary;
use crate::telegram::TelegramConfig;
use crate::whoop::WhoopConfig;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceExt;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Seed one day of Whoop readings. RHR is fixed at 50.
pub async fn seed_test_recovery(
  pool: &SqlitePool,
  date: NaiveDate,
  hrv_ms: Option<f64>,
  sleep_min: Option<i64>,
) {
  sqlx::query(
    r#"
    INSERT INTO daily_recovery (date, hrv_ms, rhr_bpm, sleep_min)
    VALUES (?1, ?2, 50.0, ?3)
    ON CONFLICT(date) DO UPDATE SET
      hrv_ms = excluded.hrv_ms,
      sleep_min = excluded.sleep_min
    "#,
  )
  .bind(date)
  .bind(hrv_ms)
  .bind(sleep_min)
  .execute(pool)
  .await
  .expect("Failed to seed recovery");
}

/// Store Whoop tokens as if OAuth had completed
pub async fn seed_test_tokens(
  pool: &SqlitePool,
  access_token: &str,
  refresh_token: &str,
  expires_at: DateTime<Utc>,
) {
  sqlx::query(
    r#"
    INSERT INTO provider_tokens (provider, access_token, refresh_token, expires_at)
    VALUES ('whoop', ?1, ?2, ?3)
    "#,
  )
  .bind(access_token)
  .bind(refresh_token)
  .bind(expires_at)
  .execute(pool)
  .await
  .expect("Failed to seed tokens");
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A summary with no readings, dated 2024-03-10
pub fn mock_daily_summary(time_min: i64) -> DailySummary {
  DailySummary {
    date: NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date"),
    hrv_ms: None,
    rhr_bpm: None,
    sleep_min: None,
    temp_delta: None,
    load_7d: None,
    avg7_hrv_ms: None,
    avg7_rhr_bpm: None,
    cycle_phase: None,
    context: Vec::new(),
    time_min,
  }
}

pub fn mock_whoop_config(api_base: &str) -> WhoopConfig {
  WhoopConfig {
    client_id: "test-client".to_string(),
    client_secret: SecretString::from("test-secret"),
    redirect_uri: "http://localhost:8000/auth/whoop/callback".to_string(),
    api_base: api_base.trim_end_matches('/').to_string(),
  }
}

pub fn mock_garmin_config(api_base: &str, display_name: Option<&str>) -> GarminConfig {
  GarminConfig {
    access_token: SecretString::from("garmin-token"),
    display_name: display_name.map(String::from),
    api_base: api_base.trim_end_matches('/').to_string(),
  }
}

pub fn mock_telegram_config(api_base: &str) -> TelegramConfig {
  TelegramConfig {
    bot_token: SecretString::from("123:abc"),
    chat_id: "42".to_string(),
    api_base: api_base.trim_end_matches('/').to_string(),
  }
}

pub fn mock_garmin_activity(
  activity_id: &str,
  start_time: NaiveDateTime,
  training_load: Option<f64>,
) -> GarminActivitySummary {
  GarminActivitySummary {
    activity_id: activity_id.to_string(),
    start_time,
    sport: Some("running".to_string()),
    duration_s: Some(1800.0),
    distance_m: Some(5000.0),
    avg_hr: Some(145.0),
    max_hr: Some(172.0),
    training_load,
    vo2max: None,
    summary_json: json!({ "activityId": activity_id }),
  }
}

pub fn mock_app_state(
  db: SqlitePool,
  whoop: Option<WhoopConfig>,
  garmin: Option<GarminConfig>,
  telegram: Option<TelegramConfig>,
) -> Arc<AppState> {
  Arc::new(AppState {
    db,
    whoop,
    garmin,
    telegram,
    oauth_states: OAuthStateStore::default(),
  })
}

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

/// Local wall-clock time N days ago, as stored for Garmin activities
pub fn datetime_days_ago(days: i64) -> NaiveDateTime {
  Local::now().naive_local() - Duration::days(days)
}

/// ---------------------------------------------------------------------------
/// Router Helpers
/// ---------------------------------------------------------------------------

/// Run one request through the router and return the raw response
pub async fn send_raw(app: Router, method: &str, uri: &str, body: Option<&str>) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if body.is_some() {
    builder = builder.header("content-type", "application/json");
  }
  let request = builder
    .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
    .expect("Failed to build request");

  app.oneshot(request).await.expect("Router failed")
}

/// Run one request and decode the body as JSON (Null if empty or not JSON)
pub async fn send(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
  let response = send_raw(app, method, uri, body).await;
  let status = response.status();
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .expect("Failed to read body");
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('provider_tokens', 'daily_recovery', 'garmin_activities', 'garmin_sleep')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 4, "Expected 4 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_recovery_upserts() {
    let pool = setup_test_db().await;
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

    seed_test_recovery(&pool, date, Some(50.0), Some(400)).await;
    seed_test_recovery(&pool, date, Some(55.0), Some(410)).await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_recovery")
      .fetch_one(&pool)
      .await
      .expect("Failed to count rows");
    assert_eq!(count, 1);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_configs_trim_base() {
    let whoop = mock_whoop_config("http://127.0.0.1:1234/");
    assert_eq!(whoop.api_base, "http://127.0.0.1:1234");

    let telegram = mock_telegram_config("http://127.0.0.1:1234");
    assert_eq!(telegram.chat_id, "42");
  }

  #[test]
  fn test_datetime_days_ago() {
    let diff = Local::now().naive_local() - datetime_days_ago(7);
    // Allow for slight timing differences
    assert!(diff.num_days() >= 6 && diff.num_days() <= 7,
            "Expected ~7 days difference, got {}", diff.num_days());
  }
}
