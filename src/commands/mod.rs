pub mod garmin;
pub mod plan;
pub mod telegram;
pub mod whoop;

use crate::db::AppState;
use crate::error::AppError;
use crate::models::{DailyRecovery, GarminActivity};
use axum::extract::State;
use axum::Json;
use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use std::sync::Arc;

/// The service's notion of "today" (local calendar date)
pub fn today() -> NaiveDate {
  Local::now().date_naive()
}

pub async fn health() -> Json<Value> {
  Json(json!({ "status": "ok" }))
}

pub async fn get_recent_recovery(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DailyRecovery>>, AppError> {
  let rows = sqlx::query_as::<_, DailyRecovery>(
    "SELECT * FROM daily_recovery ORDER BY date DESC LIMIT 14",
  )
  .fetch_all(&state.db)
  .await?;

  Ok(Json(rows))
}

pub async fn get_recent_activities(
  State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GarminActivity>>, AppError> {
  let rows = sqlx::query_as::<_, GarminActivity>(
    "SELECT * FROM garmin_activities ORDER BY start_time DESC LIMIT 50",
  )
  .fetch_all(&state.db)
  .await?;

  Ok(Json(rows))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::test_utils::*;
  use axum::http::StatusCode;

  #[tokio::test]
  async fn test_health() {
    let pool = setup_test_db().await;
    let app = crate::build_router(mock_app_state(pool.clone(), None, None, None));

    let (status, body) = send(app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_recent_recovery_lists_newest_first() {
    let pool = setup_test_db().await;
    let first = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    seed_test_recovery(&pool, first, Some(50.0), Some(400)).await;
    seed_test_recovery(&pool, first.succ_opt().unwrap(), Some(52.0), Some(410)).await;
    let app = crate::build_router(mock_app_state(pool.clone(), None, None, None));

    let (status, body) = send(app, "GET", "/api/recovery", None).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["date"], "2024-03-02");
    assert_eq!(rows[0]["hrv_ms"], 52.0);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_recent_activities_empty() {
    let pool = setup_test_db().await;
    let app = crate::build_router(mock_app_state(pool.clone(), None, None, None));

    let (status, body) = send(app, "GET", "/api/activities", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    teardown_test_db(pool).await;
  }
}
