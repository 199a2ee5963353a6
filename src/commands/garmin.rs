use crate::commands::today;
use crate::db::AppState;
use crate::error::AppError;
use crate::garmin::{
  fetch_daily_sleep, fetch_recent_activities, parse_activity, GarminConfig, GarminError,
  RECENT_ACTIVITY_LIMIT,
};
use crate::models::garmin::{insert_activity_if_new, save_garmin_sleep};
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct GarminSyncResult {
  pub status: &'static str,
  pub new_activities: usize,
  pub total_fetched: usize,
}

fn garmin_config(state: &AppState) -> Result<&GarminConfig, GarminError> {
  state
    .garmin
    .as_ref()
    .ok_or_else(|| GarminError::MissingConfig("GARMIN_ACCESS_TOKEN".into()))
}

/// ---------------------------------------------------------------------------
/// Sync Activities and Sleep
/// ---------------------------------------------------------------------------

/// Store any of the most recent activities we haven't seen, then refresh
/// today's sleep. A sleep failure does not fail the sync.
pub async fn garmin_sync(
  State(state): State<Arc<AppState>>,
) -> Result<Json<GarminSyncResult>, AppError> {
  let config = garmin_config(&state)?;

  let raw_activities = fetch_recent_activities(config, 0, RECENT_ACTIVITY_LIMIT).await?;
  let total_fetched = raw_activities.len();

  let mut new_activities = 0;
  for raw in &raw_activities {
    let Some(activity) = parse_activity(raw) else {
      tracing::warn!(activity_id = ?raw.get("activityId"), "Skipping activity without id or start time");
      continue;
    };

    if insert_activity_if_new(&state.db, &activity).await? {
      new_activities += 1;
    }
  }

  let date = today();
  match fetch_daily_sleep(config, date).await {
    Ok(Some((minutes, raw))) => {
      save_garmin_sleep(&state.db, date, minutes, &raw.to_string()).await?;
      tracing::info!(%date, minutes, "Garmin sleep stored");
    }
    Ok(None) => tracing::debug!(%date, "No Garmin sleep for today"),
    Err(e) => tracing::warn!(error = %e, "Garmin sleep fetch failed"),
  }

  tracing::info!(new_activities, total_fetched, "Garmin sync complete");

  Ok(Json(GarminSyncResult {
    status: "ok",
    new_activities,
    total_fetched,
  }))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
