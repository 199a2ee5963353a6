use crate::commands::today;
use crate::db::{AppState, DbPool};
use crate::error::AppError;
use crate::models::recovery::{upsert_whoop_recovery, NewWhoopRecovery};
use crate::whoop::{
  build_auth_url, exchange_code_for_tokens, fetch_latest_recovery, parse_recovery,
  refresh_tokens, resolve_sleep, WhoopConfig, WhoopError, WhoopTokens,
};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const PROVIDER: &str = "whoop";

fn whoop_config(state: &AppState) -> Result<&WhoopConfig, WhoopError> {
  state
    .whoop
    .as_ref()
    .ok_or_else(|| WhoopError::MissingConfig("WHOOP_CLIENT_ID".into()))
}

/// ---------------------------------------------------------------------------
/// Start OAuth Flow
/// ---------------------------------------------------------------------------

/// Redirects the browser to Whoop's consent page with a fresh `state`.
pub async fn whoop_start(State(state): State<Arc<AppState>>) -> Result<Redirect, AppError> {
  let config = whoop_config(&state)?;
  let oauth_state = state.oauth_states.issue();
  let auth_url = build_auth_url(config, &oauth_state)?;
  Ok(Redirect::temporary(&auth_url))
}

/// ---------------------------------------------------------------------------
/// OAuth Callback
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
  pub code: Option<String>,
  pub state: Option<String>,
  pub error: Option<String>,
  pub error_description: Option<String>,
}

/// Validates `state`, exchanges the code for tokens, and stores them.
pub async fn whoop_callback(
  State(state): State<Arc<AppState>>,
  Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
  if let Some(error) = params.error {
    tracing::warn!(%error, "Whoop authorization denied");
    let body = json!({
      "status": "error",
      "error": error,
      "error_description": params.error_description,
    });
    return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
  }

  let (Some(code), Some(oauth_state)) = (params.code.as_deref(), params.state.as_deref()) else {
    return Err(AppError::Unprocessable("Missing 'code' or 'state' parameter".into()));
  };

  if !state.oauth_states.consume(oauth_state) {
    return Err(AppError::BadRequest("Invalid or expired state".into()));
  }

  let config = whoop_config(&state)?;
  let tokens = exchange_code_for_tokens(config, code).await?;
  save_tokens(&state.db, &tokens).await?;

  tracing::info!("Whoop OAuth completed successfully");
  Ok(Json(json!({ "status": "whoop connected" })).into_response())
}

/// ---------------------------------------------------------------------------
/// Get Valid Access Token (with auto-refresh)
/// ---------------------------------------------------------------------------

pub async fn get_valid_access_token(
  db: &DbPool,
  config: &WhoopConfig,
) -> Result<String, WhoopError> {
  let mut tokens = load_tokens(db).await?.ok_or(WhoopError::NotAuthenticated)?;

  if tokens.needs_refresh() {
    tokens = refresh_tokens(config, &tokens.refresh_token).await?;
    save_tokens(db, &tokens).await?;
    tracing::info!("Whoop tokens auto-refreshed");
  }

  Ok(tokens.access_token)
}

/// ---------------------------------------------------------------------------
/// Database Helpers
/// ---------------------------------------------------------------------------

async fn save_tokens(db: &DbPool, tokens: &WhoopTokens) -> Result<(), WhoopError> {
  sqlx::query(
    r#"
    INSERT INTO provider_tokens (provider, access_token, refresh_token, expires_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(provider) DO UPDATE SET
      access_token = excluded.access_token,
      refresh_token = excluded.refresh_token,
      expires_at = excluded.expires_at,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(PROVIDER)
  .bind(&tokens.access_token)
  .bind(&tokens.refresh_token)
  .bind(tokens.expires_at)
  .execute(db)
  .await?;

  Ok(())
}

async fn load_tokens(db: &DbPool) -> Result<Option<WhoopTokens>, WhoopError> {
  let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
    "SELECT access_token, refresh_token, expires_at FROM provider_tokens WHERE provider = ?1",
  )
  .bind(PROVIDER)
  .fetch_optional(db)
  .await?;

  Ok(row.map(|(access, refresh, expires)| WhoopTokens {
    access_token: access,
    refresh_token: refresh,
    expires_at: expires,
  }))
}

/// ---------------------------------------------------------------------------
/// Sync Recovery and Sleep
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct WhoopSyncResult {
  pub status: &'static str,
  pub date: NaiveDate,
  pub hrv_ms: Option<f64>,
  pub rhr_bpm: Option<f64>,
  pub sleep_min: i64,
}

/// Pull the latest recovery and its sleep, and store them for the
/// recovery's date.
pub async fn whoop_sync(
  State(state): State<Arc<AppState>>,
) -> Result<Json<WhoopSyncResult>, AppError> {
  let config = whoop_config(&state)?;
  let access_token = get_valid_access_token(&state.db, config).await?;
  let today = today();

  let recovery_raw = fetch_latest_recovery(config, &access_token).await?;
  let snapshot = parse_recovery(&recovery_raw, today);

  let sleep = resolve_sleep(config, &access_token, snapshot.sleep_id.as_deref(), today).await?;

  let raw_json = json!({ "recovery": recovery_raw, "sleep": sleep.raw }).to_string();
  upsert_whoop_recovery(
    &state.db,
    &NewWhoopRecovery {
      date: snapshot.date,
      hrv_ms: snapshot.hrv_ms,
      rhr_bpm: snapshot.rhr_bpm,
      sleep_min: Some(sleep.sleep_min),
      temp_delta: snapshot.temp_delta,
      raw_json: Some(raw_json),
    },
  )
  .await?;

  tracing::info!(
    date = %snapshot.date,
    hrv_ms = ?snapshot.hrv_ms,
    sleep_min = sleep.sleep_min,
    "Whoop sync complete"
  );

  Ok(Json(WhoopSyncResult {
    status: "ok",
    date: snapshot.date,
    hrv_ms: snapshot.hrv_ms,
    rhr_bpm: snapshot.rhr_bpm,
    sleep_min: sleep.sleep_min,
  }))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
