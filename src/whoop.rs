//! Whoop integration for recovery and sleep data
//!
//! This module handles Whoop OAuth and the raw API calls. Persistence and the
//! HTTP endpoints live in `commands/whoop.rs`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration as StdDuration;
use url::Url;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const WHOOP_DEFAULT_API_BASE: &str = "https://api.prod.whoop.com";
const AUTH_PATH: &str = "/oauth/oauth2/auth";
const TOKEN_PATH: &str = "/oauth/oauth2/token";
const RECOVERY_PATH: &str = "/developer/v2/recovery";
const SLEEP_PATH: &str = "/developer/v2/sleep";
const WHOOP_SCOPES: &str = "offline read:recovery read:sleep read:workout";
const TOKEN_REFRESH_BUFFER_SECONDS: i64 = 60;
const TOKEN_TIMEOUT_SECS: u64 = 15;
const API_TIMEOUT_SECS: u64 = 30;
/// How far back the range query looks when no sleep is found otherwise
const SLEEP_LOOKBACK_DAYS: i64 = 3;

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WhoopConfig {
  pub client_id: String,
  pub client_secret: SecretString,
  pub redirect_uri: String,
  pub api_base: String,
}

impl WhoopConfig {
  pub fn from_env_with<F>(mut get: F) -> Result<Self, WhoopError>
  where
    F: FnMut(&str) -> Option<String>,
  {
    Ok(Self {
      client_id: get("WHOOP_CLIENT_ID")
        .ok_or_else(|| WhoopError::MissingConfig("WHOOP_CLIENT_ID".into()))?,
      client_secret: get("WHOOP_CLIENT_SECRET")
        .map(SecretString::from)
        .ok_or_else(|| WhoopError::MissingConfig("WHOOP_CLIENT_SECRET".into()))?,
      redirect_uri: get("WHOOP_REDIRECT_URI")
        .ok_or_else(|| WhoopError::MissingConfig("WHOOP_REDIRECT_URI".into()))?,
      api_base: get("WHOOP_API_BASE")
        .unwrap_or_else(|| WHOOP_DEFAULT_API_BASE.into())
        .trim_end_matches('/')
        .to_string(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.api_base, path)
  }
}

/// Response from Whoop token endpoint
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  /// Omitted on some refresh responses
  pub refresh_token: Option<String>,
  pub expires_in: i64, // seconds
  pub token_type: Option<String>,
}

/// Stored token state
#[derive(Debug, Clone, PartialEq)]
pub struct WhoopTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl WhoopTokens {
  /// Build tokens from a token response, keeping `previous_refresh` when the
  /// response does not rotate the refresh token.
  pub fn from_response(
    resp: TokenResponse,
    previous_refresh: Option<&str>,
  ) -> Result<Self, WhoopError> {
    let refresh_token = resp
      .refresh_token
      .or_else(|| previous_refresh.map(String::from))
      .ok_or_else(|| WhoopError::OAuth("Token response missing refresh_token".into()))?;

    Ok(Self {
      access_token: resp.access_token,
      refresh_token,
      expires_at: Utc::now() + Duration::seconds(resp.expires_in),
    })
  }

  pub fn needs_refresh(&self) -> bool {
    let buffer = Duration::seconds(TOKEN_REFRESH_BUFFER_SECONDS);
    Utc::now() + buffer >= self.expires_at
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WhoopError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Database error: {0}")]
  Database(String),

  #[error("Whoop not connected")]
  NotAuthenticated,
}

impl From<sqlx::Error> for WhoopError {
  fn from(e: sqlx::Error) -> Self {
    WhoopError::Database(e.to_string())
  }
}

fn http_client(timeout_secs: u64) -> Result<Client, WhoopError> {
  Ok(
    Client::builder()
      .timeout(StdDuration::from_secs(timeout_secs))
      .build()?,
  )
}

/// ---------------------------------------------------------------------------
/// OAuth URL Generation
/// ---------------------------------------------------------------------------

pub fn build_auth_url(config: &WhoopConfig, state: &str) -> Result<String, WhoopError> {
  let mut url = Url::parse(&config.url(AUTH_PATH)).map_err(|e| WhoopError::OAuth(e.to_string()))?;

  url
    .query_pairs_mut()
    .append_pair("client_id", &config.client_id)
    .append_pair("redirect_uri", &config.redirect_uri)
    .append_pair("response_type", "code")
    .append_pair("scope", WHOOP_SCOPES)
    .append_pair("state", state);

  Ok(url.to_string())
}

/// ---------------------------------------------------------------------------
/// Token Exchange and Refresh
/// ---------------------------------------------------------------------------

async fn request_tokens(
  config: &WhoopConfig,
  form: &[(&str, &str)],
  previous_refresh: Option<&str>,
) -> Result<WhoopTokens, WhoopError> {
  let response = http_client(TOKEN_TIMEOUT_SECS)?
    .post(config.url(TOKEN_PATH))
    .form(form)
    .send()
    .await?;

  if !response.status().is_success() {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    return Err(WhoopError::OAuth(format!(
      "Token request failed ({}): {}",
      status, error_text
    )));
  }

  let token_response: TokenResponse = response.json().await?;
  WhoopTokens::from_response(token_response, previous_refresh)
}

pub async fn exchange_code_for_tokens(
  config: &WhoopConfig,
  code: &str,
) -> Result<WhoopTokens, WhoopError> {
  request_tokens(
    config,
    &[
      ("grant_type", "authorization_code"),
      ("code", code),
      ("redirect_uri", config.redirect_uri.as_str()),
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.expose_secret()),
    ],
    None,
  )
  .await
}

pub async fn refresh_tokens(
  config: &WhoopConfig,
  refresh_token: &str,
) -> Result<WhoopTokens, WhoopError> {
  request_tokens(
    config,
    &[
      ("grant_type", "refresh_token"),
      ("refresh_token", refresh_token),
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.expose_secret()),
    ],
    Some(refresh_token),
  )
  .await
}

/// ---------------------------------------------------------------------------
/// Whoop API Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RecoveryCollection {
  #[serde(default)]
  records: Vec<RecoveryRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct RecoveryRecord {
  sleep_id: Option<String>,
  created_at: Option<String>,
  score_timestamp: Option<String>,
  score: Option<RecoveryScore>,
}

#[derive(Debug, Default, Deserialize)]
struct RecoveryScore {
  hrv_rmssd_milli: Option<f64>,
  resting_heart_rate: Option<f64>,
  skin_temp_celsius: Option<f64>,
}

/// The fields we keep from the latest recovery record
#[derive(Debug, Clone, PartialEq)]
pub struct RecoverySnapshot {
  pub date: NaiveDate,
  pub hrv_ms: Option<f64>,
  pub rhr_bpm: Option<f64>,
  pub temp_delta: Option<f64>,
  pub sleep_id: Option<String>,
}

/// Pull the first recovery record out of a collection response.
///
/// Anything unexpected degrades to empty readings dated yesterday.
pub fn parse_recovery(raw: &Value, today: NaiveDate) -> RecoverySnapshot {
  let yesterday = today - Duration::days(1);
  let collection: RecoveryCollection = serde_json::from_value(raw.clone()).unwrap_or_default();

  let Some(record) = collection.records.into_iter().next() else {
    return RecoverySnapshot {
      date: yesterday,
      hrv_ms: None,
      rhr_bpm: None,
      temp_delta: None,
      sleep_id: None,
    };
  };

  let date = record
    .created_at
    .as_deref()
    .or(record.score_timestamp.as_deref())
    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
    .map(|ts| ts.date_naive())
    .unwrap_or(yesterday);

  let score = record.score.unwrap_or_default();

  RecoverySnapshot {
    date,
    hrv_ms: score.hrv_rmssd_milli,
    rhr_bpm: score.resting_heart_rate,
    temp_delta: score.skin_temp_celsius,
    sleep_id: record.sleep_id,
  }
}

/// First usable sleep record: the first entry of a collection, or the body
/// itself for a single-record response.
fn first_sleep_record(raw: &Value) -> Option<&Value> {
  match raw.get("records") {
    Some(Value::Array(records)) => records.first(),
    Some(_) => None,
    None => match raw {
      Value::Object(map) if !map.is_empty() => Some(raw),
      _ => None,
    },
  }
}

fn seconds_from(value: Option<&Value>) -> Option<i64> {
  let secs = match value? {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
    Value::String(s) => s.trim().parse::<i64>().ok(),
    _ => None,
  };
  secs.filter(|s| *s != 0)
}

/// Minutes asleep in a sleep record, 0 if no duration is present.
/// Duration fields are seconds.
pub fn extract_sleep_minutes(record: &Value) -> i64 {
  let candidates = [
    record.get("sleep").and_then(|s| s.get("duration")),
    record.get("score").and_then(|s| s.get("total_sleep_duration")),
    record.get("duration"),
  ];

  candidates
    .into_iter()
    .find_map(seconds_from)
    .map(|secs| (secs as f64 / 60.0).round_ties_even() as i64)
    .unwrap_or(0)
}

/// ---------------------------------------------------------------------------
/// Whoop API Data Fetching
/// ---------------------------------------------------------------------------

/// GET a Whoop endpoint. Non-200 responses come back as an empty object so a
/// missing day never fails the sync.
async fn get_json(
  config: &WhoopConfig,
  access_token: &str,
  path: &str,
  query: &[(&str, String)],
) -> Result<Value, WhoopError> {
  let response = http_client(API_TIMEOUT_SECS)?
    .get(config.url(path))
    .bearer_auth(access_token)
    .query(query)
    .send()
    .await?;

  if response.status() != StatusCode::OK {
    tracing::debug!(path, status = %response.status(), "whoop returned no data");
    return Ok(Value::Object(Default::default()));
  }

  Ok(response.json().await?)
}

pub async fn fetch_latest_recovery(
  config: &WhoopConfig,
  access_token: &str,
) -> Result<Value, WhoopError> {
  get_json(
    config,
    access_token,
    RECOVERY_PATH,
    &[("limit", "1".into()), ("order", "desc".into())],
  )
  .await
}

pub async fn fetch_sleep_by_id(
  config: &WhoopConfig,
  access_token: &str,
  sleep_id: &str,
) -> Result<Value, WhoopError> {
  let path = format!("{}/{}", SLEEP_PATH, sleep_id);
  get_json(config, access_token, &path, &[]).await
}

pub async fn fetch_latest_sleep(
  config: &WhoopConfig,
  access_token: &str,
) -> Result<Value, WhoopError> {
  get_json(
    config,
    access_token,
    SLEEP_PATH,
    &[("limit", "1".into()), ("order", "desc".into())],
  )
  .await
}

pub async fn fetch_sleep_between(
  config: &WhoopConfig,
  access_token: &str,
  start: NaiveDate,
  end: NaiveDate,
) -> Result<Value, WhoopError> {
  let start = format!("{}T00:00:00Z", start);
  let end = format!("{}T00:00:00Z", end);
  get_json(
    config,
    access_token,
    SLEEP_PATH,
    &[("start", start), ("end", end)],
  )
  .await
}

/// Sleep found for the latest recovery, with the raw payload it came from.
#[derive(Debug, Clone)]
pub struct SleepLookup {
  pub sleep_min: i64,
  pub raw: Value,
}

/// Try the recovery's own sleep first, then the latest sleep, then anything
/// in the last few days.
pub async fn resolve_sleep(
  config: &WhoopConfig,
  access_token: &str,
  sleep_id: Option<&str>,
  today: NaiveDate,
) -> Result<SleepLookup, WhoopError> {
  let mut raw = Value::Object(Default::default());

  if let Some(id) = sleep_id {
    raw = fetch_sleep_by_id(config, access_token, id).await?;
  }

  if first_sleep_record(&raw).is_none() {
    raw = fetch_latest_sleep(config, access_token).await?;
  }

  if first_sleep_record(&raw).is_none() {
    let start = today - Duration::days(SLEEP_LOOKBACK_DAYS);
    let end = today + Duration::days(1);
    raw = fetch_sleep_between(config, access_token, start, end).await?;
  }

  let sleep_min = first_sleep_record(&raw).map(extract_sleep_minutes).unwrap_or(0);

  Ok(SleepLookup { sleep_min, raw })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
