//! Garmin Connect integration for activities and sleep
//!
//! Requests are authenticated with a Connect API bearer token obtained
//! outside this service. Activity numbers are parsed leniently because the
//! activity list mixes numbers, numeric strings and nulls.

use chrono::{NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration as StdDuration;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const GARMIN_DEFAULT_API_BASE: &str = "https://connectapi.garmin.com";
const ACTIVITIES_PATH: &str = "/activitylist-service/activities/search/activities";
const DAILY_SLEEP_PATH: &str = "/wellness-service/wellness/dailySleepData";
const API_TIMEOUT_SECS: u64 = 30;
pub const RECENT_ACTIVITY_LIMIT: u32 = 10;

#[derive(Debug, Clone)]
pub struct GarminConfig {
  pub access_token: SecretString,
  /// Needed for the per-user sleep endpoint; sleep sync is skipped without it
  pub display_name: Option<String>,
  pub api_base: String,
}

impl GarminConfig {
  pub fn from_env_with<F>(mut get: F) -> Result<Self, GarminError>
  where
    F: FnMut(&str) -> Option<String>,
  {
    Ok(Self {
      access_token: get("GARMIN_ACCESS_TOKEN")
        .map(SecretString::from)
        .ok_or_else(|| GarminError::MissingConfig("GARMIN_ACCESS_TOKEN".into()))?,
      display_name: get("GARMIN_DISPLAY_NAME"),
      api_base: get("GARMIN_API_BASE")
        .unwrap_or_else(|| GARMIN_DEFAULT_API_BASE.into())
        .trim_end_matches('/')
        .to_string(),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GarminError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Authentication rejected: {0}")]
  Auth(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Database error: {0}")]
  Database(String),
}

impl From<sqlx::Error> for GarminError {
  fn from(e: sqlx::Error) -> Self {
    GarminError::Database(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Activity Parsing
/// ---------------------------------------------------------------------------

/// An activity as we store it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GarminActivitySummary {
  pub activity_id: String,
  pub start_time: NaiveDateTime,
  pub sport: Option<String>,
  pub duration_s: Option<f64>,
  pub distance_m: Option<f64>,
  pub avg_hr: Option<f64>,
  pub max_hr: Option<f64>,
  pub training_load: Option<f64>,
  pub vo2max: Option<f64>,
  pub summary_json: Value,
}

/// Numbers or numeric strings become f64; anything else is None
pub fn lenient_float(value: Option<&Value>) -> Option<f64> {
  match value? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  }
}

fn parse_local_time(raw: &str) -> Option<NaiveDateTime> {
  NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
    .ok()
}

/// Returns None when the id or local start time is missing
pub fn parse_activity(raw: &Value) -> Option<GarminActivitySummary> {
  let activity_id = match raw.get("activityId")? {
    Value::Number(n) => n.to_string(),
    Value::String(s) if !s.is_empty() => s.clone(),
    _ => return None,
  };

  let start_time = raw
    .get("startTimeLocal")
    .and_then(Value::as_str)
    .and_then(parse_local_time)?;

  let sport = raw
    .get("activityType")
    .and_then(|t| t.get("typeKey"))
    .and_then(Value::as_str)
    .map(String::from);

  Some(GarminActivitySummary {
    activity_id,
    start_time,
    sport,
    duration_s: lenient_float(raw.get("duration")),
    distance_m: lenient_float(raw.get("distance")),
    avg_hr: lenient_float(raw.get("averageHR")),
    max_hr: lenient_float(raw.get("maxHR")),
    training_load: lenient_float(raw.get("trainingLoad")),
    vo2max: lenient_float(raw.get("vo2MaxValue")),
    summary_json: raw.clone(),
  })
}

/// Minutes asleep from a daily sleep payload (`dailySleepDTO.sleepTimeSeconds`).
/// Half minutes round to even, same as Whoop sleep.
pub fn parse_sleep_minutes(raw: &Value) -> Option<i64> {
  let secs = lenient_float(raw.get("dailySleepDTO").and_then(|d| d.get("sleepTimeSeconds")))?;
  if secs <= 0.0 {
    return None;
  }
  Some((secs / 60.0).round_ties_even() as i64)
}

/// ---------------------------------------------------------------------------
/// Garmin API Data Fetching
/// ---------------------------------------------------------------------------

fn http_client() -> Result<Client, GarminError> {
  Ok(
    Client::builder()
      .timeout(StdDuration::from_secs(API_TIMEOUT_SECS))
      .build()?,
  )
}

/// Fetch the most recent activities, newest first
pub async fn fetch_recent_activities(
  config: &GarminConfig,
  start: u32,
  limit: u32,
) -> Result<Vec<Value>, GarminError> {
  let response = http_client()?
    .get(format!("{}{}", config.api_base, ACTIVITIES_PATH))
    .bearer_auth(config.access_token.expose_secret())
    .query(&[("start", start), ("limit", limit)])
    .send()
    .await?;

  let status = response.status();
  if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
    let error_text = response.text().await.unwrap_or_default();
    return Err(GarminError::Auth(format!("{} {}", status, error_text).trim().to_string()));
  }

  if !status.is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(GarminError::Api(format!(
      "Activity list error {}: {}",
      status, error_text
    )));
  }

  Ok(response.json().await?)
}

/// Fetch one night of sleep. Returns None when Garmin has no record for the
/// day or no display name is configured.
pub async fn fetch_daily_sleep(
  config: &GarminConfig,
  date: NaiveDate,
) -> Result<Option<(i64, Value)>, GarminError> {
  let Some(display_name) = config.display_name.as_deref() else {
    return Ok(None);
  };

  let response = http_client()?
    .get(format!("{}{}/{}", config.api_base, DAILY_SLEEP_PATH, display_name))
    .bearer_auth(config.access_token.expose_secret())
    .query(&[("date", date.to_string()), ("nonSleepBufferMinutes", "60".to_string())])
    .send()
    .await?;

  let status = response.status();
  if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
    return Ok(None);
  }
  if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
    return Err(GarminError::Auth(status.to_string()));
  }
  if !status.is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(GarminError::Api(format!(
      "Daily sleep error {}: {}",
      status, error_text
    )));
  }

  let raw: Value = response.json().await?;
  Ok(parse_sleep_minutes(&raw).map(|minutes| (minutes, raw)))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::mock_garmin_config;
  use serde_json::json;

  #[test]
  fn test_lenient_float() {
    assert_eq!(lenient_float(Some(&json!(12.5))), Some(12.5));
    assert_eq!(lenient_float(Some(&json!("88"))), Some(88.0));
    assert_eq!(lenient_float(Some(&json!("n/a"))), None);
    assert_eq!(lenient_float(Some(&json!(null))), None);
    assert_eq!(lenient_float(Some(&json!({"value": 1}))), None);
    assert_eq!(lenient_float(None), None);
  }

  #[test]
  fn test_parse_activity() {
    let raw = json!({
      "activityId": 1234567890u64,
      "startTimeLocal": "2024-03-05 07:15:00",
      "activityType": {"typeKey": "running"},
      "duration": 2710.4,
      "distance": "7012.2",
      "averageHR": 148,
      "maxHR": null,
      "trainingLoad": 112.7
    });

    let activity = parse_activity(&raw).expect("activity");

    assert_eq!(activity.activity_id, "1234567890");
    assert_eq!(activity.start_time.to_string(), "2024-03-05 07:15:00");
    assert_eq!(activity.sport.as_deref(), Some("running"));
    assert_eq!(activity.distance_m, Some(7012.2));
    assert_eq!(activity.avg_hr, Some(148.0));
    assert_eq!(activity.max_hr, None);
    assert_eq!(activity.training_load, Some(112.7));
    assert_eq!(activity.vo2max, None);
  }

  #[test]
  fn test_parse_activity_iso_start_time() {
    let raw = json!({"activityId": "abc", "startTimeLocal": "2024-03-05T18:00:00.0"});
    let activity = parse_activity(&raw).expect("activity");
    assert_eq!(activity.start_time.to_string(), "2024-03-05 18:00:00");
  }

  #[test]
  fn test_parse_activity_without_start_time_is_skipped() {
    assert!(parse_activity(&json!({"activityId": 1})).is_none());
    assert!(parse_activity(&json!({"startTimeLocal": "2024-03-05 07:15:00"})).is_none());
  }

  #[test]
  fn test_parse_sleep_minutes() {
    assert_eq!(parse_sleep_minutes(&json!({"dailySleepDTO": {"sleepTimeSeconds": 26400}})), Some(440));
    assert_eq!(parse_sleep_minutes(&json!({"dailySleepDTO": {"sleepTimeSeconds": null}})), None);
    assert_eq!(parse_sleep_minutes(&json!({})), None);
  }

  #[test]
  fn test_sleep_half_minutes_round_to_even() {
    // 420.5 and 421.5 minutes
    assert_eq!(parse_sleep_minutes(&json!({"dailySleepDTO": {"sleepTimeSeconds": 25230}})), Some(420));
    assert_eq!(parse_sleep_minutes(&json!({"dailySleepDTO": {"sleepTimeSeconds": 25290}})), Some(422));
    assert_eq!(parse_sleep_minutes(&json!({"dailySleepDTO": {"sleepTimeSeconds": "25290"}})), Some(422));
  }

  #[tokio::test]
  async fn test_fetch_activities_unauthorized_is_auth_error() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", ACTIVITIES_PATH)
      .match_query(mockito::Matcher::Any)
      .with_status(401)
      .with_body("expired")
      .create_async()
      .await;

    let cfg = mock_garmin_config(&server.url(), None);
    let err = fetch_recent_activities(&cfg, 0, 10).await.unwrap_err();
    assert!(matches!(err, GarminError::Auth(_)));
  }

  #[tokio::test]
  async fn test_fetch_daily_sleep_skipped_without_display_name() {
    let cfg = mock_garmin_config("http://127.0.0.1:9", None);
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    assert!(fetch_daily_sleep(&cfg, date).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_fetch_daily_sleep() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/wellness-service/wellness/dailySleepData/runner42")
      .match_query(mockito::Matcher::UrlEncoded("date".into(), "2024-03-05".into()))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"dailySleepDTO":{"sleepTimeSeconds":25200}}"#)
      .create_async()
      .await;

    let cfg = mock_garmin_config(&server.url(), Some("runner42"));
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let (minutes, _raw) = fetch_daily_sleep(&cfg, date).await.unwrap().expect("sleep");

    mock.assert_async().await;
    assert_eq!(minutes, 420);
  }
}
