//! Builds the `DailySummary` the rules engine runs on
//!
//! This is where stored readings meet request input: 7-day baselines and load
//! come from the database, sleep is resolved across providers, and context
//! and available time come from the caller.

use crate::db::DbPool;
use crate::models::{garmin, recovery};
use crate::rules::DailySummary;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;

pub const DEFAULT_TIME_MIN: i64 = 30;
const LOAD_WINDOW_DAYS: i64 = 7;

/// Caller-supplied parts of a summary. Every field is optional in the JSON
/// body of `POST /api/trigger`.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryRequest {
  #[serde(default)]
  pub manual_sleep_min: Option<i64>,
  #[serde(default)]
  pub cycle_phase: Option<String>,
  #[serde(default)]
  pub context: Vec<String>,
  #[serde(default = "default_time_min")]
  pub time_min: i64,
}

fn default_time_min() -> i64 {
  DEFAULT_TIME_MIN
}

impl Default for SummaryRequest {
  fn default() -> Self {
    Self {
      manual_sleep_min: None,
      cycle_phase: None,
      context: Vec::new(),
      time_min: DEFAULT_TIME_MIN,
    }
  }
}

/// First positive value wins. Order is provider priority.
pub fn resolve_sleep_minutes(candidates: &[Option<i64>]) -> Option<i64> {
  candidates.iter().flatten().copied().find(|min| *min > 0)
}

pub async fn build_daily_summary(
  db: &DbPool,
  date: NaiveDate,
  request: &SummaryRequest,
) -> Result<DailySummary, sqlx::Error> {
  let today = recovery::load_for_date(db, date).await?;
  let garmin_sleep = garmin::load_garmin_sleep(db, date).await?;

  let load_since = (date - Duration::days(LOAD_WINDOW_DAYS)).and_hms_opt(0, 0, 0).unwrap_or_default();
  let load_7d = garmin::training_load_since(db, load_since).await?;

  let avg7_hrv_ms = recovery::avg7_hrv(db, date).await?;
  let avg7_rhr_bpm = recovery::avg7_rhr(db, date).await?;

  let sleep_min = resolve_sleep_minutes(&[
    today.as_ref().and_then(|r| r.sleep_min),
    garmin_sleep,
    request.manual_sleep_min,
    today.as_ref().and_then(|r| r.manual_sleep_min),
  ]);

  let cycle_phase = request
    .cycle_phase
    .clone()
    .filter(|p| !p.is_empty())
    .or_else(|| today.as_ref().and_then(|r| r.cycle_phase.clone()));

  let summary = DailySummary {
    date,
    hrv_ms: today.as_ref().and_then(|r| r.hrv_ms),
    rhr_bpm: today.as_ref().and_then(|r| r.rhr_bpm),
    sleep_min,
    temp_delta: today.as_ref().and_then(|r| r.temp_delta),
    load_7d: Some(load_7d),
    avg7_hrv_ms,
    avg7_rhr_bpm,
    cycle_phase,
    context: request.context.clone(),
    time_min: request.time_min,
  };

  tracing::debug!(?summary, "built daily summary");
  Ok(summary)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
