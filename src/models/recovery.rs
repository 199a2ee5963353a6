use crate::db::DbPool;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyRecovery {
  pub id: i64,
  pub date: NaiveDate,
  pub hrv_ms: Option<f64>,
  pub rhr_bpm: Option<f64>,
  /// Whoop sleep; 0 when the sync found no sleep record
  pub sleep_min: Option<i64>,
  pub temp_delta: Option<f64>,
  /// Logged over chat with "log sleep"
  pub manual_sleep_min: Option<i64>,
  pub cycle_phase: Option<String>,
  pub raw_json: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// For upserting a Whoop sync result (leaves manual columns untouched)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWhoopRecovery {
  pub date: NaiveDate,
  pub hrv_ms: Option<f64>,
  pub rhr_bpm: Option<f64>,
  pub sleep_min: Option<i64>,
  pub temp_delta: Option<f64>,
  pub raw_json: Option<String>,
}

pub async fn load_for_date(db: &DbPool, date: NaiveDate) -> Result<Option<DailyRecovery>, sqlx::Error> {
  sqlx::query_as::<_, DailyRecovery>("SELECT * FROM daily_recovery WHERE date = ?1")
    .bind(date)
    .fetch_optional(db)
    .await
}

pub async fn upsert_whoop_recovery(db: &DbPool, rec: &NewWhoopRecovery) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
    INSERT INTO daily_recovery (date, hrv_ms, rhr_bpm, sleep_min, temp_delta, raw_json)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(date) DO UPDATE SET
      hrv_ms = excluded.hrv_ms,
      rhr_bpm = excluded.rhr_bpm,
      sleep_min = excluded.sleep_min,
      temp_delta = excluded.temp_delta,
      raw_json = excluded.raw_json,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(rec.date)
  .bind(rec.hrv_ms)
  .bind(rec.rhr_bpm)
  .bind(rec.sleep_min)
  .bind(rec.temp_delta)
  .bind(&rec.raw_json)
  .execute(db)
  .await?;

  Ok(())
}

pub async fn save_manual_sleep(db: &DbPool, date: NaiveDate, minutes: i64) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
    INSERT INTO daily_recovery (date, manual_sleep_min)
    VALUES (?1, ?2)
    ON CONFLICT(date) DO UPDATE SET
      manual_sleep_min = excluded.manual_sleep_min,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(date)
  .bind(minutes)
  .execute(db)
  .await?;

  Ok(())
}

pub async fn save_cycle_phase(db: &DbPool, date: NaiveDate, phase: &str) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
    INSERT INTO daily_recovery (date, cycle_phase)
    VALUES (?1, ?2)
    ON CONFLICT(date) DO UPDATE SET
      cycle_phase = excluded.cycle_phase,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(date)
  .bind(phase)
  .execute(db)
  .await?;

  Ok(())
}

/// Mean of the 7 most recent HRV readings up to and including `date`
pub async fn avg7_hrv(db: &DbPool, date: NaiveDate) -> Result<Option<f64>, sqlx::Error> {
  sqlx::query_scalar(
    r#"
    SELECT AVG(hrv_ms) FROM (
      SELECT hrv_ms FROM daily_recovery
      WHERE hrv_ms IS NOT NULL AND date <= ?1
      ORDER BY date DESC
      LIMIT 7
    )
    "#,
  )
  .bind(date)
  .fetch_one(db)
  .await
}

/// Mean of the 7 most recent resting HR readings up to and including `date`
pub async fn avg7_rhr(db: &DbPool, date: NaiveDate) -> Result<Option<f64>, sqlx::Error> {
  sqlx::query_scalar(
    r#"
    SELECT AVG(rhr_bpm) FROM (
      SELECT rhr_bpm FROM daily_recovery
      WHERE rhr_bpm IS NOT NULL AND date <= ?1
      ORDER BY date DESC
      LIMIT 7
    )
    "#,
  )
  .bind(date)
  .fetch_one(db)
  .await
}
