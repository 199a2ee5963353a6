use crate::db::DbPool;
use crate::garmin::GarminActivitySummary;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GarminActivity {
  pub id: i64,
  pub activity_id: String,
  pub start_time: NaiveDateTime,
  pub sport: Option<String>,
  pub duration_s: Option<f64>,
  pub distance_m: Option<f64>,
  pub avg_hr: Option<f64>,
  pub max_hr: Option<f64>,
  pub training_load: Option<f64>,
  pub vo2max: Option<f64>,
  pub summary_json: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

/// Insert an activity unless we already have it. Returns true if inserted.
pub async fn insert_activity_if_new(
  db: &DbPool,
  activity: &GarminActivitySummary,
) -> Result<bool, sqlx::Error> {
  let summary_json = serde_json::to_string(&activity.summary_json).unwrap_or_default();

  let result = sqlx::query(
    r#"
    INSERT INTO garmin_activities (
      activity_id, start_time, sport, duration_s, distance_m,
      avg_hr, max_hr, training_load, vo2max, summary_json
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(activity_id) DO NOTHING
    "#,
  )
  .bind(&activity.activity_id)
  .bind(activity.start_time)
  .bind(&activity.sport)
  .bind(activity.duration_s)
  .bind(activity.distance_m)
  .bind(activity.avg_hr)
  .bind(activity.max_hr)
  .bind(activity.training_load)
  .bind(activity.vo2max)
  .bind(&summary_json)
  .execute(db)
  .await?;

  Ok(result.rows_affected() > 0)
}

/// Sum of training load for activities starting at or after `since`.
/// Activities without a load count as zero.
pub async fn training_load_since(db: &DbPool, since: NaiveDateTime) -> Result<f64, sqlx::Error> {
  sqlx::query_scalar("SELECT TOTAL(training_load) FROM garmin_activities WHERE start_time >= ?1")
    .bind(since)
    .fetch_one(db)
    .await
}

pub async fn save_garmin_sleep(
  db: &DbPool,
  date: NaiveDate,
  minutes: i64,
  raw_json: &str,
) -> Result<(), sqlx::Error> {
  sqlx::query(
    r#"
    INSERT INTO garmin_sleep (date, sleep_min, raw_json)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(date) DO UPDATE SET
      sleep_min = excluded.sleep_min,
      raw_json = excluded.raw_json,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(date)
  .bind(minutes)
  .bind(raw_json)
  .execute(db)
  .await?;

  Ok(())
}

pub async fn load_garmin_sleep(db: &DbPool, date: NaiveDate) -> Result<Option<i64>, sqlx::Error> {
  sqlx::query_scalar("SELECT sleep_min FROM garmin_sleep WHERE date = ?1")
    .bind(date)
    .fetch_optional(db)
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;

  #[tokio::test]
  async fn test_insert_activity_only_once() {
    let pool = setup_test_db().await;
    let activity = mock_garmin_activity("a1", datetime_days_ago(1), Some(120.0));

    assert!(insert_activity_if_new(&pool, &activity).await.unwrap());
    assert!(!insert_activity_if_new(&pool, &activity).await.unwrap());

    let rows = sqlx::query_as::<_, GarminActivity>("SELECT * FROM garmin_activities")
      .fetch_all(&pool)
      .await
      .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].training_load, Some(120.0));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_training_load_since_window() {
    let pool = setup_test_db().await;

    for (id, days_ago, load) in [("a", 1, Some(200.0)), ("b", 3, None), ("c", 6, Some(150.5)), ("d", 10, Some(999.0))] {
      let activity = mock_garmin_activity(id, datetime_days_ago(days_ago), load);
      insert_activity_if_new(&pool, &activity).await.unwrap();
    }

    let since = datetime_days_ago(7);
    assert_eq!(training_load_since(&pool, since).await.unwrap(), 350.5);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_empty_load_is_zero() {
    let pool = setup_test_db().await;
    assert_eq!(training_load_since(&pool, datetime_days_ago(7)).await.unwrap(), 0.0);
    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_garmin_sleep_upsert() {
    let pool = setup_test_db().await;
    let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

    save_garmin_sleep(&pool, date, 400, "{}").await.unwrap();
    save_garmin_sleep(&pool, date, 410, "{}").await.unwrap();

    assert_eq!(load_garmin_sleep(&pool, date).await.unwrap(), Some(410));
    assert_eq!(load_garmin_sleep(&pool, date.succ_opt().unwrap()).await.unwrap(), None);

    teardown_test_db(pool).await;
  }
}
