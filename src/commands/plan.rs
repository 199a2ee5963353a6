use crate::commands::today;
use crate::db::{AppState, DbPool};
use crate::error::AppError;
use crate::rules::{generate_plan, Plan};
use crate::summary::{build_daily_summary, SummaryRequest};
use crate::telegram::{format_plan_message, send_message, ParseMode};
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Build today's summary from stored readings plus the request, and run the
/// rules over it.
pub async fn build_today_plan(db: &DbPool, request: &SummaryRequest) -> Result<Plan, AppError> {
  let summary = build_daily_summary(db, today(), request).await?;
  let plan = generate_plan(&summary);

  tracing::info!(
    date = %summary.date,
    focus = %plan.day_focus,
    blocks = plan.sessions.len(),
    "Generated daily plan"
  );

  Ok(plan)
}

/// An empty body means all defaults
fn parse_summary_request(body: &[u8]) -> Result<SummaryRequest, AppError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(SummaryRequest::default());
  }
  serde_json::from_slice(body)
    .map_err(|e| AppError::Unprocessable(format!("Invalid request body: {}", e)))
}

/// ---------------------------------------------------------------------------
/// Trigger Daily Plan
/// ---------------------------------------------------------------------------

/// Generate today's plan, push it to Telegram, and return it.
pub async fn trigger_plan(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<Plan>, AppError> {
  let request = parse_summary_request(&body)?;
  let plan = build_today_plan(&state.db, &request).await?;

  send_message(state.telegram.as_ref(), &format_plan_message(&plan), ParseMode::Markdown).await;

  Ok(Json(plan))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
