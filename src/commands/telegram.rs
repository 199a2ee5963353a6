use crate::commands::plan::build_today_plan;
use crate::commands::today;
use crate::db::AppState;
use crate::error::AppError;
use crate::models::recovery::{save_cycle_phase, save_manual_sleep};
use crate::summary::SummaryRequest;
use crate::telegram::{
  format_plan_message, parse_command, send_message, ChatCommand, ParseMode, Update,
  CYCLE_PHASE_USAGE, HELP_TEXT, LOG_SLEEP_PARSE_ERROR, LOG_SLEEP_USAGE,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

/// Run a chat command and produce the reply. Only the plan is Markdown.
async fn handle_command(
  state: &AppState,
  command: ChatCommand,
) -> Result<(String, ParseMode), AppError> {
  let reply = match command {
    ChatCommand::LogSleep(minutes) => {
      save_manual_sleep(&state.db, today(), minutes).await?;
      format!("Logged sleep: {} min", minutes)
    }
    ChatCommand::LogSleepInvalid => LOG_SLEEP_PARSE_ERROR.to_string(),
    ChatCommand::LogSleepUsage => LOG_SLEEP_USAGE.to_string(),
    ChatCommand::CyclePhase(phase) => {
      save_cycle_phase(&state.db, today(), &phase).await?;
      format!("Cycle phase updated to: {}", phase)
    }
    ChatCommand::CyclePhaseUsage => CYCLE_PHASE_USAGE.to_string(),
    ChatCommand::Plan => {
      let plan = build_today_plan(&state.db, &SummaryRequest::default()).await?;
      return Ok((format_plan_message(&plan), ParseMode::Markdown));
    }
    ChatCommand::Help => HELP_TEXT.to_string(),
  };

  Ok((reply, ParseMode::Plain))
}

/// ---------------------------------------------------------------------------
/// Webhook
/// ---------------------------------------------------------------------------

/// Telegram retries anything that isn't a 2xx, so once the update parses we
/// always acknowledge it. Messages from other chats are ignored.
pub async fn telegram_webhook(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<Json<Value>, AppError> {
  let update: Update = serde_json::from_slice(&body)
    .map_err(|e| AppError::Unprocessable(format!("Invalid update: {}", e)))?;
  let ack = Json(json!({ "ok": true }));

  let Some(config) = state.telegram.as_ref() else {
    tracing::debug!("Telegram not configured, ignoring update");
    return Ok(ack);
  };

  if update.chat_id().as_deref() != Some(config.chat_id.as_str()) {
    tracing::debug!(chat_id = ?update.chat_id(), "Ignoring update from unknown chat");
    return Ok(ack);
  }

  let command = parse_command(update.text());
  tracing::info!(?command, "Telegram command received");

  match handle_command(&state, command).await {
    Ok((reply, mode)) => send_message(Some(config), &reply, mode).await,
    Err(e) => tracing::error!(error = %e, "Telegram command failed"),
  }

  Ok(ack)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
