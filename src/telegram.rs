//! Telegram delivery and chat commands
//!
//! Plans go out as Markdown messages to a single configured chat. Incoming
//! webhook updates are parsed into `ChatCommand`s here and executed in
//! `commands/telegram.rs`.

use crate::rules::Plan;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration as StdDuration;

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

const TELEGRAM_DEFAULT_API_BASE: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 10;

pub const HELP_TEXT: &str = "Commands: log sleep [hours], cycle phase [phase], plan, summary";
pub const LOG_SLEEP_USAGE: &str = "Usage: log sleep 7.5h";
pub const LOG_SLEEP_PARSE_ERROR: &str = "Couldn't parse sleep amount. Try 'log sleep 7.5h'";
pub const CYCLE_PHASE_USAGE: &str = "Usage: cycle phase late_luteal";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
  pub bot_token: SecretString,
  pub chat_id: String,
  pub api_base: String,
}

impl TelegramConfig {
  pub fn from_env_with<F>(mut get: F) -> Result<Self, TelegramError>
  where
    F: FnMut(&str) -> Option<String>,
  {
    Ok(Self {
      bot_token: get("TELEGRAM_BOT_TOKEN")
        .map(SecretString::from)
        .ok_or_else(|| TelegramError::MissingConfig("TELEGRAM_BOT_TOKEN".into()))?,
      chat_id: get("TELEGRAM_CHAT_ID")
        .ok_or_else(|| TelegramError::MissingConfig("TELEGRAM_CHAT_ID".into()))?,
      api_base: get("TELEGRAM_API_BASE")
        .unwrap_or_else(|| TELEGRAM_DEFAULT_API_BASE.into())
        .trim_end_matches('/')
        .to_string(),
    })
  }

  fn send_message_url(&self) -> String {
    format!("{}/bot{}/sendMessage", self.api_base, self.bot_token.expose_secret())
  }
}

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("API error: {0}")]
  Api(String),
}

/// ---------------------------------------------------------------------------
/// Formatting
/// ---------------------------------------------------------------------------

pub fn format_plan_message(plan: &Plan) -> String {
  let mut msg = String::new();

  let _ = writeln!(msg, "*Day Focus:* {}", plan.day_focus);
  msg.push_str("*Sessions:*\n");
  for block in &plan.sessions {
    let _ = writeln!(
      msg,
      "  - {} ({} min): {}",
      block.name,
      block.duration_min,
      block.content.join(", ")
    );
  }

  msg.push_str("*Recovery:*\n");
  for item in &plan.recovery {
    let _ = writeln!(msg, "  - {}", item);
  }

  if let Some(note) = plan.cycle_note.as_deref().filter(|n| !n.is_empty()) {
    let _ = writeln!(msg, "*Cycle Note:* {}", note);
  }
  let _ = writeln!(msg, "_Notes:_ {}", plan.notes);

  msg
}

/// ---------------------------------------------------------------------------
/// Sending
/// ---------------------------------------------------------------------------

/// Plans are Markdown. Command replies go out as plain text because they
/// echo user input such as `late_luteal`, which legacy Markdown rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
  Markdown,
  Plain,
}

pub async fn try_send_message(
  config: &TelegramConfig,
  text: &str,
  mode: ParseMode,
) -> Result<(), TelegramError> {
  let client = Client::builder()
    .timeout(StdDuration::from_secs(SEND_TIMEOUT_SECS))
    .build()?;

  let mut form = vec![("chat_id", config.chat_id.as_str()), ("text", text)];
  if mode == ParseMode::Markdown {
    form.push(("parse_mode", "Markdown"));
  }

  let response = client
    .post(config.send_message_url())
    .form(&form)
    .send()
    .await?;

  if !response.status().is_success() {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    return Err(TelegramError::Api(format!("sendMessage {}: {}", status, error_text)));
  }

  Ok(())
}

/// Best-effort send. Delivery problems are logged, never returned.
pub async fn send_message(config: Option<&TelegramConfig>, text: &str, mode: ParseMode) {
  let Some(config) = config else {
    tracing::warn!("Telegram bot token or chat ID not set, message dropped");
    return;
  };

  if let Err(e) = try_send_message(config, text, mode).await {
    tracing::warn!(error = %e, "Telegram send failed");
  }
}

/// ---------------------------------------------------------------------------
/// Incoming Updates
/// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Update {
  #[serde(default)]
  pub message: Option<Message>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Message {
  #[serde(default)]
  pub chat: Option<Chat>,
  #[serde(default)]
  pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
  pub id: i64,
}

impl Update {
  pub fn chat_id(&self) -> Option<String> {
    self
      .message
      .as_ref()
      .and_then(|m| m.chat.as_ref())
      .map(|c| c.id.to_string())
  }

  pub fn text(&self) -> &str {
    self
      .message
      .as_ref()
      .and_then(|m| m.text.as_deref())
      .unwrap_or("")
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
  /// Minutes of sleep to record for today
  LogSleep(i64),
  LogSleepInvalid,
  LogSleepUsage,
  CyclePhase(String),
  CyclePhaseUsage,
  Plan,
  Help,
}

/// Parse "7.5h", "7,5" or "8" as hours and convert to whole minutes
fn parse_sleep_hours(raw: &str) -> Option<i64> {
  let hours: f64 = raw.replace('h', "").replace(',', ".").parse().ok()?;
  if !hours.is_finite() {
    return None;
  }
  Some((hours * 60.0) as i64)
}

pub fn parse_command(text: &str) -> ChatCommand {
  let text = text.trim().to_lowercase();
  let parts: Vec<&str> = text.split_whitespace().collect();

  if text.starts_with("log sleep") {
    return match parts.get(2) {
      Some(arg) => parse_sleep_hours(arg)
        .map(ChatCommand::LogSleep)
        .unwrap_or(ChatCommand::LogSleepInvalid),
      None => ChatCommand::LogSleepUsage,
    };
  }

  if text.starts_with("cycle phase") {
    return match parts.get(2) {
      Some(phase) => ChatCommand::CyclePhase(phase.to_string()),
      None => ChatCommand::CyclePhaseUsage,
    };
  }

  match text.as_str() {
    "plan" | "summary" => ChatCommand::Plan,
    _ => ChatCommand::Help,
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
