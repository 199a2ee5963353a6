//! Process configuration, read from the environment (and `.env` via dotenvy)

use crate::garmin::GarminConfig;
use crate::telegram::TelegramConfig;
use crate::whoop::WhoopConfig;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE_URL: &str = "sqlite://coach.db?mode=rwc";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub bind_addr: String,
  pub database_url: String,
  pub log_level: String,
}

impl ServerConfig {
  pub fn from_env_with<F>(mut get: F) -> Self
  where
    F: FnMut(&str) -> Option<String>,
  {
    Self {
      bind_addr: get("COACH_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
      database_url: get("COACH_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
      log_level: get("COACH_LOG_LEVEL")
        .or_else(|| get("RUST_LOG"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.into()),
    }
  }
}

/// Everything the service needs at startup. Providers are optional: a missing
/// provider only fails the endpoints that depend on it.
#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server: ServerConfig,
  pub whoop: Option<WhoopConfig>,
  pub garmin: Option<GarminConfig>,
  pub telegram: Option<TelegramConfig>,
}

impl AppConfig {
  pub fn from_env() -> Self {
    Self::from_env_with(|k| std::env::var(k).ok())
  }

  /// Blank values count as unset.
  pub fn from_env_with<F>(get: F) -> Self
  where
    F: Fn(&str) -> Option<String>,
  {
    let lookup = |k: &str| get(k).filter(|v| !v.trim().is_empty());

    Self {
      server: ServerConfig::from_env_with(lookup),
      whoop: WhoopConfig::from_env_with(lookup).ok(),
      garmin: GarminConfig::from_env_with(lookup).ok(),
      telegram: TelegramConfig::from_env_with(lookup).ok(),
    }
  }

  pub fn log_enabled_providers(&self) {
    tracing::info!(
      whoop = self.whoop.is_some(),
      garmin = self.garmin.is_some(),
      telegram = self.telegram.is_some(),
      "providers configured"
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn test_server_defaults() {
    let cfg = ServerConfig::from_env_with(|_| None);
    assert_eq!(cfg.bind_addr, "127.0.0.1:8000");
    assert_eq!(cfg.database_url, "sqlite://coach.db?mode=rwc");
    assert_eq!(cfg.log_level, "info");
  }

  #[test]
  fn test_log_level_falls_back_to_rust_log() {
    let cfg = ServerConfig::from_env_with(|k| match k {
      "RUST_LOG" => Some("debug".into()),
      _ => None,
    });
    assert_eq!(cfg.log_level, "debug");
  }

  #[test]
  fn test_blank_values_disable_provider() {
    let cfg = AppConfig::from_env_with(|k| match k {
      "TELEGRAM_BOT_TOKEN" => Some("123:abc".into()),
      "TELEGRAM_CHAT_ID" => Some("   ".into()),
      _ => None,
    });
    assert!(cfg.telegram.is_none());
    assert!(cfg.whoop.is_none());
    assert!(cfg.garmin.is_none());
  }

  #[test]
  #[serial]
  fn test_from_env_reads_process_environment() {
    temp_env::with_vars(
      [
        ("COACH_BIND_ADDR", Some("0.0.0.0:9000")),
        ("WHOOP_CLIENT_ID", Some("client")),
        ("WHOOP_CLIENT_SECRET", Some("secret")),
        ("WHOOP_REDIRECT_URI", Some("http://localhost:9000/auth/whoop/callback")),
        ("TELEGRAM_BOT_TOKEN", None),
      ],
      || {
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:9000");
        let whoop = cfg.whoop.expect("whoop configured");
        assert_eq!(whoop.client_id, "client");
        assert!(cfg.telegram.is_none());
      },
    );
  }
}
