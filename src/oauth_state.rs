//! Short-lived OAuth `state` values, kept in memory
//!
//! Each state is single use and expires after ten minutes.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

const STATE_TTL_SECONDS: i64 = 600;

#[derive(Debug)]
pub struct OAuthStateStore {
  ttl: Duration,
  entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for OAuthStateStore {
  fn default() -> Self {
    Self::with_ttl(Duration::seconds(STATE_TTL_SECONDS))
  }
}

impl OAuthStateStore {
  pub fn with_ttl(ttl: Duration) -> Self {
    Self {
      ttl,
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Mint a new state and remember when it expires
  pub fn issue(&self) -> String {
    let state = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + self.ttl;

    let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
    let now = Utc::now();
    entries.retain(|_, exp| *exp > now);
    entries.insert(state.clone(), expires_at);

    state
  }

  /// True if `state` was issued here and has not expired. Either way the
  /// state is gone afterwards.
  pub fn consume(&self, state: &str) -> bool {
    let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
    match entries.remove(state) {
      Some(expires_at) => Utc::now() <= expires_at,
      None => false,
    }
  }
}
