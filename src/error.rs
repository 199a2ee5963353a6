//! HTTP-facing error type. Provider errors are mapped to a status code and a
//! `{"detail": "..."}` body.

use crate::garmin::GarminError;
use crate::whoop::WhoopError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Unprocessable(String),

  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("Upstream error: {0}")]
  Upstream(String),

  #[error("Database error: {0}")]
  Database(String),
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::MissingConfig(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    } else {
      tracing::warn!(error = %self, "request rejected");
    }
    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}

impl From<sqlx::Error> for AppError {
  fn from(e: sqlx::Error) -> Self {
    AppError::Database(e.to_string())
  }
}

impl From<WhoopError> for AppError {
  fn from(e: WhoopError) -> Self {
    match e {
      WhoopError::NotAuthenticated => AppError::BadRequest(e.to_string()),
      WhoopError::MissingConfig(key) => AppError::MissingConfig(key),
      WhoopError::Database(msg) => AppError::Database(msg),
      WhoopError::Request(_) | WhoopError::OAuth(_) => {
        AppError::Upstream(e.to_string())
      }
    }
  }
}

impl From<GarminError> for AppError {
  fn from(e: GarminError) -> Self {
    match e {
      GarminError::Auth(msg) => AppError::BadRequest(format!("Garmin login failed: {}", msg)),
      GarminError::MissingConfig(key) => AppError::MissingConfig(key),
      GarminError::Database(msg) => AppError::Database(msg),
      GarminError::Request(_) | GarminError::Api(_) => AppError::Upstream(e.to_string()),
    }
  }
}
