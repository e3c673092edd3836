//! Error types for the release registry

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Missing {
  #[error("Application `{0}` not found")]
  Application(String),
  #[error("Release `{0}` not found")]
  Release(String),
  #[error("Report `{0}` not found or expired")]
  Report(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  NotFound(#[from] Missing),

  #[error("`{0}` is already in use")]
  Conflict(String),

  #[error("{0}")]
  InvalidArgs(String),

  #[error("Invalid webhook token")]
  Unauthorized,

  #[error("Only owners of this application may do that")]
  Forbidden,

  #[error("Artifact exceeds {0} bytes")]
  PayloadTooLarge(usize),

  #[error("Database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl Error {
  /// Text safe to show to chat users.
  pub fn user_message(&self) -> String {
    match self {
      Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
        "Internal error, try again later".into()
      }
      other => other.to_string(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Conflict(_) => StatusCode::CONFLICT,
      Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::Forbidden => StatusCode::FORBIDDEN,
      Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("Request failed: {self}");
    }

    let body = json::json!({
      "success": false,
      "error": self.user_message()
    });

    (status, axum::Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
