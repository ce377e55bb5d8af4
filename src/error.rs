//! HTTP-facing error type. Every handler returns `Result<_, AppError>`; the
//! response body is always `{"error": {"code", "message"}}`.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::openai::AiError;
use crate::passages::PassageError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Passage(#[from] PassageError),

  #[error("AI error: {0}")]
  Ai(#[from] AiError),

  #[error("AI is not configured")]
  AiUnavailable,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("missing x-account-id header")]
  Unauthorized,
}

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
      AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
      AppError::Store(StoreError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Unauthorized => StatusCode::UNAUTHORIZED,
      AppError::AiUnavailable => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Ai(_) | AppError::Passage(PassageError::Ai(_) | PassageError::Malformed(_)) => {
        StatusCode::BAD_GATEWAY
      }
      AppError::Passage(PassageError::EmptyPool) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  pub fn code(&self) -> &'static str {
    match self {
      AppError::Store(StoreError::NotFound { .. }) => "NOT_FOUND",
      AppError::Store(StoreError::Conflict(_)) => "CONFLICT",
      AppError::Store(StoreError::Rejected(_)) => "REJECTED",
      AppError::BadRequest(_) => "BAD_REQUEST",
      AppError::Unauthorized => "UNAUTHORIZED",
      AppError::AiUnavailable => "AI_UNAVAILABLE",
      AppError::Ai(_) | AppError::Passage(PassageError::Ai(_) | PassageError::Malformed(_)) => {
        "BAD_GATEWAY"
      }
      AppError::Passage(PassageError::EmptyPool) => "INTERNAL_ERROR",
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> axum::response::Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "reading_coach", %status, error = %self, "Request failed");
    } else {
      warn!(target: "reading_coach", %status, error = %self, "Request rejected");
    }
    // Upstream details stay in the logs.
    let message = match &self {
      AppError::Ai(_) | AppError::Passage(_) => "Upstream AI service failed.".to_string(),
      other => other.to_string(),
    };
    let body = ApiErrorResponse {
      error: ApiErrorBody { code: self.code().to_string(), message },
    };
    (status, Json(body)).into_response()
  }
}

#[derive(Serialize)]
pub struct ApiErrorBody {
  pub code: String,
  pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
  pub error: ApiErrorBody,
}
