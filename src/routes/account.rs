//! Account identity. An upstream auth layer sets `x-account-id`; requests
//! without it are rejected with 401.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const ACCOUNT_HEADER: &str = "x-account-id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AccountId {
  type Rejection = AppError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    parts
      .headers
      .get(ACCOUNT_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| AccountId(v.to_string()))
      .ok_or(AppError::Unauthorized)
  }
}
