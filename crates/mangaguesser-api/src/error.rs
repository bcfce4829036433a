//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Engine failures are translated here. Client-fixable conditions become
//! 400s; catalog and storage failures become 5xx with a generic message and
//! are logged with enough context to diagnose.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use mangaguesser_core::{Error as CoreError, Identity};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("No active game found, start a new round first")]
  NoActiveGame,

  #[error("Invalid number format")]
  InvalidInput,

  #[error("catalog is misconfigured")]
  Catalog,

  #[error("internal error")]
  Internal,

  #[error("Failed to fetch image")]
  Upstream,

  #[error("request timed out")]
  Timeout,
}

impl ApiError {
  /// Map an engine error for operation `op`, logging server-side failures.
  pub fn from_core(op: &'static str, identity: Option<&Identity>, e: CoreError) -> Self {
    let identity = identity.map(Identity::as_str);
    match e {
      CoreError::NoIdentity | CoreError::NoActiveRound => {
        tracing::debug!(op, ?identity, error = %e, "client has no live round");
        Self::NoActiveGame
      }
      CoreError::InvalidInput(ref msg) => {
        tracing::debug!(op, ?identity, %msg, "rejected input");
        Self::InvalidInput
      }
      CoreError::InsufficientCatalog { .. } | CoreError::NoAssetsForTitle(_) => {
        tracing::error!(op, ?identity, error = %e, "catalog cannot serve rounds");
        Self::Catalog
      }
      CoreError::InvalidPolicy(ref msg) => {
        tracing::error!(op, ?identity, %msg, "engine policy rejected");
        Self::Internal
      }
      CoreError::Store(ref source) => {
        tracing::error!(op, ?identity, error = %source, "store failure");
        Self::Internal
      }
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::NoActiveGame | Self::InvalidInput => StatusCode::BAD_REQUEST,
      Self::Catalog | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
      Self::Upstream => StatusCode::BAD_GATEWAY,
      Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_errors_are_400() {
    let e = ApiError::from_core("check_answer", None, CoreError::NoActiveRound);
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    let e = ApiError::from_core("check_answer", None, CoreError::NoIdentity);
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    let e = ApiError::from_core("check_answer", None, CoreError::InvalidInput("x".into()));
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn catalog_and_store_errors_are_500_without_detail() {
    let e = ApiError::from_core(
      "deal_round",
      None,
      CoreError::InsufficientCatalog { available: 2, needed: 4 },
    );
    assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let io = std::io::Error::other("disk I/O error at /var/db/secret.db");
    let e = ApiError::from_core("deal_round", None, CoreError::store(io));
    assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!e.to_string().contains("secret.db"));

    let e = ApiError::from_core("deal_round", None, CoreError::InvalidPolicy("x".into()));
    assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
