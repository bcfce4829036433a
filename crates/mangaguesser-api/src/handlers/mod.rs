pub mod answer;
pub mod image;
pub mod round;

use std::future::Future;

use axum::{http::header, response::Response};
use mangaguesser_core::{Identity, store::GameStore};

use crate::{
  AppState, ApiError,
  identity::{TOKEN_COOKIE, set_cookie},
};

/// Bound `work` by the configured request timeout.
pub(crate) async fn within<S, F>(
  state: &AppState<S>,
  op: &'static str,
  work: F,
) -> Result<F::Output, ApiError>
where
  S: GameStore,
  F: Future,
{
  tokio::time::timeout(state.config.request_timeout(), work)
    .await
    .map_err(|_| {
      tracing::warn!(op, "request timed out");
      ApiError::Timeout
    })
}

/// Append a freshly signed token cookie for `identity`. On a signing
/// failure the response goes out without it.
pub(crate) fn refresh_token_cookie<S>(
  state: &AppState<S>,
  identity: &Identity,
  resp: &mut Response,
) where
  S: GameStore,
{
  let token = match state.tokens.sign(identity) {
    Ok(token) => token,
    Err(e) => {
      tracing::warn!(%identity, error = %e, "failed to sign token");
      return;
    }
  };
  if let Some(cookie) =
    set_cookie(TOKEN_COOKIE, &token, state.config.token_ttl(), state.config.cookie_secure)
  {
    resp.headers_mut().append(header::SET_COOKIE, cookie);
  }
}
