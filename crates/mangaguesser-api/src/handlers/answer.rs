//! `GET /answer?number=N`: check a guess against the live round.

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
  response::{IntoResponse, Response},
};
use mangaguesser_core::store::GameStore;
use serde::{Deserialize, Serialize};

use super::{refresh_token_cookie, within};
use crate::{AppState, ApiError, identity::RequestCredentials};

#[derive(Debug, Default, Deserialize)]
pub struct AnswerQuery {
  /// Kept as text so a malformed value reaches the engine's own validation.
  pub number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerBody {
  pub correct: bool,
}

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  RequestCredentials(creds): RequestCredentials,
  query: Result<Query<AnswerQuery>, QueryRejection>,
) -> Result<Response, ApiError>
where
  S: GameStore + Clone + 'static,
{
  let identity = within(&state, "answer", state.resolver.resolve(&creds))
    .await?
    .map_err(|e| ApiError::from_core("answer", None, e))?;

  // An unreadable query string counts as a missing answer, so it is still
  // checked after the live round.
  let submitted = match query {
    Ok(Query(q)) => q.number.unwrap_or_default(),
    Err(rejection) => {
      tracing::debug!(%identity, error = %rejection, "unreadable answer query");
      String::new()
    }
  };
  let correct = within(&state, "answer", state.engine.check_answer(&identity, &submitted))
    .await?
    .map_err(|e| ApiError::from_core("answer", Some(&identity), e))?;
  tracing::debug!(%identity, correct, "answer checked");

  let mut resp = Json(AnswerBody { correct }).into_response();
  refresh_token_cookie(&state, &identity, &mut resp);
  Ok(resp)
}
