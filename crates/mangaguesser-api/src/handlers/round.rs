//! `GET /random_manga`: deal a new round.

use axum::{
  Json,
  extract::State,
  http::header,
  response::{IntoResponse, Response},
};
use mangaguesser_core::{Error as CoreError, Identity, catalog::TitleId, store::GameStore};
use serde::Serialize;

use super::{refresh_token_cookie, within};
use crate::{
  AppState, ApiError,
  identity::{RequestCredentials, SESSION_COOKIE, mint_identity, new_session, set_cookie},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundBody {
  pub mangas:           Vec<String>,
  pub current_title_id: TitleId,
  pub image_url:        String,
}

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  RequestCredentials(creds): RequestCredentials,
) -> Result<Response, ApiError>
where
  S: GameStore + Clone + 'static,
{
  let resolved = within(&state, "random_manga", state.resolver.resolve(&creds)).await?;
  let (identity, session_cookie) = match resolved {
    Ok(identity) => (identity, None),
    Err(CoreError::NoIdentity) => {
      let (identity, cookie) = start_identity(&state).await?;
      (identity, Some(cookie))
    }
    Err(e) => return Err(ApiError::from_core("random_manga", None, e)),
  };

  let dealt = within(&state, "random_manga", state.engine.deal_round(&identity))
    .await?
    .map_err(|e| ApiError::from_core("random_manga", Some(&identity), e))?;
  tracing::debug!(%identity, title_id = dealt.winning_title_id, "round dealt");

  let mut resp = Json(RoundBody {
    mangas:           dealt.candidates,
    current_title_id: dealt.winning_title_id,
    image_url:        dealt.image_url,
  })
  .into_response();

  if let Some(cookie) = session_cookie {
    resp.headers_mut().append(header::SET_COOKIE, cookie);
  }
  refresh_token_cookie(&state, &identity, &mut resp);
  Ok(resp)
}

/// Mint an identity with a server-side session behind it.
async fn start_identity<S>(
  state: &AppState<S>,
) -> Result<(Identity, axum::http::HeaderValue), ApiError>
where
  S: GameStore + Clone + 'static,
{
  let identity = mint_identity();
  let ttl = state.engine.policy().session_ttl();
  let session = new_session(&identity, ttl);

  within(state, "random_manga", state.engine.store().save_session(&session))
    .await?
    .map_err(|e| ApiError::from_core("random_manga", Some(&identity), CoreError::store(e)))?;
  tracing::info!(%identity, "minted new identity");

  let cookie = set_cookie(SESSION_COOKIE, &session.session_id, ttl, state.config.cookie_secure)
    .ok_or_else(|| {
      tracing::error!(%identity, "session id is not a valid header value");
      ApiError::Internal
    })?;
  Ok((identity, cookie))
}
