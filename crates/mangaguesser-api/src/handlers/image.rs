//! `GET /image`: proxy a fresh image of the live round's answer.

use axum::{
  body::Body,
  extract::State,
  http::{HeaderValue, StatusCode, header},
  response::Response,
};
use mangaguesser_core::store::GameStore;

use super::{refresh_token_cookie, within};
use crate::{AppState, ApiError, identity::RequestCredentials};

const NO_CACHE: &str = "max-age=0, no-cache, must-revalidate, proxy-revalidate";
const DEFAULT_CONTENT_TYPE: &str = "image/png";

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  RequestCredentials(creds): RequestCredentials,
) -> Result<Response, ApiError>
where
  S: GameStore + Clone + 'static,
{
  let identity = within(&state, "image", state.resolver.resolve(&creds))
    .await?
    .map_err(|e| ApiError::from_core("image", None, e))?;

  let url = within(&state, "image", state.engine.fetch_image_url(&identity))
    .await?
    .map_err(|e| ApiError::from_core("image", Some(&identity), e))?;

  let image = within(&state, "image", state.images.fetch(&url)).await?.map_err(|e| {
    tracing::error!(op = "image", %identity, %url, error = %e, "image host failure");
    ApiError::Upstream
  })?;

  let content_type = image
    .content_type
    .as_deref()
    .and_then(|ct| HeaderValue::from_str(ct).ok())
    .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

  let mut resp = Response::new(Body::from(image.bytes));
  *resp.status_mut() = StatusCode::OK;
  let headers = resp.headers_mut();
  headers.insert(header::CONTENT_TYPE, content_type);
  headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
  headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
  headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

  refresh_token_cookie(&state, &identity, &mut resp);
  Ok(resp)
}
