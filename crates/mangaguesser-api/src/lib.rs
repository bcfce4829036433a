//! HTTP surface for the manga guesser.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`GameStore`]. Requests carry the player's identity in a signed token or a
//! session cookie; see [`identity`] for the carriers.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod image;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  http::{HeaderValue, Method, header},
  routing::get,
};
use mangaguesser_core::{
  Engine, Policy,
  identity::{IdentityResolver, TokenCodec},
  store::GameStore,
};
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

use image::ImageSource;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `MANGAGUESSER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                     String,
  #[serde(default = "default_port")]
  pub port:                     u16,
  #[serde(default = "default_store_path")]
  pub store_path:               PathBuf,
  /// HMAC secret for identity tokens. Required.
  pub token_secret:             String,
  #[serde(default = "default_token_ttl_days")]
  pub token_ttl_days:           i64,
  #[serde(default = "default_image_base_url")]
  pub image_base_url:           String,
  #[serde(default = "default_allowed_origins")]
  pub allowed_origins:          Vec<String>,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs:     u64,
  #[serde(default = "default_image_fetch_timeout_secs")]
  pub image_fetch_timeout_secs: u64,
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs:      u64,
  #[serde(default = "default_sweep_pass_timeout_secs")]
  pub sweep_pass_timeout_secs:  u64,
  /// Mark cookies `Secure`. Enable when served over HTTPS.
  #[serde(default)]
  pub cookie_secure:            bool,
  #[serde(default)]
  pub policy:                   Policy,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("./manga_images.db") }
fn default_token_ttl_days() -> i64 { 30 }
fn default_image_base_url() -> String { "https://node1.alejoseed.com/mangas".to_string() }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_image_fetch_timeout_secs() -> u64 { 30 }
fn default_sweep_interval_secs() -> u64 { 3600 }
fn default_sweep_pass_timeout_secs() -> u64 { 30 }

fn default_allowed_origins() -> Vec<String> {
  vec![
    "http://localhost:8080".to_string(),
    "http://localhost:3000".to_string(),
    "https://mangaguesser.alejoseed.com".to_string(),
  ]
}

impl ServerConfig {
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  pub fn image_fetch_timeout(&self) -> Duration {
    Duration::from_secs(self.image_fetch_timeout_secs)
  }

  pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_secs) }

  pub fn sweep_pass_timeout(&self) -> Duration {
    Duration::from_secs(self.sweep_pass_timeout_secs)
  }

  pub fn token_ttl(&self) -> chrono::Duration { chrono::Duration::days(self.token_ttl_days) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: GameStore> {
  pub engine:   Arc<Engine<S>>,
  pub resolver: Arc<IdentityResolver>,
  pub tokens:   Arc<dyn TokenCodec>,
  pub images:   Arc<dyn ImageSource>,
  pub config:   Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the game [`Router`] with CORS and request tracing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: GameStore + Clone + 'static,
{
  let cors = cors_layer(&state.config.allowed_origins);

  Router::new()
    .route("/random_manga", get(handlers::round::handler::<S>))
    .route("/answer",       get(handlers::answer::handler::<S>))
    .route("/image",        get(handlers::image::handler::<S>))
    .with_state(state)
    .layer(cors)
    .layer(TraceLayer::new_for_http())
}

/// Credentialed CORS for an explicit origin list. Unparseable origins are
/// skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
  let origins: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match HeaderValue::from_str(o) {
      Ok(v) => Some(v),
      Err(_) => {
        tracing::warn!(origin = %o, "ignoring invalid CORS origin");
        None
      }
    })
    .collect();

  CorsLayer::new()
    .allow_origin(AllowOrigin::list(origins))
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    .allow_credentials(true)
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
  };
  use bytes::Bytes;
  use mangaguesser_core::Identity;
  use mangaguesser_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;
  use crate::{
    identity::{JwtCodec, SESSION_COOKIE, TOKEN_COOKIE},
    image::{FetchError, ImageBytes},
  };

  /// How the stub image host behaves.
  #[derive(Clone, Copy)]
  enum Upstream {
    Serves,
    Fails,
    Hangs,
  }

  struct StubImages(Upstream);

  #[async_trait]
  impl ImageSource for StubImages {
    async fn fetch(&self, url: &str) -> Result<ImageBytes, FetchError> {
      assert!(url.starts_with("https://img.test/m/Title%20"), "{url}");
      match self.0 {
        Upstream::Serves => Ok(ImageBytes {
          bytes:        Bytes::from_static(b"\x89PNG fake"),
          content_type: Some("image/webp".to_string()),
        }),
        Upstream::Fails => Err(FetchError::Status(404)),
        Upstream::Hangs => std::future::pending().await,
      }
    }
  }

  async fn make_state(titles: usize, upstream: Upstream) -> AppState<SqliteStore> {
    make_state_with(titles, upstream, json!({ "token_secret": "test-secret" })).await
  }

  async fn make_state_with(
    titles: usize,
    upstream: Upstream,
    config: Value,
  ) -> AppState<SqliteStore> {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    for n in 0..titles {
      let title = store.insert_title(format!("Title {n}")).await.unwrap();
      store.insert_asset(title.id, "01.png").await.unwrap();
      store.insert_asset(title.id, "02.png").await.unwrap();
    }

    let config: ServerConfig = serde_json::from_value(config).unwrap();
    let tokens: Arc<dyn TokenCodec> =
      Arc::new(JwtCodec::new(config.token_secret.as_bytes(), config.token_ttl()));

    AppState {
      engine:   Arc::new(
        Engine::seeded(store.clone(), Policy::default(), "https://img.test/m", 7).unwrap(),
      ),
      resolver: Arc::new(IdentityResolver::standard(tokens.clone(), store)),
      tokens,
      images:   Arc::new(StubImages(upstream)),
      config:   Arc::new(config),
    }
  }

  fn get(uri: &str) -> axum::http::request::Builder { Request::builder().method("GET").uri(uri) }

  async fn send(
    state: &AppState<SqliteStore>,
    req: axum::http::request::Builder,
  ) -> Response<Body> {
    router(state.clone()).oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
  }

  async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp
      .headers()
      .get_all(header::SET_COOKIE)
      .iter()
      .map(|v| v.to_str().unwrap().to_string())
      .collect()
  }

  /// `name=value` pair of cookie `name` from the response, if set.
  fn cookie_pair(resp: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(resp)
      .into_iter()
      .find(|c| c.starts_with(&format!("{name}=")))
      .and_then(|c| c.split(';').next().map(str::to_string))
  }

  fn bearer(state: &AppState<SqliteStore>, identity: &str) -> String {
    let token = state.tokens.sign(&Identity::parse(identity).unwrap()).unwrap();
    format!("Bearer {token}")
  }

  /// Position of the winning title within a `/random_manga` body.
  async fn winning_index(state: &AppState<SqliteStore>, body: &Value) -> usize {
    let id = body["currentTitleId"].as_i64().unwrap();
    let title = state.engine.store().get_title(id).await.unwrap().unwrap();
    body["mangas"]
      .as_array()
      .unwrap()
      .iter()
      .position(|n| n.as_str() == Some(title.name.as_str()))
      .unwrap()
  }

  #[tokio::test]
  async fn first_round_mints_identity_and_sets_cookies() {
    let state = make_state(5, Upstream::Serves).await;
    let resp = send(&state, get("/random_manga")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let session = cookie_pair(&resp, SESSION_COOKIE).expect("session cookie");
    let token = cookie_pair(&resp, TOKEN_COOKIE).expect("token cookie");
    let cookies = set_cookies(&resp);
    assert!(cookies.iter().all(|c| c.contains("Path=/") && c.contains("HttpOnly")));
    assert!(cookies.iter().all(|c| c.contains("SameSite=Lax")));

    let body = json_body(resp).await;
    assert_eq!(body["mangas"].as_array().unwrap().len(), 4);
    assert!(body["imageUrl"].as_str().unwrap().starts_with("https://img.test/m/"));
    let answer = winning_index(&state, &body).await;

    // Either cookie alone carries the identity to /answer.
    for cookie in [token, session] {
      let resp = send(
        &state,
        get(&format!("/answer?number={answer}")).header(header::COOKIE, cookie.clone()),
      )
      .await;
      assert_eq!(resp.status(), StatusCode::OK, "{cookie}");
      assert_eq!(json_body(resp).await, json!({ "correct": true }));
    }
  }

  #[tokio::test]
  async fn known_identity_is_not_reminted() {
    let state = make_state(5, Upstream::Serves).await;
    let auth = bearer(&state, "u1");
    let resp = send(&state, get("/random_manga").header(header::AUTHORIZATION, auth)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(cookie_pair(&resp, SESSION_COOKIE).is_none());
    assert!(cookie_pair(&resp, TOKEN_COOKIE).is_some());
  }

  #[tokio::test]
  async fn answer_via_bearer_and_query_token() {
    let state = make_state(5, Upstream::Serves).await;
    let auth = bearer(&state, "u1");
    let resp =
      send(&state, get("/random_manga").header(header::AUTHORIZATION, auth.clone())).await;
    let body = json_body(resp).await;
    let answer = winning_index(&state, &body).await;
    let wrong = (answer + 1) % 4;

    let resp = send(
      &state,
      get(&format!("/answer?number={wrong}")).header(header::AUTHORIZATION, auth.clone()),
    )
    .await;
    assert_eq!(json_body(resp).await, json!({ "correct": false }));

    let token = auth.trim_start_matches("Bearer ");
    let resp = send(&state, get(&format!("/answer?number={answer}&token={token}"))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "correct": true }));
  }

  #[tokio::test]
  async fn answer_without_identity_or_round_is_400() {
    let state = make_state(5, Upstream::Serves).await;

    let resp = send(&state, get("/answer?number=0")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      json_body(resp).await,
      json!({ "error": "No active game found, start a new round first" })
    );

    let resp =
      send(&state, get("/answer?number=0").header(header::AUTHORIZATION, bearer(&state, "u2")))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn malformed_answer_is_400() {
    let state = make_state(5, Upstream::Serves).await;
    let auth = bearer(&state, "u1");
    send(&state, get("/random_manga").header(header::AUTHORIZATION, auth.clone())).await;

    let uris = [
      "/answer?number=abc",
      "/answer?number=-1",
      "/answer?number=1&number=2",
      "/answer",
    ];
    for uri in uris {
      let resp = send(&state, get(uri).header(header::AUTHORIZATION, auth.clone())).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
      assert_eq!(json_body(resp).await, json!({ "error": "Invalid number format" }));
    }
  }

  #[tokio::test]
  async fn index_past_last_candidate_is_incorrect() {
    let state = make_state(5, Upstream::Serves).await;
    let auth = bearer(&state, "u1");
    send(&state, get("/random_manga").header(header::AUTHORIZATION, auth.clone())).await;

    let resp = send(&state, get("/answer?number=9").header(header::AUTHORIZATION, auth)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "correct": false }));
  }

  #[tokio::test]
  async fn image_streams_bytes_without_caching() {
    let state = make_state(5, Upstream::Serves).await;
    let auth = bearer(&state, "u1");
    send(&state, get("/random_manga").header(header::AUTHORIZATION, auth.clone())).await;

    let resp = send(&state, get("/image").header(header::AUTHORIZATION, auth)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      resp.headers()[header::CACHE_CONTROL],
      "max-age=0, no-cache, must-revalidate, proxy-revalidate"
    );
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/webp");
    assert!(cookie_pair(&resp, TOKEN_COOKIE).is_some());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG fake");
  }

  #[tokio::test]
  async fn image_without_round_is_400() {
    let state = make_state(5, Upstream::Serves).await;
    let resp =
      send(&state, get("/image").header(header::AUTHORIZATION, bearer(&state, "u1"))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn image_host_failure_is_502() {
    let state = make_state(5, Upstream::Fails).await;
    let auth = bearer(&state, "u1");
    send(&state, get("/random_manga").header(header::AUTHORIZATION, auth.clone())).await;

    let resp = send(&state, get("/image").header(header::AUTHORIZATION, auth)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(resp).await, json!({ "error": "Failed to fetch image" }));
  }

  #[tokio::test]
  async fn stalled_image_host_is_bounded_by_request_timeout() {
    let config = json!({ "token_secret": "test-secret", "request_timeout_secs": 1 });
    let state = make_state_with(5, Upstream::Hangs, config).await;
    let auth = bearer(&state, "u1");
    send(&state, get("/random_manga").header(header::AUTHORIZATION, auth.clone())).await;

    let resp = send(&state, get("/image").header(header::AUTHORIZATION, auth)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await, json!({ "error": "request timed out" }));
  }

  #[tokio::test]
  async fn small_catalog_is_500() {
    let state = make_state(3, Upstream::Serves).await;
    let resp = send(&state, get("/random_manga")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await, json!({ "error": "catalog is misconfigured" }));
  }

  #[tokio::test]
  async fn cors_allows_configured_origin_with_credentials() {
    let state = make_state(5, Upstream::Serves).await;
    let resp = send(
      &state,
      get("/answer?number=0").header(header::ORIGIN, "http://localhost:3000"),
    )
    .await;
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let resp =
      send(&state, get("/answer?number=0").header(header::ORIGIN, "https://evil.test")).await;
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
  }

  #[test]
  fn config_defaults_fill_everything_but_the_secret() {
    let config: ServerConfig = serde_json::from_value(json!({ "token_secret": "s" })).unwrap();
    assert_eq!(config.port, 8080);
    assert_eq!(config.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.token_ttl(), chrono::Duration::days(30));
    assert_eq!(config.policy.candidates_per_round, 4);
    assert!(!config.cookie_secure);

    assert!(serde_json::from_value::<ServerConfig>(json!({})).is_err());
  }
}
