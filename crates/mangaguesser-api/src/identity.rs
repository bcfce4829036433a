//! Credential carriers on the wire: signed tokens, cookies, sessions.
//!
//! Resolution order itself lives in [`mangaguesser_core::identity`]; this
//! module only lifts raw credentials off the request, issues tokens, and
//! writes the cookies that carry them back.

use std::convert::Infallible;

use axum::{
  extract::{FromRequestParts, Query},
  http::{HeaderMap, HeaderValue, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mangaguesser_core::{
  Identity,
  identity::{Credentials, TokenCodec, TokenError},
  round::WebSession,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOKEN_COOKIE: &str = "mangaguesser_token";
pub const SESSION_COOKIE: &str = "mangaguesser_session";
pub const TOKEN_QUERY_PARAM: &str = "token";

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  sub: String,
  iat: i64,
  exp: i64,
}

/// HS256 JSON Web Tokens carrying the identity in `sub`.
pub struct JwtCodec {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
  ttl:        Duration,
}

impl JwtCodec {
  pub fn new(secret: &[u8], ttl: Duration) -> Self {
    Self {
      encoding:   EncodingKey::from_secret(secret),
      decoding:   DecodingKey::from_secret(secret),
      validation: Validation::default(),
      ttl,
    }
  }

  pub fn ttl(&self) -> Duration { self.ttl }
}

impl TokenCodec for JwtCodec {
  fn sign(&self, identity: &Identity) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
      sub: identity.as_str().to_owned(),
      iat: now.timestamp(),
      exp: (now + self.ttl).timestamp(),
    };
    encode(&Header::default(), &claims, &self.encoding).map_err(|e| TokenError(e.to_string()))
  }

  fn verify(&self, token: &str) -> Result<Identity, TokenError> {
    let data = decode::<Claims>(token, &self.decoding, &self.validation)
      .map_err(|e| TokenError(e.to_string()))?;
    Identity::parse(data.claims.sub).ok_or_else(|| TokenError("empty subject".to_string()))
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
  token: Option<String>,
}

/// Raw credentials carried by a request. Never rejects: missing or
/// malformed carriers simply come through as `None`.
pub struct RequestCredentials(pub Credentials);

impl<St> FromRequestParts<St> for RequestCredentials
where
  St: Send + Sync,
{
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
    let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
      .map(|Query(q)| q)
      .unwrap_or_default();

    Ok(Self(Credentials {
      authorization: parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned),
      query_token:   query.token,
      cookie_token:  cookie_value(&parts.headers, TOKEN_COOKIE),
      session_id:    cookie_value(&parts.headers, SESSION_COOKIE),
    }))
  }
}

/// Find cookie `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, _)| *k == name)
    .map(|(_, v)| v.trim_matches('"').to_owned())
}

// ─── Minting and cookies ─────────────────────────────────────────────────────

/// A fresh random identity.
pub fn mint_identity() -> Identity {
  // A hyphenated v4 UUID is never blank.
  Identity::parse(Uuid::new_v4().to_string()).unwrap_or_else(|| unreachable!())
}

/// A new server-side session for `identity`.
pub fn new_session(identity: &Identity, ttl: Duration) -> WebSession {
  let now = Utc::now();
  WebSession {
    session_id: Uuid::new_v4().to_string(),
    identity:   identity.clone(),
    created_at: now,
    expires_at: now + ttl,
  }
}

/// `Set-Cookie` value for an HttpOnly, same-site cookie.
pub fn set_cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> Option<HeaderValue> {
  let mut cookie = format!(
    "{name}={value}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
    max_age.num_seconds().max(0)
  );
  if secure {
    cookie.push_str("; Secure");
  }
  HeaderValue::from_str(&cookie).ok()
}
