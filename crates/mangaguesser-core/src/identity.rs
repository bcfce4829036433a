//! Identity resolution across credential carriers.
//!
//! A request may carry its player's identity in several places at once. Each
//! place is a [`CredentialExtractor`]; the [`IdentityResolver`] tries them in
//! a fixed priority order and the first one that yields an identity wins.
//! Resolution never mints: when nothing resolves, the caller decides whether
//! to start a fresh identity.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::{Error, Result, store::GameStore};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque, stable player identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
  /// Wrap a raw identifier, rejecting blank strings.
  pub fn parse(raw: impl Into<String>) -> Option<Self> {
    let raw = raw.into();
    if raw.trim().is_empty() { None } else { Some(Self(raw)) }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Carriers ────────────────────────────────────────────────────────────────

/// Raw credential material lifted off a request by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
  /// Full `Authorization` header value.
  pub authorization: Option<String>,
  /// Signed token passed as a query parameter.
  pub query_token:   Option<String>,
  /// Signed token passed as a cookie.
  pub cookie_token:  Option<String>,
  /// Server-side session id passed as a cookie.
  pub session_id:    Option<String>,
}

/// Outcome of asking one carrier for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
  Found(Identity),
  /// The carrier was not present on the request.
  Absent,
  /// The carrier was present but failed verification.
  Rejected(String),
}

/// One way of turning [`Credentials`] into an [`Identity`].
#[async_trait]
pub trait CredentialExtractor: Send + Sync {
  /// Short carrier name used in logs.
  fn name(&self) -> &'static str;

  /// Inspect `creds`. Returns `Err` only for infrastructure failures (e.g.
  /// the store is unreachable), never for a bad credential.
  async fn try_resolve(&self, creds: &Credentials) -> Result<Attempt>;
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// A token could not be issued or did not verify.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{0}")]
pub struct TokenError(pub String);

/// Signs identities into bearer tokens and verifies them back.
///
/// `verify` folds the signature and expiry checks together.
pub trait TokenCodec: Send + Sync {
  fn sign(&self, identity: &Identity) -> std::result::Result<String, TokenError>;
  fn verify(&self, token: &str) -> std::result::Result<Identity, TokenError>;
}

/// Where a [`TokenExtractor`] looks for its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
  /// `Authorization: Bearer <token>`
  BearerHeader,
  QueryParam,
  Cookie,
}

/// Carrier for signed tokens, parameterised by where the token travels.
pub struct TokenExtractor {
  source: TokenSource,
  codec:  Arc<dyn TokenCodec>,
}

impl TokenExtractor {
  pub fn new(source: TokenSource, codec: Arc<dyn TokenCodec>) -> Self {
    Self { source, codec }
  }

  fn raw_token<'c>(&self, creds: &'c Credentials) -> Option<std::result::Result<&'c str, String>> {
    match self.source {
      TokenSource::BearerHeader => creds.authorization.as_deref().map(|h| {
        h.strip_prefix("Bearer ")
          .map(str::trim)
          .ok_or_else(|| "authorization header is not a bearer credential".to_string())
      }),
      TokenSource::QueryParam => creds.query_token.as_deref().map(Ok),
      TokenSource::Cookie => creds.cookie_token.as_deref().map(Ok),
    }
  }
}

#[async_trait]
impl CredentialExtractor for TokenExtractor {
  fn name(&self) -> &'static str {
    match self.source {
      TokenSource::BearerHeader => "bearer",
      TokenSource::QueryParam => "query-token",
      TokenSource::Cookie => "cookie-token",
    }
  }

  async fn try_resolve(&self, creds: &Credentials) -> Result<Attempt> {
    let token = match self.raw_token(creds) {
      None => return Ok(Attempt::Absent),
      Some(Err(reason)) => return Ok(Attempt::Rejected(reason)),
      Some(Ok(t)) if t.is_empty() => return Ok(Attempt::Absent),
      Some(Ok(t)) => t,
    };
    Ok(match self.codec.verify(token) {
      Ok(identity) => Attempt::Found(identity),
      Err(reason) => Attempt::Rejected(reason.to_string()),
    })
  }
}

// ─── Server-side session ─────────────────────────────────────────────────────

/// Carrier that looks the session cookie up in the store.
pub struct SessionExtractor<S> {
  store: Arc<S>,
}

impl<S> SessionExtractor<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }
}

#[async_trait]
impl<S> CredentialExtractor for SessionExtractor<S>
where
  S: GameStore + 'static,
{
  fn name(&self) -> &'static str { "session" }

  async fn try_resolve(&self, creds: &Credentials) -> Result<Attempt> {
    let Some(session_id) = creds.session_id.as_deref().filter(|s| !s.is_empty()) else {
      return Ok(Attempt::Absent);
    };
    let found = self
      .store
      .session_identity(session_id, Utc::now())
      .await
      .map_err(Error::store)?;
    Ok(match found {
      Some(identity) => Attempt::Found(identity),
      None => Attempt::Rejected("unknown or expired session".to_string()),
    })
  }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Ordered chain of carriers; the first [`Attempt::Found`] wins.
pub struct IdentityResolver {
  extractors: Vec<Box<dyn CredentialExtractor>>,
}

impl IdentityResolver {
  pub fn new(extractors: Vec<Box<dyn CredentialExtractor>>) -> Self { Self { extractors } }

  /// The standard chain: bearer header, query token, cookie token, session.
  pub fn standard<S>(codec: Arc<dyn TokenCodec>, store: Arc<S>) -> Self
  where
    S: GameStore + 'static,
  {
    Self::new(vec![
      Box::new(TokenExtractor::new(TokenSource::BearerHeader, codec.clone())),
      Box::new(TokenExtractor::new(TokenSource::QueryParam, codec.clone())),
      Box::new(TokenExtractor::new(TokenSource::Cookie, codec)),
      Box::new(SessionExtractor::new(store)),
    ])
  }

  /// Resolve `creds` to an identity, or [`Error::NoIdentity`].
  pub async fn resolve(&self, creds: &Credentials) -> Result<Identity> {
    for extractor in &self.extractors {
      match extractor.try_resolve(creds).await? {
        Attempt::Found(identity) => {
          tracing::trace!(carrier = extractor.name(), %identity, "identity resolved");
          return Ok(identity);
        }
        Attempt::Absent => {
          tracing::trace!(carrier = extractor.name(), "carrier absent");
        }
        Attempt::Rejected(reason) => {
          tracing::debug!(carrier = extractor.name(), %reason, "carrier rejected");
        }
      }
    }
    Err(Error::NoIdentity)
  }
}
