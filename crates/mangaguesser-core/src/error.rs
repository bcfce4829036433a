//! Error types for `mangaguesser-core`.

use thiserror::Error;

use crate::catalog::TitleId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no verifiable identity presented")]
  NoIdentity,

  #[error("catalog has {available} asset-bearing titles, need {needed}")]
  InsufficientCatalog { available: usize, needed: usize },

  #[error("title {0} has no image assets")]
  NoAssetsForTitle(TitleId),

  #[error("no active round")]
  NoActiveRound,

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("invalid policy: {0}")]
  InvalidPolicy(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a backend error into [`Error::Store`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
