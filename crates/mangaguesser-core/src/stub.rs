//! In-memory [`GameStore`] double for unit tests.
//!
//! The catalog, the round save and the maintenance passes are scripted.
//! Everything else panics, so a test that reaches the ledger, sessions or
//! round reads by accident fails loudly.

use chrono::{DateTime, Utc};

use crate::{
  catalog::{ImageAsset, Title, TitleId},
  identity::Identity,
  ledger::{ExposureStat, ViewRecord},
  policy::Eligibility,
  round::{GameRound, WebSession},
  store::GameStore,
};

#[derive(Debug, thiserror::Error)]
#[error("stub store failure")]
pub(crate) struct StubError;

/// Scripted outcome of one maintenance pass.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Pass {
  Rows(u64),
  Fails,
  Hangs,
}

impl Pass {
  async fn run(self) -> Result<u64, StubError> {
    match self {
      Self::Rows(n) => Ok(n),
      Self::Fails => Err(StubError),
      Self::Hangs => std::future::pending().await,
    }
  }
}

#[derive(Debug, Clone)]
pub(crate) struct StubStore {
  /// Served as both the eligible and the full title list.
  pub titles:           Vec<Title>,
  pub round_save_fails: bool,
  pub rounds:           Pass,
  pub views:            Pass,
  pub exposure:         Pass,
  pub sessions:         Pass,
}

impl Default for StubStore {
  fn default() -> Self {
    Self {
      titles:           Vec::new(),
      round_save_fails: false,
      rounds:           Pass::Rows(0),
      views:            Pass::Rows(0),
      exposure:         Pass::Rows(0),
      sessions:         Pass::Rows(0),
    }
  }
}

impl GameStore for StubStore {
  type Error = StubError;

  async fn get_title(&self, _: TitleId) -> Result<Option<Title>, StubError> {
    unimplemented!()
  }

  async fn titles_with_assets(&self) -> Result<Vec<Title>, StubError> {
    Ok(self.titles.clone())
  }

  async fn assets_for_title(&self, _: TitleId) -> Result<Vec<ImageAsset>, StubError> {
    unimplemented!()
  }

  async fn eligible_titles(
    &self,
    _: &Identity,
    _: Eligibility,
  ) -> Result<Vec<Title>, StubError> {
    Ok(self.titles.clone())
  }

  async fn record_offer(
    &self,
    _: &Identity,
    _: TitleId,
    _: DateTime<Utc>,
    _: DateTime<Utc>,
  ) -> Result<ExposureStat, StubError> {
    unimplemented!()
  }

  async fn get_exposure(
    &self,
    _: &Identity,
    _: TitleId,
  ) -> Result<Option<ExposureStat>, StubError> {
    unimplemented!()
  }

  async fn unseen_assets(
    &self,
    _: &Identity,
    _: TitleId,
    _: DateTime<Utc>,
  ) -> Result<Vec<ImageAsset>, StubError> {
    unimplemented!()
  }

  async fn record_view(
    &self,
    _: &Identity,
    _: &ImageAsset,
    _: DateTime<Utc>,
    _: DateTime<Utc>,
  ) -> Result<ViewRecord, StubError> {
    unimplemented!()
  }

  async fn get_view(
    &self,
    _: &Identity,
    _: &ImageAsset,
  ) -> Result<Option<ViewRecord>, StubError> {
    unimplemented!()
  }

  async fn save_round(&self, _: &GameRound) -> Result<(), StubError> {
    if self.round_save_fails { Err(StubError) } else { Ok(()) }
  }

  async fn load_round(
    &self,
    _: &Identity,
    _: DateTime<Utc>,
  ) -> Result<Option<GameRound>, StubError> {
    unimplemented!()
  }

  async fn save_session(&self, _: &WebSession) -> Result<(), StubError> { unimplemented!() }

  async fn session_identity(
    &self,
    _: &str,
    _: DateTime<Utc>,
  ) -> Result<Option<Identity>, StubError> {
    unimplemented!()
  }

  async fn purge_expired_rounds(&self, _: DateTime<Utc>) -> Result<u64, StubError> {
    self.rounds.run().await
  }

  async fn purge_views_before(&self, _: DateTime<Utc>) -> Result<u64, StubError> {
    self.views.run().await
  }

  async fn reset_exposure_before(&self, _: DateTime<Utc>) -> Result<u64, StubError> {
    self.exposure.run().await
  }

  async fn purge_expired_sessions(&self, _: DateTime<Utc>) -> Result<u64, StubError> {
    self.sessions.run().await
  }
}
