//! The `GameStore` trait.
//!
//! Implemented by storage backends (e.g. `mangaguesser-store-sqlite`). The
//! engine and the HTTP layer depend on this abstraction, not on any concrete
//! backend.
//!
//! Every write is a single atomic insert-or-update keyed on the record's
//! natural key, so concurrent requests for the same identity can never
//! produce duplicate rows. Reads that take a `now` or cutoff argument treat
//! rows on the wrong side of it as absent, whether or not the sweeper has
//! reclaimed them yet.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  catalog::{ImageAsset, Title, TitleId},
  identity::Identity,
  ledger::{ExposureStat, ViewRecord},
  policy::Eligibility,
  round::{GameRound, WebSession},
};

/// Abstraction over the shared relational store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait GameStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Catalog ───────────────────────────────────────────────────────────

  /// Retrieve a title by id. Returns `None` if not found.
  fn get_title(
    &self,
    id: TitleId,
  ) -> impl Future<Output = Result<Option<Title>, Self::Error>> + Send + '_;

  /// All titles that have at least one image asset.
  fn titles_with_assets(
    &self,
  ) -> impl Future<Output = Result<Vec<Title>, Self::Error>> + Send + '_;

  /// All image assets of a title.
  fn assets_for_title(
    &self,
    title_id: TitleId,
  ) -> impl Future<Output = Result<Vec<ImageAsset>, Self::Error>> + Send + '_;

  // ── Exposure ledger ───────────────────────────────────────────────────

  /// Asset-bearing titles that pass `filter` for `identity`.
  fn eligible_titles<'a>(
    &'a self,
    identity: &'a Identity,
    filter: Eligibility,
  ) -> impl Future<Output = Result<Vec<Title>, Self::Error>> + Send + 'a;

  /// Count one more offer of `title_id` to `identity` at `now`.
  ///
  /// A row last offered before `stale_cutoff` restarts from one.
  fn record_offer<'a>(
    &'a self,
    identity: &'a Identity,
    title_id: TitleId,
    now: DateTime<Utc>,
    stale_cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<ExposureStat, Self::Error>> + Send + 'a;

  fn get_exposure<'a>(
    &'a self,
    identity: &'a Identity,
    title_id: TitleId,
  ) -> impl Future<Output = Result<Option<ExposureStat>, Self::Error>> + Send + 'a;

  /// Assets of `title_id` that `identity` has not been shown since
  /// `retention_cutoff`.
  fn unseen_assets<'a>(
    &'a self,
    identity: &'a Identity,
    title_id: TitleId,
    retention_cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<ImageAsset>, Self::Error>> + Send + 'a;

  /// Count one more view of `asset` by `identity` at `now`.
  ///
  /// A row last shown before `retention_cutoff` restarts from one.
  fn record_view<'a>(
    &'a self,
    identity: &'a Identity,
    asset: &'a ImageAsset,
    now: DateTime<Utc>,
    retention_cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<ViewRecord, Self::Error>> + Send + 'a;

  fn get_view<'a>(
    &'a self,
    identity: &'a Identity,
    asset: &'a ImageAsset,
  ) -> impl Future<Output = Result<Option<ViewRecord>, Self::Error>> + Send + 'a;

  // ── Rounds ────────────────────────────────────────────────────────────

  /// Insert or replace the round for `round.identity`. Last writer wins.
  fn save_round<'a>(
    &'a self,
    round: &'a GameRound,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The identity's round, if one exists and expires after `now`.
  fn load_round<'a>(
    &'a self,
    identity: &'a Identity,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<GameRound>, Self::Error>> + Send + 'a;

  // ── Web sessions ──────────────────────────────────────────────────────

  fn save_session<'a>(
    &'a self,
    session: &'a WebSession,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// The identity stored in a session that expires after `now`.
  fn session_identity<'a>(
    &'a self,
    session_id: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Delete rounds with `expires_at <= now`. Returns the rows removed.
  fn purge_expired_rounds(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete view history shown before `cutoff`. Returns the rows removed.
  fn purge_views_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Zero `times_offered` on exposure rows last offered before `cutoff`.
  /// Returns the rows reset.
  fn reset_exposure_before(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Delete web sessions with `expires_at <= now`. Returns the rows removed.
  fn purge_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
