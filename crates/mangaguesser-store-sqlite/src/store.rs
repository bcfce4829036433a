//! [`SqliteStore`]: the SQLite implementation of [`GameStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use mangaguesser_core::{
  catalog::{ImageAsset, Title, TitleId},
  identity::Identity,
  ledger::{ExposureStat, ViewRecord},
  policy::Eligibility,
  round::{GameRound, WebSession},
  store::GameStore,
};

use crate::{
  Result,
  encode::{RawExposure, RawRound, RawView, decode_identity, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A game store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. All access
/// is serialised on the connection's thread, and every write is a single
/// statement, so concurrent requests for one identity cannot interleave
/// inside an upsert.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-statement write that reports affected rows.
  async fn execute_counting(&self, sql: &'static str, arg: String) -> Result<u64> {
    let rows = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![arg])?))
      .await?;
    Ok(rows as u64)
  }

  async fn query_titles(
    &self,
    sql: &'static str,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Title>> {
    let titles = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(Title { id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(titles)
  }

  async fn query_assets(
    &self,
    sql: &'static str,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<ImageAsset>> {
    let assets = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok(ImageAsset { title_id: row.get(0)?, asset_name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(assets)
  }
}

fn text(s: impl Into<String>) -> rusqlite::types::Value { rusqlite::types::Value::Text(s.into()) }

fn int(n: i64) -> rusqlite::types::Value { rusqlite::types::Value::Integer(n) }

// ─── GameStore impl ──────────────────────────────────────────────────────────

impl GameStore for SqliteStore {
  type Error = crate::Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn get_title(&self, id: TitleId) -> Result<Option<Title>> {
    let title = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT title_id, name FROM titles WHERE title_id = ?1",
            rusqlite::params![id],
            |row| Ok(Title { id: row.get(0)?, name: row.get(1)? }),
          )
          .optional()?)
      })
      .await?;
    Ok(title)
  }

  async fn titles_with_assets(&self) -> Result<Vec<Title>> {
    self
      .query_titles(
        "SELECT t.title_id, t.name
         FROM titles t
         WHERE EXISTS (SELECT 1 FROM images i WHERE i.title_id = t.title_id)
         ORDER BY t.title_id",
        vec![],
      )
      .await
  }

  async fn assets_for_title(&self, title_id: TitleId) -> Result<Vec<ImageAsset>> {
    self
      .query_assets(
        "SELECT title_id, asset_name FROM images WHERE title_id = ?1 ORDER BY asset_name",
        vec![int(title_id)],
      )
      .await
  }

  // ── Exposure ledger ───────────────────────────────────────────────────────

  async fn eligible_titles(&self, identity: &Identity, filter: Eligibility) -> Result<Vec<Title>> {
    self
      .query_titles(
        "SELECT t.title_id, t.name
         FROM titles t
         LEFT JOIN exposure_stats e
           ON e.title_id = t.title_id AND e.identity = ?1
         WHERE EXISTS (SELECT 1 FROM images i WHERE i.title_id = t.title_id)
           AND (e.title_id IS NULL
                OR e.last_offered_at < ?4
                OR (e.times_offered < ?2 AND e.last_offered_at < ?3))
         ORDER BY t.title_id",
        vec![
          text(identity.as_str()),
          int(i64::from(filter.offer_limit)),
          text(encode_dt(filter.cooldown_cutoff)),
          text(encode_dt(filter.stale_cutoff)),
        ],
      )
      .await
  }

  async fn record_offer(
    &self,
    identity:     &Identity,
    title_id:     TitleId,
    now:          DateTime<Utc>,
    stale_cutoff: DateTime<Utc>,
  ) -> Result<ExposureStat> {
    let identity_str = identity.as_str().to_owned();
    let now_str      = encode_dt(now);
    let stale_str    = encode_dt(stale_cutoff);

    let raw: RawExposure = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO exposure_stats (identity, title_id, times_offered, last_offered_at)
           VALUES (?1, ?2, 1, ?3)
           ON CONFLICT (identity, title_id) DO UPDATE SET
             times_offered   = CASE WHEN exposure_stats.last_offered_at < ?4
                                    THEN 1
                                    ELSE exposure_stats.times_offered + 1 END,
             last_offered_at = excluded.last_offered_at
           RETURNING identity, title_id, times_offered, last_offered_at",
          rusqlite::params![identity_str, title_id, now_str, stale_str],
          |row| {
            Ok(RawExposure {
              identity:        row.get(0)?,
              title_id:        row.get(1)?,
              times_offered:   row.get(2)?,
              last_offered_at: row.get(3)?,
            })
          },
        )?)
      })
      .await?;

    raw.into_stat()
  }

  async fn get_exposure(
    &self,
    identity: &Identity,
    title_id: TitleId,
  ) -> Result<Option<ExposureStat>> {
    let identity_str = identity.as_str().to_owned();

    let raw: Option<RawExposure> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT identity, title_id, times_offered, last_offered_at
             FROM exposure_stats WHERE identity = ?1 AND title_id = ?2",
            rusqlite::params![identity_str, title_id],
            |row| {
              Ok(RawExposure {
                identity:        row.get(0)?,
                title_id:        row.get(1)?,
                times_offered:   row.get(2)?,
                last_offered_at: row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawExposure::into_stat).transpose()
  }

  async fn unseen_assets(
    &self,
    identity:         &Identity,
    title_id:         TitleId,
    retention_cutoff: DateTime<Utc>,
  ) -> Result<Vec<ImageAsset>> {
    self
      .query_assets(
        "SELECT i.title_id, i.asset_name
         FROM images i
         LEFT JOIN view_history v
           ON  v.identity   = ?1
           AND v.title_id   = i.title_id
           AND v.asset_name = i.asset_name
           AND v.shown_at  >= ?3
         WHERE i.title_id = ?2
           AND (v.view_count IS NULL OR v.view_count < 1)
         ORDER BY i.asset_name",
        vec![text(identity.as_str()), int(title_id), text(encode_dt(retention_cutoff))],
      )
      .await
  }

  async fn record_view(
    &self,
    identity:         &Identity,
    asset:            &ImageAsset,
    now:              DateTime<Utc>,
    retention_cutoff: DateTime<Utc>,
  ) -> Result<ViewRecord> {
    let identity_str = identity.as_str().to_owned();
    let title_id     = asset.title_id;
    let asset_name   = asset.asset_name.clone();
    let now_str      = encode_dt(now);
    let cutoff_str   = encode_dt(retention_cutoff);

    let raw: RawView = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "INSERT INTO view_history (identity, title_id, asset_name, view_count, shown_at)
           VALUES (?1, ?2, ?3, 1, ?4)
           ON CONFLICT (identity, title_id, asset_name) DO UPDATE SET
             view_count = CASE WHEN view_history.shown_at < ?5
                               THEN 1
                               ELSE view_history.view_count + 1 END,
             shown_at   = excluded.shown_at
           RETURNING identity, title_id, asset_name, view_count, shown_at",
          rusqlite::params![identity_str, title_id, asset_name, now_str, cutoff_str],
          |row| {
            Ok(RawView {
              identity:   row.get(0)?,
              title_id:   row.get(1)?,
              asset_name: row.get(2)?,
              view_count: row.get(3)?,
              shown_at:   row.get(4)?,
            })
          },
        )?)
      })
      .await?;

    raw.into_record()
  }

  async fn get_view(&self, identity: &Identity, asset: &ImageAsset) -> Result<Option<ViewRecord>> {
    let identity_str = identity.as_str().to_owned();
    let title_id     = asset.title_id;
    let asset_name   = asset.asset_name.clone();

    let raw: Option<RawView> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT identity, title_id, asset_name, view_count, shown_at
             FROM view_history
             WHERE identity = ?1 AND title_id = ?2 AND asset_name = ?3",
            rusqlite::params![identity_str, title_id, asset_name],
            |row| {
              Ok(RawView {
                identity:   row.get(0)?,
                title_id:   row.get(1)?,
                asset_name: row.get(2)?,
                view_count: row.get(3)?,
                shown_at:   row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawView::into_record).transpose()
  }

  // ── Rounds ────────────────────────────────────────────────────────────────

  async fn save_round(&self, round: &GameRound) -> Result<()> {
    let identity_str  = round.identity.as_str().to_owned();
    let title_id      = round.winning_title_id;
    let winning_index = i64::from(round.winning_index);
    let created_str   = encode_dt(round.created_at);
    let expires_str   = encode_dt(round.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO rounds (identity, winning_title_id, winning_index, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (identity) DO UPDATE SET
             winning_title_id = excluded.winning_title_id,
             winning_index    = excluded.winning_index,
             created_at       = excluded.created_at,
             expires_at       = excluded.expires_at",
          rusqlite::params![identity_str, title_id, winning_index, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load_round(&self, identity: &Identity, now: DateTime<Utc>) -> Result<Option<GameRound>> {
    let identity_str = identity.as_str().to_owned();
    let now_str      = encode_dt(now);

    let raw: Option<RawRound> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT identity, winning_title_id, winning_index, created_at, expires_at
             FROM rounds WHERE identity = ?1 AND expires_at > ?2",
            rusqlite::params![identity_str, now_str],
            |row| {
              Ok(RawRound {
                identity:         row.get(0)?,
                winning_title_id: row.get(1)?,
                winning_index:    row.get(2)?,
                created_at:       row.get(3)?,
                expires_at:       row.get(4)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRound::into_round).transpose()
  }

  // ── Web sessions ──────────────────────────────────────────────────────────

  async fn save_session(&self, session: &WebSession) -> Result<()> {
    let session_id   = session.session_id.clone();
    let identity_str = session.identity.as_str().to_owned();
    let created_str  = encode_dt(session.created_at);
    let expires_str  = encode_dt(session.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO web_sessions (session_id, identity, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (session_id) DO UPDATE SET
             identity   = excluded.identity,
             expires_at = excluded.expires_at",
          rusqlite::params![session_id, identity_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn session_identity(
    &self,
    session_id: &str,
    now: DateTime<Utc>,
  ) -> Result<Option<Identity>> {
    let session_id = session_id.to_owned();
    let now_str    = encode_dt(now);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT identity FROM web_sessions WHERE session_id = ?1 AND expires_at > ?2",
            rusqlite::params![session_id, now_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.map(decode_identity).transpose()
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  async fn purge_expired_rounds(&self, now: DateTime<Utc>) -> Result<u64> {
    self
      .execute_counting("DELETE FROM rounds WHERE expires_at <= ?1", encode_dt(now))
      .await
  }

  async fn purge_views_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    self
      .execute_counting("DELETE FROM view_history WHERE shown_at < ?1", encode_dt(cutoff))
      .await
  }

  async fn reset_exposure_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
    self
      .execute_counting(
        "UPDATE exposure_stats SET times_offered = 0
         WHERE last_offered_at < ?1 AND times_offered > 0",
        encode_dt(cutoff),
      )
      .await
  }

  async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    self
      .execute_counting("DELETE FROM web_sessions WHERE expires_at <= ?1", encode_dt(now))
      .await
  }
}
