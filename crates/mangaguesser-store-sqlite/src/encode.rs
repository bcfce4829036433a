//! Encoding and decoding helpers between domain types and the plain values
//! stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision, so lexical comparison in SQL agrees with time order.

use chrono::{DateTime, SecondsFormat, Utc};
use mangaguesser_core::{
  identity::Identity,
  ledger::{ExposureStat, ViewRecord},
  round::GameRound,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Identity ────────────────────────────────────────────────────────────────

pub fn decode_identity(s: String) -> Result<Identity> {
  Identity::parse(s).ok_or_else(|| Error::InvalidRow("blank identity".to_string()))
}

fn decode_count(n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::InvalidRow(format!("count out of range: {n}")))
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// Raw row from the `exposure_stats` table.
pub struct RawExposure {
  pub identity:        String,
  pub title_id:        i64,
  pub times_offered:   i64,
  pub last_offered_at: String,
}

impl RawExposure {
  pub fn into_stat(self) -> Result<ExposureStat> {
    Ok(ExposureStat {
      identity:        decode_identity(self.identity)?,
      title_id:        self.title_id,
      times_offered:   decode_count(self.times_offered)?,
      last_offered_at: decode_dt(&self.last_offered_at)?,
    })
  }
}

/// Raw row from the `view_history` table.
pub struct RawView {
  pub identity:   String,
  pub title_id:   i64,
  pub asset_name: String,
  pub view_count: i64,
  pub shown_at:   String,
}

impl RawView {
  pub fn into_record(self) -> Result<ViewRecord> {
    Ok(ViewRecord {
      identity:   decode_identity(self.identity)?,
      title_id:   self.title_id,
      asset_name: self.asset_name,
      view_count: decode_count(self.view_count)?,
      shown_at:   decode_dt(&self.shown_at)?,
    })
  }
}

/// Raw row from the `rounds` table.
pub struct RawRound {
  pub identity:         String,
  pub winning_title_id: i64,
  pub winning_index:    i64,
  pub created_at:       String,
  pub expires_at:       String,
}

impl RawRound {
  pub fn into_round(self) -> Result<GameRound> {
    let winning_index = u8::try_from(self.winning_index).map_err(|_| {
      Error::InvalidRow(format!("winning index out of range: {}", self.winning_index))
    })?;
    Ok(GameRound {
      identity: decode_identity(self.identity)?,
      winning_title_id: self.winning_title_id,
      winning_index,
      created_at: decode_dt(&self.created_at)?,
      expires_at: decode_dt(&self.expires_at)?,
    })
  }
}
