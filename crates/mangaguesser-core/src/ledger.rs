//! Exposure ledger records.
//!
//! Both record kinds are keyed by their natural key and written with
//! insert-or-update semantics; the store never holds duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{catalog::TitleId, identity::Identity};

/// How often a title was the winning answer dealt to an identity.
///
/// Unique on `(identity, title_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureStat {
  pub identity:        Identity,
  pub title_id:        TitleId,
  pub times_offered:   u32,
  pub last_offered_at: DateTime<Utc>,
}

/// How often a specific asset was shown to an identity.
///
/// Unique on `(identity, title_id, asset_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRecord {
  pub identity:   Identity,
  pub title_id:   TitleId,
  pub asset_name: String,
  pub view_count: u32,
  pub shown_at:   DateTime<Utc>,
}
