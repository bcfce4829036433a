//! Round records: the persisted answer key and what a caller gets back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{catalog::TitleId, identity::Identity};

/// The answer key of the most recent round dealt to an identity.
///
/// At most one live round exists per identity; saving a new one replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRound {
  pub identity:         Identity,
  pub winning_title_id: TitleId,
  pub winning_index:    u8,
  pub created_at:       DateTime<Utc>,
  pub expires_at:       DateTime<Utc>,
}

impl GameRound {
  pub fn is_live_at(&self, now: DateTime<Utc>) -> bool { self.expires_at > now }
}

/// A freshly dealt round as handed to the caller.
///
/// `candidates` is in the order the caller must present; `winning_index`
/// points into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealtRound {
  pub candidates:       Vec<String>,
  pub winning_index:    u8,
  pub winning_title_id: TitleId,
  pub image_url:        String,
}

/// Server-side session record naming the identity behind a session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSession {
  pub session_id: String,
  pub identity:   Identity,
  pub created_at: DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}
