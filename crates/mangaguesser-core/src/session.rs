//! Round persistence and answer checking.
//!
//! The answer key lives only in the store, keyed by identity, so any
//! process sharing that store observes the latest round.

use chrono::{DateTime, Utc};

use crate::{
  Engine, Error, Result,
  catalog::TitleId,
  identity::Identity,
  round::GameRound,
  store::GameStore,
};

impl<S: GameStore> Engine<S> {
  /// Persist the answer key for `identity`, replacing any previous round.
  pub async fn save_round(
    &self,
    identity: &Identity,
    winning_title_id: TitleId,
    winning_index: u8,
  ) -> Result<GameRound> {
    self.save_round_at(identity, winning_title_id, winning_index, Utc::now()).await
  }

  pub async fn save_round_at(
    &self,
    identity: &Identity,
    winning_title_id: TitleId,
    winning_index: u8,
    now: DateTime<Utc>,
  ) -> Result<GameRound> {
    let round = GameRound {
      identity: identity.clone(),
      winning_title_id,
      winning_index,
      created_at: now,
      expires_at: now + self.policy().round_ttl(),
    };
    self.store().save_round(&round).await.map_err(Error::store)?;
    Ok(round)
  }

  /// The identity's live round, or [`Error::NoActiveRound`].
  pub async fn load_round(&self, identity: &Identity) -> Result<GameRound> {
    self.load_round_at(identity, Utc::now()).await
  }

  pub async fn load_round_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<GameRound> {
    self
      .store()
      .load_round(identity, now)
      .await
      .map_err(Error::store)?
      .filter(|r| r.is_live_at(now))
      .ok_or(Error::NoActiveRound)
  }

  /// Compare a submitted answer against the live round.
  ///
  /// Read-only: the round stays live, so repeated submissions get the same
  /// verdict.
  pub async fn check_answer(&self, identity: &Identity, submitted: &str) -> Result<bool> {
    self.check_answer_at(identity, submitted, Utc::now()).await
  }

  pub async fn check_answer_at(
    &self,
    identity: &Identity,
    submitted: &str,
    now: DateTime<Utc>,
  ) -> Result<bool> {
    let round = self.load_round_at(identity, now).await?;
    let index = parse_answer(submitted)?;
    Ok(index == round.winning_index)
  }

  /// Pick a fresh image for the identity's live round.
  ///
  /// Every call draws again, so the asset need not match the one shown when
  /// the round was dealt.
  pub async fn fetch_image_url(&self, identity: &Identity) -> Result<String> {
    let now = Utc::now();
    let round = self.load_round_at(identity, now).await?;
    self.select_image_at(identity, round.winning_title_id, now).await
  }
}

/// Parse a submitted candidate index.
///
/// Only the shape is checked. An index past the last candidate is a valid
/// guess that can never match.
pub fn parse_answer(raw: &str) -> Result<u8> {
  raw
    .trim()
    .parse()
    .map_err(|_| Error::InvalidInput(format!("not a candidate index: {raw:?}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_in_range_indices() {
    assert_eq!(parse_answer("0").unwrap(), 0);
    assert_eq!(parse_answer(" 3 ").unwrap(), 3);
  }

  #[test]
  fn rejects_malformed_input() {
    for raw in ["", "abc", "-1", "1.5", "999", "0x1"] {
      assert!(matches!(parse_answer(raw), Err(Error::InvalidInput(_))), "{raw:?}");
    }
  }

  #[test]
  fn accepts_index_past_last_candidate() {
    assert_eq!(parse_answer("9").unwrap(), 9);
    assert_eq!(parse_answer("255").unwrap(), 255);
  }
}
