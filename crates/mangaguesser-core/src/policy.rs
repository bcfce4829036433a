//! Tunable windows and limits that drive selection and expiry.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Selection and retention policy.
///
/// Every field has a default, so a partial `[policy]` table in the
/// configuration file only overrides what it names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Policy {
  /// Number of candidate titles dealt per round.
  pub candidates_per_round:    usize,
  /// A title stops being eligible once it has been the answer this often.
  pub offer_limit:             u32,
  pub offer_cooldown_secs:     i64,
  /// Exposure counters older than this are logically reset.
  pub exposure_staleness_secs: i64,
  /// View history older than this is logically absent and gets purged.
  pub view_retention_secs:     i64,
  pub round_ttl_secs:          i64,
  pub session_ttl_secs:        i64,
}

impl Default for Policy {
  fn default() -> Self {
    Self {
      candidates_per_round:    4,
      offer_limit:             3,
      offer_cooldown_secs:     30 * 60,
      exposure_staleness_secs: 30 * 24 * 60 * 60,
      view_retention_secs:     7 * 24 * 60 * 60,
      round_ttl_secs:          24 * 60 * 60,
      session_ttl_secs:        60 * 60,
    }
  }
}

impl Policy {
  pub fn offer_cooldown(&self) -> Duration { Duration::seconds(self.offer_cooldown_secs) }

  pub fn exposure_staleness(&self) -> Duration {
    Duration::seconds(self.exposure_staleness_secs)
  }

  pub fn view_retention(&self) -> Duration { Duration::seconds(self.view_retention_secs) }

  pub fn round_ttl(&self) -> Duration { Duration::seconds(self.round_ttl_secs) }

  pub fn session_ttl(&self) -> Duration { Duration::seconds(self.session_ttl_secs) }

  /// Reject settings the engine cannot deal with.
  pub fn validate(&self) -> Result<(), String> {
    if !(2..=usize::from(u8::MAX)).contains(&self.candidates_per_round) {
      return Err(format!(
        "candidates_per_round must be between 2 and 255, got {}",
        self.candidates_per_round
      ));
    }
    let windows = [
      ("offer_cooldown_secs", self.offer_cooldown_secs),
      ("exposure_staleness_secs", self.exposure_staleness_secs),
      ("view_retention_secs", self.view_retention_secs),
      ("round_ttl_secs", self.round_ttl_secs),
      ("session_ttl_secs", self.session_ttl_secs),
    ];
    for (name, secs) in windows {
      if secs < 0 {
        return Err(format!("{name} must not be negative, got {secs}"));
      }
    }
    Ok(())
  }

  /// The cutoffs that decide title eligibility at `now`.
  pub fn eligibility_at(&self, now: DateTime<Utc>) -> Eligibility {
    Eligibility {
      offer_limit:     self.offer_limit,
      cooldown_cutoff: now - self.offer_cooldown(),
      stale_cutoff:    now - self.exposure_staleness(),
    }
  }

  pub fn view_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> { now - self.view_retention() }

  pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    now - self.exposure_staleness()
  }
}

/// Resolved eligibility filter handed to the store.
///
/// A title is eligible when it has an asset and its exposure for the
/// identity is missing, older than `stale_cutoff`, or both below
/// `offer_limit` and last offered before `cooldown_cutoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
  pub offer_limit:     u32,
  pub cooldown_cutoff: DateTime<Utc>,
  pub stale_cutoff:    DateTime<Utc>,
}
