//! Periodic reclamation of expired and stale rows.
//!
//! Every read already treats these rows as absent, so a missed sweep only
//! costs storage. Each pass is independent: one failing or timing out does
//! not stop the others.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::{policy::Policy, store::GameStore};

/// Rows touched by one sweep. `None` marks a pass that failed or timed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub rounds_purged:   Option<u64>,
  pub views_purged:    Option<u64>,
  pub exposures_reset: Option<u64>,
  pub sessions_purged: Option<u64>,
}

pub struct Sweeper<S> {
  store:        Arc<S>,
  policy:       Policy,
  interval:     Duration,
  pass_timeout: Duration,
}

impl<S> Sweeper<S>
where
  S: GameStore + 'static,
{
  pub fn new(store: Arc<S>, policy: Policy, interval: Duration, pass_timeout: Duration) -> Self {
    Self { store, policy, interval, pass_timeout }
  }

  /// Run every pass once against `now`.
  pub async fn run_once(&self, now: DateTime<Utc>) -> SweepReport {
    SweepReport {
      rounds_purged:   self.pass("expired rounds", self.store.purge_expired_rounds(now)).await,
      views_purged:    self
        .pass("view history", self.store.purge_views_before(self.policy.view_cutoff(now)))
        .await,
      exposures_reset: self
        .pass("stale exposure", self.store.reset_exposure_before(self.policy.stale_cutoff(now)))
        .await,
      sessions_purged: self.pass("expired sessions", self.store.purge_expired_sessions(now)).await,
    }
  }

  async fn pass<F, E>(&self, name: &'static str, work: F) -> Option<u64>
  where
    F: Future<Output = Result<u64, E>>,
    E: std::fmt::Display,
  {
    match tokio::time::timeout(self.pass_timeout, work).await {
      Ok(Ok(rows)) => {
        tracing::debug!(pass = name, rows, "sweep pass finished");
        Some(rows)
      }
      Ok(Err(e)) => {
        tracing::warn!(pass = name, error = %e, "sweep pass failed, skipping");
        None
      }
      Err(_) => {
        tracing::warn!(pass = name, timeout = ?self.pass_timeout, "sweep pass timed out, skipping");
        None
      }
    }
  }

  /// Spawn the sweeper loop. The first sweep runs immediately; the loop
  /// exits once `shutdown` resolves.
  pub fn spawn(self, shutdown: impl Future<Output = ()> + Send + 'static) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(self.interval);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      tokio::pin!(shutdown);
      loop {
        tokio::select! {
          _ = &mut shutdown => {
            tracing::debug!("sweeper stopping");
            break;
          }
          _ = ticker.tick() => {
            let report = self.run_once(Utc::now()).await;
            tracing::info!(?report, "maintenance sweep complete");
          }
        }
      }
    })
  }
}
