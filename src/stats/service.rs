use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use super::{
    models::{ActiveSnapshot, Counter, FinishedGame, StatsLedger},
    repository::StatsRepository,
    StatsError,
};

/// How many finished games the history keeps. Oldest entries are evicted
/// first.
pub const HISTORY_LIMIT: usize = 10;

/// Durable per-player counters plus the per-match snapshot/diff mechanism.
///
/// Every call is a single read-modify-write transaction against the
/// repository: the mutation is persisted before the call returns, so a crash
/// mid-match loses at most the in-flight call.
pub struct StatsService {
    repository: Arc<dyn StatsRepository>,
    write_lock: AsyncMutex<()>,
}

impl StatsService {
    pub fn new(repository: Arc<dyn StatsRepository>) -> Self {
        Self {
            repository,
            write_lock: AsyncMutex::new(()),
        }
    }

    /// Idempotently creates zero-valued records for any id not yet present.
    pub async fn ensure_players(&self, player_ids: &[String]) -> Result<(), StatsError> {
        self.transact(|ledger| {
            for id in player_ids {
                ledger.ensure_player(id);
            }
            Ok(())
        })
        .await
    }

    /// Applies a signed delta to one named counter, creating the record if
    /// absent.
    #[instrument(skip(self))]
    pub async fn increment(
        &self,
        player_id: &str,
        counter: Counter,
        delta: i64,
    ) -> Result<(), StatsError> {
        self.transact(|ledger| {
            ledger.ensure_player(player_id).apply(counter, delta);
            Ok(())
        })
        .await
    }

    /// Captures every listed player's current counters as the baseline for
    /// `match_id`. Fails if that match already has an open snapshot.
    #[instrument(skip(self, player_ids))]
    pub async fn begin_snapshot(
        &self,
        match_id: &str,
        player_ids: &[String],
    ) -> Result<(), StatsError> {
        self.transact(|ledger| {
            if ledger.meta.active_games.contains_key(match_id) {
                return Err(StatsError::SnapshotAlreadyOpen(match_id.to_string()));
            }

            let mut baseline = BTreeMap::new();
            for id in player_ids {
                baseline.insert(id.clone(), *ledger.ensure_player(id));
            }

            ledger.meta.active_games.insert(
                match_id.to_string(),
                ActiveSnapshot {
                    started_at: Utc::now(),
                    player_ids: player_ids.to_vec(),
                    baseline,
                },
            );
            Ok(())
        })
        .await
    }

    /// Closes the snapshot for `match_id`: computes baseline-to-current
    /// deltas, appends a history entry, and truncates the history to the
    /// most recent [`HISTORY_LIMIT`] entries. A second call for the same
    /// match id is a no-op.
    #[instrument(skip(self))]
    pub async fn end_snapshot(&self, match_id: &str) -> Result<(), StatsError> {
        self.transact(|ledger| {
            let Some(active) = ledger.meta.active_games.remove(match_id) else {
                debug!(match_id, "No open snapshot to close");
                return Ok(());
            };

            let mut players = BTreeMap::new();
            for id in &active.player_ids {
                let current = *ledger.ensure_player(id);
                let baseline = active.baseline.get(id).copied().unwrap_or_default();
                players.insert(id.clone(), current.diff(&baseline));
            }

            ledger.meta.games.push(FinishedGame {
                game_id: match_id.to_string(),
                started_at: active.started_at,
                ended_at: Utc::now(),
                players,
            });

            let len = ledger.meta.games.len();
            if len > HISTORY_LIMIT {
                ledger.meta.games.drain(..len - HISTORY_LIMIT);
            }
            Ok(())
        })
        .await
    }

    /// Discards an open snapshot without recording history. Used when a
    /// match is abandoned rather than completed.
    #[instrument(skip(self))]
    pub async fn cancel_snapshot(&self, match_id: &str) -> Result<(), StatsError> {
        self.transact(|ledger| {
            if ledger.meta.active_games.remove(match_id).is_some() {
                debug!(match_id, "Open snapshot discarded");
            }
            Ok(())
        })
        .await
    }

    pub async fn all_stats(&self) -> Result<StatsLedger, StatsError> {
        self.repository.load().await
    }

    /// Up to `limit` most recent finished games, oldest-first within the
    /// returned window.
    pub async fn recent_games(&self, limit: usize) -> Result<Vec<FinishedGame>, StatsError> {
        let ledger = self.repository.load().await?;
        let games = ledger.meta.games;
        let start = games.len().saturating_sub(limit);
        Ok(games[start..].to_vec())
    }

    async fn transact<T>(
        &self,
        mutate: impl FnOnce(&mut StatsLedger) -> Result<T, StatsError>,
    ) -> Result<T, StatsError> {
        let _guard = self.write_lock.lock().await;
        let mut ledger = self.repository.load().await?;
        let out = mutate(&mut ledger)?;
        self.repository.store(&ledger).await?;
        Ok(out)
    }
}
