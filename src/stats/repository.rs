use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use super::{models::StatsLedger, StatsError};

/// Persistence boundary for the stats ledger. The ledger is read and written
/// as a whole on every mutation, so each service call is one
/// read-modify-write transaction.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn load(&self) -> Result<StatsLedger, StatsError>;
    async fn store(&self, ledger: &StatsLedger) -> Result<(), StatsError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStatsRepository {
    ledger: Arc<RwLock<StatsLedger>>,
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(RwLock::new(StatsLedger::default())),
        }
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn load(&self) -> Result<StatsLedger, StatsError> {
        Ok(self.ledger.read().await.clone())
    }

    async fn store(&self, ledger: &StatsLedger) -> Result<(), StatsError> {
        *self.ledger.write().await = ledger.clone();
        Ok(())
    }
}

/// Ledger stored as a single JSON file. A missing or unreadable file loads
/// as an empty ledger, so a corrupt file costs history but never takes the
/// server down.
#[derive(Debug)]
pub struct JsonFileStatsRepository {
    path: PathBuf,
}

impl JsonFileStatsRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatsRepository for JsonFileStatsRepository {
    async fn load(&self) -> Result<StatsLedger, StatsError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StatsLedger::default());
            }
            Err(err) => return Err(StatsError::Persistence(err.to_string())),
        };

        match serde_json::from_slice(&raw) {
            Ok(ledger) => Ok(ledger),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "Stats file unreadable, starting from an empty ledger");
                Ok(StatsLedger::default())
            }
        }
    }

    async fn store(&self, ledger: &StatsLedger) -> Result<(), StatsError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| StatsError::Persistence(err.to_string()))?;
        }

        let raw = serde_json::to_vec_pretty(ledger)
            .map_err(|err| StatsError::Persistence(err.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|err| StatsError::Persistence(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::models::Counter;

    #[tokio::test]
    async fn in_memory_round_trip() {
        let repo = InMemoryStatsRepository::new();

        let mut ledger = repo.load().await.unwrap();
        ledger.ensure_player("alice").apply(Counter::GamesPlayed, 2);
        repo.store(&ledger).await.unwrap();

        let back = repo.load().await.unwrap();
        assert_eq!(back.players.get("alice").unwrap().games_played, 2);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileStatsRepository::new(dir.path().join("stats.json"));

        let ledger = repo.load().await.unwrap();
        assert!(ledger.players.is_empty());
        assert!(ledger.meta.games.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let repo = JsonFileStatsRepository::new(&path);
        let ledger = repo.load().await.unwrap();
        assert!(ledger.players.is_empty());
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("stats.json");
        let repo = JsonFileStatsRepository::new(&path);

        let mut ledger = repo.load().await.unwrap();
        ledger.ensure_player("bob").apply(Counter::TimesKilled, 1);
        repo.store(&ledger).await.unwrap();

        let back = repo.load().await.unwrap();
        assert_eq!(back.players.get("bob").unwrap().times_killed, 1);
    }
}
