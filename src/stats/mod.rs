pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

mod errors;

pub use errors::StatsError;
pub use models::{ActiveSnapshot, Counter, FinishedGame, LedgerMeta, PlayerCounters, StatsLedger};
pub use repository::{InMemoryStatsRepository, JsonFileStatsRepository, StatsRepository};
pub use service::{StatsService, HISTORY_LIMIT};
