// Library crate for the Mafia game server
// This file exposes the public API for integration tests

pub mod chat;
pub mod config;
pub mod game;
pub mod shared;
pub mod stats;

// Re-export commonly used types for easier access in tests
pub use chat::{ChatEvent, ChatGateway, EventBus, EventBusGateway, MessageHandle};
pub use game::{
    EngineConfig, GameError, MatchManager, Phase, RandomRoleAllocator, Role, RoleAllocator,
};
pub use shared::{AppError, AppState};
pub use stats::{
    Counter, InMemoryStatsRepository, JsonFileStatsRepository, StatsLedger, StatsService,
};
