// Public API
pub use engine::{EngineConfig, PhaseEngine, Winner};
pub use manager::{MatchManager, VoteReceipt, MIN_PLAYERS};
pub use roles::{RandomRoleAllocator, Role, RoleAllocator};
pub use state::{GameError, GameState, NightActions, Phase};
pub use tally::{tally_votes, TallyOutcome};

pub mod handlers;

// Internal modules
mod engine;
mod manager;
mod roles;
mod state;
mod tally;
