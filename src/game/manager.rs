use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, Notify, RwLock};
use uuid::Uuid;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::chat::ChatGateway;
use crate::stats::{Counter, StatsService};

use super::{
    engine::{EngineConfig, PhaseEngine},
    roles::{Role, RoleAllocator},
    state::{GameError, GameState, Phase},
};

/// Minimum roster size for a match to start.
pub const MIN_PLAYERS: usize = 3;

/// Returned to a voter so the command layer can acknowledge the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub votes_cast: usize,
    pub alive: usize,
}

/// One channel's match: the shared state register, the wake signal for the
/// engine's windows, and the engine task itself. The engine task is the
/// only long-lived writer; command handlers mutate state in short lock
/// sections and signal `wake`.
struct ChannelMatch {
    state: Arc<AsyncMutex<GameState>>,
    wake: Arc<Notify>,
    engine_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl ChannelMatch {
    fn new() -> Self {
        Self {
            state: Arc::new(AsyncMutex::new(GameState::new())),
            wake: Arc::new(Notify::new()),
            engine_task: AsyncMutex::new(None),
        }
    }
}

/// Coordinator owning every live match, keyed by channel id. Each channel
/// runs at most one match at a time; different channels run independently.
pub struct MatchManager {
    matches: RwLock<HashMap<String, Arc<ChannelMatch>>>,
    gateway: Arc<dyn ChatGateway>,
    stats: Arc<StatsService>,
    allocator: Arc<dyn RoleAllocator>,
    config: EngineConfig,
}

impl MatchManager {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        stats: Arc<StatsService>,
        allocator: Arc<dyn RoleAllocator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            gateway,
            stats,
            allocator,
            config,
        }
    }

    /// Adds a player to a channel's pre-game roster. Returns the roster
    /// size after joining.
    #[instrument(skip(self))]
    pub async fn join(&self, channel_id: &str, player_id: &str) -> Result<usize, GameError> {
        let entry = self.channel(channel_id).await;
        let players = entry.state.lock().await.add_to_roster(player_id)?;
        info!(channel_id, player_id, players, "Player joined the roster");
        Ok(players)
    }

    /// Locks the roster, assigns roles, opens the stats snapshot, deals the
    /// role DMs, and spawns the phase engine. Returns the new match id.
    #[instrument(skip(self))]
    pub async fn start_match(&self, channel_id: &str) -> Result<String, GameError> {
        let entry = self.channel(channel_id).await;

        let (roles, match_id, player_ids) = {
            let mut state = entry.state.lock().await;
            match state.phase() {
                Phase::PreGame => {}
                Phase::Ended => return Err(GameError::ResetRequired),
                _ => return Err(GameError::MatchAlreadyRunning),
            }

            let joined = state.roster().len();
            if joined < MIN_PLAYERS {
                return Err(GameError::NotEnoughPlayers {
                    min: MIN_PLAYERS,
                    joined,
                });
            }

            let roles = self.allocator.assign(state.roster());
            let match_id = format!("g_{}", Uuid::new_v4());
            state.begin_match(roles.clone(), match_id.clone());

            let player_ids: Vec<String> = roles.keys().cloned().collect();
            (roles, match_id, player_ids)
        };

        if let Err(err) = self.stats.ensure_players(&player_ids).await {
            error!(%err, channel_id, "Failed to seed stats records");
        }
        for (id, role) in &roles {
            self.bump(id, Counter::GamesPlayed, 1).await;
            self.bump(id, Counter::for_role(*role), 1).await;
        }
        if let Err(err) = self.stats.begin_snapshot(&match_id, &player_ids).await {
            error!(%err, match_id, "Failed to open stats snapshot");
        }

        self.post(
            channel_id,
            format!(
                "The match begins with {} players. Roles have been assigned; \
                 check your messages for your role.",
                player_ids.len()
            ),
        )
        .await;
        self.deal_role_dms(&roles).await;

        let engine = PhaseEngine::new(
            channel_id.to_string(),
            entry.state.clone(),
            entry.wake.clone(),
            self.gateway.clone(),
            self.stats.clone(),
            self.config.clone(),
        );
        *entry.engine_task.lock().await = Some(tokio::spawn(engine.run()));

        info!(channel_id, match_id, players = player_ids.len(), "Match started");
        Ok(match_id)
    }

    /// Records (or re-records) a day vote, applying the counter accounting
    /// contract: a player's first vote of the day counts once toward their
    /// own tally; changing targets moves one accused count from the old
    /// target to the new; re-voting the same target changes nothing.
    #[instrument(skip(self))]
    pub async fn cast_vote(
        &self,
        channel_id: &str,
        voter_id: &str,
        target_id: &str,
    ) -> Result<VoteReceipt, GameError> {
        let entry = self.existing(channel_id).await.ok_or(GameError::NoMatch)?;

        let (previous, votes_cast, alive) = {
            let mut state = entry.state.lock().await;
            let previous = state.record_vote(voter_id, target_id)?;
            (previous, state.votes().len(), state.alive().len())
        };
        entry.wake.notify_waiters();

        match previous {
            None => {
                self.bump(voter_id, Counter::TimesVoted, 1).await;
                self.bump(target_id, Counter::TimesVotedAgainst, 1).await;
            }
            Some(prev) if prev != target_id => {
                // Same-day correction: the only place a counter goes down.
                self.bump(&prev, Counter::TimesVotedAgainst, -1).await;
                self.bump(target_id, Counter::TimesVotedAgainst, 1).await;
            }
            Some(_) => {}
        }

        self.post(
            channel_id,
            format!("{voter_id} has cast a vote. ({votes_cast}/{alive} votes cast)"),
        )
        .await;

        Ok(VoteReceipt { votes_cast, alive })
    }

    /// Records a night target on behalf of a role holder. Re-submitting
    /// before the window closes overwrites the earlier choice.
    #[instrument(skip(self))]
    pub async fn submit_night_action(
        &self,
        channel_id: &str,
        role: Role,
        actor_id: &str,
        target_id: &str,
    ) -> Result<(), GameError> {
        let entry = self.existing(channel_id).await.ok_or(GameError::NoMatch)?;

        {
            let mut state = entry.state.lock().await;
            if !state.alive().contains(actor_id) {
                return Err(GameError::ActorDead);
            }
            if state.roles().get(actor_id) != Some(&role) {
                return Err(GameError::WrongRole { role });
            }
            match role {
                Role::Mafia => state.set_mafia_target(target_id)?,
                Role::Doctor => state.set_doctor_target(target_id)?,
                Role::Civilian => return Err(GameError::NoNightAction),
            }
        }
        entry.wake.notify_waiters();
        Ok(())
    }

    /// A player's own role in the channel's active match.
    pub async fn player_role(&self, channel_id: &str, player_id: &str) -> Result<Role, GameError> {
        let entry = self.existing(channel_id).await.ok_or(GameError::NotInMatch)?;
        let state = entry.state.lock().await;
        state
            .roles()
            .get(player_id)
            .copied()
            .ok_or(GameError::NotInMatch)
    }

    /// Abandons whatever is happening in a channel: aborts the engine task,
    /// cancels the open stats snapshot, and forgets the match. Safe to call
    /// at any time, including when nothing is running.
    #[instrument(skip(self))]
    pub async fn reset(&self, channel_id: &str) {
        let Some(entry) = self.matches.write().await.remove(channel_id) else {
            return;
        };

        if let Some(task) = entry.engine_task.lock().await.take() {
            task.abort();
        }

        // An abandoned match must not show up as a finished game.
        let match_id = entry.state.lock().await.take_match_id();
        if let Some(match_id) = match_id {
            if let Err(err) = self.stats.cancel_snapshot(&match_id).await {
                error!(%err, match_id, "Failed to cancel stats snapshot");
            }
        }

        info!(channel_id, "Match reset");
        self.post(channel_id, "The game has been reset.").await;
    }

    /// Current phase of a channel's match, if the channel has one.
    pub async fn phase(&self, channel_id: &str) -> Option<Phase> {
        let entry = self.existing(channel_id).await?;
        let phase = entry.state.lock().await.phase();
        Some(phase)
    }

    async fn deal_role_dms(&self, roles: &std::collections::BTreeMap<String, Role>) {
        let mut failed = 0usize;
        for (player_id, role) in roles {
            let content = format!(
                "Your role: {role}\n\n\
                 Do not reveal your role to other players."
            );
            if self.gateway.send_direct(player_id, &content).await.is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(failed, "Some role DMs could not be delivered");
        }
    }

    async fn channel(&self, channel_id: &str) -> Arc<ChannelMatch> {
        {
            let matches = self.matches.read().await;
            if let Some(entry) = matches.get(channel_id) {
                return entry.clone();
            }
        }

        let mut matches = self.matches.write().await;
        matches
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(ChannelMatch::new()))
            .clone()
    }

    async fn existing(&self, channel_id: &str) -> Option<Arc<ChannelMatch>> {
        self.matches.read().await.get(channel_id).cloned()
    }

    async fn post(&self, channel_id: &str, content: impl Into<String>) {
        if let Err(err) = self.gateway.send_message(channel_id, &content.into()).await {
            warn!(%err, channel_id, "Failed to send channel message");
        }
    }

    async fn bump(&self, player_id: &str, counter: Counter, delta: i64) {
        if let Err(err) = self.stats.increment(player_id, counter, delta).await {
            error!(%err, player_id, %counter, "Failed to update stats");
        }
    }
}
