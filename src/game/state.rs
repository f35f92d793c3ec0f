use std::collections::{BTreeMap, BTreeSet};

use super::roles::Role;

/// The current stage of a match in one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    #[default]
    PreGame,
    Night,
    Day,
    Ended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightActions {
    pub mafia_target: Option<String>,
    pub doctor_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("A match is already running in this channel")]
    MatchAlreadyRunning,

    #[error("The finished match must be reset before a new one can start")]
    ResetRequired,

    #[error("You already joined")]
    AlreadyJoined,

    #[error("Not enough players to start (minimum {min}, joined {joined})")]
    NotEnoughPlayers { min: usize, joined: usize },

    #[error("No match is running in this channel")]
    NoMatch,

    #[error("That action is only allowed during the {expected} phase")]
    WrongPhase { expected: Phase },

    #[error("Dead players cannot act")]
    ActorDead,

    #[error("That player is already dead")]
    TargetDead,

    #[error("You are not part of an active match")]
    NotInMatch,

    #[error("That role has no night action")]
    NoNightAction,

    #[error("Only the {role} may take that action")]
    WrongRole { role: Role },
}

/// Mutable register for one channel's match: roster, roles, alive set,
/// phase, pending night actions, and the day's votes.
///
/// Every operation completes without suspending, so under the cooperative
/// scheduler each one is atomic; correctness otherwise comes from
/// phase-gated acceptance.
#[derive(Debug, Default)]
pub struct GameState {
    roster: BTreeSet<String>,
    roles: BTreeMap<String, Role>,
    alive: BTreeSet<String>,
    phase: Phase,
    night_actions: NightActions,
    votes: BTreeMap<String, String>,
    current_match_id: Option<String>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn roster(&self) -> &BTreeSet<String> {
        &self.roster
    }

    pub fn roles(&self) -> &BTreeMap<String, Role> {
        &self.roles
    }

    pub fn alive(&self) -> &BTreeSet<String> {
        &self.alive
    }

    pub fn votes(&self) -> &BTreeMap<String, String> {
        &self.votes
    }

    pub fn night_actions(&self) -> &NightActions {
        &self.night_actions
    }

    pub fn current_match_id(&self) -> Option<&str> {
        self.current_match_id.as_deref()
    }

    /// Clears all fields back to an empty `PreGame` register.
    pub fn reset(&mut self) {
        *self = GameState::default();
    }

    /// Adds a player to the pre-game roster.
    pub fn add_to_roster(&mut self, player_id: &str) -> Result<usize, GameError> {
        match self.phase {
            Phase::PreGame => {}
            Phase::Ended => return Err(GameError::ResetRequired),
            _ => return Err(GameError::MatchAlreadyRunning),
        }
        if !self.roster.insert(player_id.to_string()) {
            return Err(GameError::AlreadyJoined);
        }
        Ok(self.roster.len())
    }

    /// Locks the roster into a running match: stores the role mapping, marks
    /// every participant alive, and opens the first night. The roster is
    /// cleared, because a roster only exists before a match starts.
    pub fn begin_match(&mut self, roles: BTreeMap<String, Role>, match_id: String) {
        self.roster.clear();
        self.alive = roles.keys().cloned().collect();
        self.roles = roles;
        self.night_actions = NightActions::default();
        self.votes.clear();
        self.current_match_id = Some(match_id);
        self.phase = Phase::Night;
    }

    /// Resets both night targets. Called once per night, at night start,
    /// never mid-night.
    pub fn clear_night_actions(&mut self) {
        self.night_actions = NightActions::default();
    }

    /// Records the Mafia's chosen victim. Re-targeting before the window
    /// closes overwrites the earlier choice.
    pub fn set_mafia_target(&mut self, target_id: &str) -> Result<(), GameError> {
        self.check_night_target(target_id)?;
        self.night_actions.mafia_target = Some(target_id.to_string());
        Ok(())
    }

    /// Records the Doctor's protected player. Re-targeting overwrites.
    pub fn set_doctor_target(&mut self, target_id: &str) -> Result<(), GameError> {
        self.check_night_target(target_id)?;
        self.night_actions.doctor_target = Some(target_id.to_string());
        Ok(())
    }

    fn check_night_target(&self, target_id: &str) -> Result<(), GameError> {
        if self.phase != Phase::Night {
            return Err(GameError::WrongPhase {
                expected: Phase::Night,
            });
        }
        if !self.alive.contains(target_id) {
            return Err(GameError::TargetDead);
        }
        Ok(())
    }

    /// Records (or re-records) a vote for the current day. Returns the
    /// voter's previous target so the caller can correct the accused
    /// counters.
    pub fn record_vote(
        &mut self,
        voter_id: &str,
        target_id: &str,
    ) -> Result<Option<String>, GameError> {
        if self.phase != Phase::Day {
            return Err(GameError::WrongPhase {
                expected: Phase::Day,
            });
        }
        if !self.alive.contains(voter_id) {
            return Err(GameError::ActorDead);
        }
        if !self.alive.contains(target_id) {
            return Err(GameError::TargetDead);
        }
        Ok(self
            .votes
            .insert(voter_id.to_string(), target_id.to_string()))
    }

    /// Clears the vote map at the start of a day.
    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    /// Moves a player out of the alive set. Idempotent: removing an
    /// already-dead player is a no-op.
    pub fn remove_player(&mut self, player_id: &str) {
        self.alive.remove(player_id);
    }

    /// Takes the match id, leaving `None`. Used to close the stats snapshot
    /// exactly once.
    pub fn take_match_id(&mut self) -> Option<String> {
        self.current_match_id.take()
    }

    /// Living players holding `role`, in the alive set's iteration order
    /// (ascending player id).
    pub fn living_with_role(&self, role: Role) -> Vec<String> {
        self.alive
            .iter()
            .filter(|id| self.roles.get(*id) == Some(&role))
            .cloned()
            .collect()
    }

    pub fn has_living(&self, role: Role) -> bool {
        self.alive
            .iter()
            .any(|id| self.roles.get(id) == Some(&role))
    }

    /// `(mafia_alive, town_alive)` for the win check.
    pub fn faction_counts(&self) -> (usize, usize) {
        let mafia = self.living_with_role(Role::Mafia).len();
        (mafia, self.alive.len() - mafia)
    }
}
