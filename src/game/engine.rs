use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::chat::{ChatGateway, MessageHandle};
use crate::stats::{Counter, StatsService};

use super::{
    state::{GameState, Phase},
    tally::{tally_votes, TallyOutcome},
    Role,
};

/// Phase window and pause durations. Defaults match the classic pacing;
/// tests shrink them to milliseconds.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long the Mafia and Doctor have to act each night.
    pub night_window: Duration,
    /// How long voting stays open each day.
    pub day_window: Duration,
    /// Dramatic pause between announcements.
    pub narrative_pause: Duration,
    /// Pause between closing the vote and announcing the result.
    pub tally_pause: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            night_window: Duration::from_secs(30),
            day_window: Duration::from_secs(60),
            narrative_pause: Duration::from_secs(3),
            tally_pause: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Civilians,
    Mafia,
}

enum NightOutcome {
    Saved {
        doctor: Option<String>,
    },
    Killed {
        victim: String,
        victim_role: Option<Role>,
        credited: Option<String>,
        responsible: Option<String>,
    },
    Quiet,
}

/// Drives one match through the Night -> Day alternation until a faction
/// wins. Runs as its own task; command handlers interleave by mutating the
/// shared [`GameState`] and signalling `wake`.
///
/// Windows are event-driven: each has a deadline and an early-exit
/// predicate that is re-evaluated whenever a command signals `wake`, so the
/// engine reacts to the last required action immediately instead of on a
/// poll tick.
pub struct PhaseEngine {
    channel_id: String,
    state: Arc<AsyncMutex<GameState>>,
    wake: Arc<Notify>,
    gateway: Arc<dyn ChatGateway>,
    stats: Arc<StatsService>,
    config: EngineConfig,
}

impl PhaseEngine {
    pub fn new(
        channel_id: String,
        state: Arc<AsyncMutex<GameState>>,
        wake: Arc<Notify>,
        gateway: Arc<dyn ChatGateway>,
        stats: Arc<StatsService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            channel_id,
            state,
            wake,
            gateway,
            stats,
            config,
        }
    }

    pub async fn run(self) {
        info!(channel_id = %self.channel_id, "Match loop started");
        loop {
            self.run_night().await;
            if let Some(winner) = self.resolve_night().await {
                return self.finish(winner).await;
            }

            match self.run_day().await {
                Some(winner) => return self.finish(winner).await,
                None => {
                    self.post("The sun sets. Prepare for the next night.").await;
                    tokio::time::sleep(self.config.narrative_pause).await;
                }
            }
        }
    }

    /// Opens the night and waits until every living required role has a
    /// target. If the window elapses with a required role missing, the
    /// night restarts with previously-set targets intact, so a role that
    /// already acted never loses its choice to someone else stalling.
    async fn run_night(&self) {
        {
            let mut state = self.state.lock().await;
            state.set_phase(Phase::Night);
            // Targets reset once per night, at night start, never mid-night.
            state.clear_night_actions();
        }

        self.post("Night falls on the village.").await;

        loop {
            let timer_msg = self
                .post(format!(
                    "The Mafia and Doctor have {} seconds to act.",
                    self.config.night_window.as_secs()
                ))
                .await;

            let all_acted = self
                .wait_window(self.config.night_window, |state| {
                    let mafia_due = state.has_living(Role::Mafia)
                        && state.night_actions().mafia_target.is_none();
                    let doctor_due = state.has_living(Role::Doctor)
                        && state.night_actions().doctor_target.is_none();
                    !mafia_due && !doctor_due
                })
                .await;

            if all_acted {
                self.delete(timer_msg).await;
                return;
            }

            let (mafia_failed, doctor_failed) = {
                let state = self.state.lock().await;
                (
                    state.has_living(Role::Mafia) && state.night_actions().mafia_target.is_none(),
                    state.has_living(Role::Doctor) && state.night_actions().doctor_target.is_none(),
                )
            };
            let slacker = match (mafia_failed, doctor_failed) {
                (true, true) => "Both parties",
                (true, false) => "The Mafia",
                _ => "The Doctor",
            };

            self.post(format!(
                "{slacker} failed to act. The night is resetting. Targets are saved."
            ))
            .await;
            tokio::time::sleep(self.config.narrative_pause).await;
            self.delete(timer_msg).await;
        }
    }

    /// Applies the night's targets, credits kill/save stats, and evaluates
    /// the win condition.
    async fn resolve_night(&self) -> Option<Winner> {
        self.post("The sun begins to rise.").await;
        tokio::time::sleep(self.config.narrative_pause).await;

        let outcome = {
            let mut state = self.state.lock().await;
            let actions = state.night_actions().clone();

            match actions.mafia_target {
                Some(target) if Some(&target) == actions.doctor_target.as_ref() => {
                    // Credit one living Doctor. Policy with multiple
                    // doctors: the first in the alive set's iteration order.
                    NightOutcome::Saved {
                        doctor: state.living_with_role(Role::Doctor).into_iter().next(),
                    }
                }
                Some(victim) => {
                    let victim_role = state.roles().get(&victim).copied();
                    // Credited killer is picked before the removal, the
                    // member named in the victim's DM after it.
                    let credited = state.living_with_role(Role::Mafia).into_iter().next();
                    state.remove_player(&victim);
                    let responsible = state.living_with_role(Role::Mafia).into_iter().next();
                    NightOutcome::Killed {
                        victim,
                        victim_role,
                        credited,
                        responsible,
                    }
                }
                None => NightOutcome::Quiet,
            }
        };

        match outcome {
            NightOutcome::Saved { doctor } => {
                if let Some(doctor) = doctor {
                    self.bump(&doctor, Counter::SavesAsDoctor, 1).await;
                }
                self.post(
                    "The Mafia attacked last night, but the Doctor saved the victim. No one died.",
                )
                .await;
            }
            NightOutcome::Killed {
                victim,
                victim_role,
                credited,
                responsible,
            } => {
                self.bump(&victim, Counter::TimesKilled, 1).await;
                if let Some(mafia) = credited {
                    self.bump(&mafia, Counter::KillsAsMafia, 1).await;
                }

                let killer = responsible.unwrap_or_else(|| "Unknown".to_string());
                self.dm(
                    &victim,
                    format!(
                        "You were killed during the night.\n\n\
                         The Mafia member responsible was: {killer}"
                    ),
                )
                .await;

                let role = victim_role.map(|r| r.to_string()).unwrap_or_default();
                self.post(format!("{victim} was found dead. They were the {role}."))
                    .await;
            }
            NightOutcome::Quiet => {
                self.post("A quiet night. Nothing happened.").await;
            }
        }

        self.evaluate_win().await
    }

    /// Runs days until one produces an elimination: a day with no votes or
    /// a tied tally restarts, it does not end the match.
    async fn run_day(&self) -> Option<Winner> {
        loop {
            {
                let mut state = self.state.lock().await;
                state.set_phase(Phase::Day);
                // Old votes must not leak into a new day.
                state.clear_votes();
            }

            let voting_msg = self
                .post(format!(
                    "Day Phase begins.\n\
                     Players discuss and vote to identify the Mafia.\n\
                     Voting closes in {} seconds.",
                    self.config.day_window.as_secs()
                ))
                .await;

            self.wait_window(self.config.day_window, |state| {
                !state.alive().is_empty() && state.votes().len() == state.alive().len()
            })
            .await;

            self.edit(&voting_msg, "Voting has closed. Processing votes.")
                .await;
            tokio::time::sleep(self.config.tally_pause).await;

            let resolution = {
                let mut state = self.state.lock().await;
                match tally_votes(state.votes()) {
                    TallyOutcome::Eliminated(target) => {
                        let role = state.roles().get(&target).copied();
                        state.remove_player(&target);
                        Some((target, role))
                    }
                    TallyOutcome::Tie => None,
                    TallyOutcome::NoVotes => {
                        drop(state);
                        self.post("No one voted. Voting again.").await;
                        continue;
                    }
                }
            };

            let Some((eliminated, role)) = resolution else {
                self.post("It is a tie. Vote again.").await;
                tokio::time::sleep(self.config.narrative_pause).await;
                continue;
            };

            self.bump(&eliminated, Counter::TimesVotedOut, 1).await;
            let role = role.map(|r| r.to_string()).unwrap_or_default();
            self.post(format!(
                "By majority vote, {eliminated} has been eliminated. They were the {role}."
            ))
            .await;

            return self.evaluate_win().await;
        }
    }

    async fn evaluate_win(&self) -> Option<Winner> {
        let (mafia_alive, town_alive) = self.state.lock().await.faction_counts();

        if mafia_alive == 0 {
            Some(Winner::Civilians)
        } else if mafia_alive >= town_alive {
            Some(Winner::Mafia)
        } else {
            None
        }
    }

    /// Ends the match: marks it no longer running, closes the stats
    /// snapshot, then announces the winner. Taking the match id makes the
    /// snapshot close exactly once.
    async fn finish(&self, winner: Winner) {
        let match_id = {
            let mut state = self.state.lock().await;
            state.set_phase(Phase::Ended);
            state.take_match_id()
        };

        if let Some(match_id) = match_id {
            if let Err(err) = self.stats.end_snapshot(&match_id).await {
                error!(%err, match_id, "Failed to close stats snapshot");
            }
        }

        let announcement = match winner {
            Winner::Civilians => "Civilians win. All Mafia members have been eliminated.",
            Winner::Mafia => "Mafia wins. They have taken over the village.",
        };
        self.post(announcement).await;
        info!(channel_id = %self.channel_id, ?winner, "Match finished");
    }

    /// Waits until `predicate` holds or `window` elapses. Returns the final
    /// predicate value. Re-checks whenever a command signals `wake`; the
    /// notified future is created before each check so a signal can never
    /// slip between check and wait.
    async fn wait_window(
        &self,
        window: Duration,
        predicate: impl Fn(&GameState) -> bool,
    ) -> bool {
        let deadline = Instant::now() + window;
        loop {
            let woken = self.wake.notified();
            if predicate(&*self.state.lock().await) {
                return true;
            }
            if tokio::time::timeout_at(deadline, woken).await.is_err() {
                return predicate(&*self.state.lock().await);
            }
        }
    }

    async fn post(&self, content: impl Into<String>) -> Option<MessageHandle> {
        match self
            .gateway
            .send_message(&self.channel_id, &content.into())
            .await
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(%err, channel_id = %self.channel_id, "Failed to send channel message");
                None
            }
        }
    }

    async fn edit(&self, handle: &Option<MessageHandle>, content: &str) {
        if let Some(handle) = handle {
            if let Err(err) = self.gateway.edit_message(handle, content).await {
                warn!(%err, "Failed to edit channel message");
            }
        }
    }

    async fn delete(&self, handle: Option<MessageHandle>) {
        if let Some(handle) = handle {
            if let Err(err) = self.gateway.delete_message(&handle).await {
                warn!(%err, "Failed to delete channel message");
            }
        }
    }

    async fn dm(&self, player_id: &str, content: String) {
        if let Err(err) = self.gateway.send_direct(player_id, &content).await {
            warn!(%err, player_id, "Failed to deliver direct message");
        }
    }

    async fn bump(&self, player_id: &str, counter: Counter, delta: i64) {
        if let Err(err) = self.stats.increment(player_id, counter, delta).await {
            error!(%err, player_id, %counter, "Failed to update stats");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{FailingGateway, RecordingGateway};
    use crate::stats::InMemoryStatsRepository;
    use std::collections::BTreeMap;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            night_window: Duration::from_secs(30),
            day_window: Duration::from_secs(60),
            narrative_pause: Duration::from_millis(10),
            tally_pause: Duration::from_millis(10),
        }
    }

    struct Harness {
        state: Arc<AsyncMutex<GameState>>,
        wake: Arc<Notify>,
        stats: Arc<StatsService>,
    }

    impl Harness {
        async fn start(
            players: &[(&str, Role)],
            gateway: Arc<dyn ChatGateway>,
        ) -> (Self, tokio::task::JoinHandle<()>) {
            let stats = Arc::new(StatsService::new(Arc::new(InMemoryStatsRepository::new())));
            let ids: Vec<String> = players.iter().map(|(id, _)| id.to_string()).collect();
            stats.begin_snapshot("g_test", &ids).await.unwrap();

            let roles: BTreeMap<String, Role> = players
                .iter()
                .map(|(id, role)| (id.to_string(), *role))
                .collect();
            let mut game_state = GameState::new();
            game_state.begin_match(roles, "g_test".to_string());

            let state = Arc::new(AsyncMutex::new(game_state));
            let wake = Arc::new(Notify::new());
            let engine = PhaseEngine::new(
                "village".to_string(),
                state.clone(),
                wake.clone(),
                gateway,
                stats.clone(),
                fast_config(),
            );
            let task = tokio::spawn(engine.run());

            (Self { state, wake, stats }, task)
        }

        async fn wait_for_phase(&self, phase: Phase) {
            loop {
                if self.state.lock().await.phase() == phase {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        async fn night_action(&self, role: Role, target: &str) {
            let mut state = self.state.lock().await;
            match role {
                Role::Mafia => state.set_mafia_target(target).unwrap(),
                Role::Doctor => state.set_doctor_target(target).unwrap(),
                Role::Civilian => panic!("civilians have no night action"),
            }
            drop(state);
            self.wake.notify_waiters();
        }

        async fn vote(&self, voter: &str, target: &str) {
            self.state.lock().await.record_vote(voter, target).unwrap();
            self.wake.notify_waiters();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn night_kill_can_end_the_match_for_mafia() {
        let gateway = Arc::new(RecordingGateway::new());
        let (harness, task) = Harness::start(
            &[
                ("carol", Role::Civilian),
                ("dana", Role::Doctor),
                ("mallory", Role::Mafia),
            ],
            gateway.clone(),
        )
        .await;

        harness.night_action(Role::Mafia, "carol").await;
        harness.night_action(Role::Doctor, "dana").await;

        task.await.unwrap();

        let state = harness.state.lock().await;
        assert_eq!(state.phase(), Phase::Ended);
        assert!(!state.alive().contains("carol"));

        let ledger = harness.stats.all_stats().await.unwrap();
        assert_eq!(ledger.players.get("carol").unwrap().times_killed, 1);
        assert_eq!(ledger.players.get("mallory").unwrap().kills_as_mafia, 1);
        // Snapshot closed exactly once on the win path.
        assert!(ledger.meta.active_games.is_empty());
        assert_eq!(ledger.meta.games.len(), 1);

        let posted = gateway.posted().await;
        assert!(posted.iter().any(|m| m.contains("was found dead")));
        assert!(posted.iter().any(|m| m.contains("Mafia wins")));

        let dms = gateway.direct_to("carol").await;
        assert_eq!(dms.len(), 1);
        assert!(dms[0].contains("mallory"));
    }

    #[tokio::test(start_paused = true)]
    async fn doctor_save_then_day_vote_ends_for_civilians() {
        let gateway = Arc::new(RecordingGateway::new());
        let (harness, task) = Harness::start(
            &[
                ("carol", Role::Civilian),
                ("dana", Role::Doctor),
                ("mallory", Role::Mafia),
            ],
            gateway.clone(),
        )
        .await;

        // Doctor guesses right: nobody dies.
        harness.night_action(Role::Mafia, "carol").await;
        harness.night_action(Role::Doctor, "carol").await;

        harness.wait_for_phase(Phase::Day).await;
        harness.vote("carol", "mallory").await;
        harness.vote("dana", "mallory").await;
        harness.vote("mallory", "carol").await;

        task.await.unwrap();

        let state = harness.state.lock().await;
        assert_eq!(state.phase(), Phase::Ended);
        assert_eq!(state.alive().len(), 2);

        let ledger = harness.stats.all_stats().await.unwrap();
        assert_eq!(ledger.players.get("dana").unwrap().saves_as_doctor, 1);
        assert_eq!(ledger.players.get("mallory").unwrap().times_voted_out, 1);

        let posted = gateway.posted().await;
        assert!(posted.iter().any(|m| m.contains("the Doctor saved the victim")));
        assert!(posted.iter().any(|m| m.contains("Civilians win")));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_doctor_restarts_night_without_clearing_mafia_target() {
        let gateway = Arc::new(RecordingGateway::new());
        let (harness, task) = Harness::start(
            &[
                ("carol", Role::Civilian),
                ("dana", Role::Doctor),
                ("mallory", Role::Mafia),
            ],
            gateway.clone(),
        )
        .await;

        harness.night_action(Role::Mafia, "carol").await;

        // Three full windows elapse with the Doctor silent.
        tokio::time::sleep(Duration::from_secs(95)).await;

        {
            let state = harness.state.lock().await;
            assert_eq!(state.phase(), Phase::Night);
            assert_eq!(
                state.night_actions().mafia_target.as_deref(),
                Some("carol")
            );
        }

        let posted = gateway.posted().await;
        assert!(posted
            .iter()
            .any(|m| m.contains("The Doctor failed to act")));

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn no_votes_restarts_the_day() {
        let gateway = Arc::new(RecordingGateway::new());
        let (harness, task) = Harness::start(
            &[
                ("bob", Role::Civilian),
                ("carol", Role::Civilian),
                ("dana", Role::Doctor),
                ("erin", Role::Civilian),
                ("mallory", Role::Mafia),
            ],
            gateway.clone(),
        )
        .await;

        harness.night_action(Role::Mafia, "bob").await;
        harness.night_action(Role::Doctor, "dana").await;

        harness.wait_for_phase(Phase::Day).await;

        // Let the first day expire with no votes, then vote mallory out.
        tokio::time::sleep(Duration::from_secs(61)).await;
        for voter in ["carol", "dana", "erin", "mallory"] {
            harness.vote(voter, "mallory").await;
        }

        task.await.unwrap();

        let posted = gateway.posted().await;
        assert!(posted.iter().any(|m| m.contains("No one voted")));
        assert!(posted.iter().any(|m| m.contains("Civilians win")));
    }

    #[tokio::test(start_paused = true)]
    async fn tied_vote_forces_a_revote() {
        let gateway = Arc::new(RecordingGateway::new());
        let (harness, task) = Harness::start(
            &[
                ("bob", Role::Civilian),
                ("carol", Role::Civilian),
                ("dana", Role::Doctor),
                ("erin", Role::Civilian),
                ("mallory", Role::Mafia),
            ],
            gateway.clone(),
        )
        .await;

        harness.night_action(Role::Mafia, "bob").await;
        harness.night_action(Role::Doctor, "dana").await;

        harness.wait_for_phase(Phase::Day).await;
        harness.vote("carol", "erin").await;
        harness.vote("erin", "carol").await;
        tokio::time::sleep(Duration::from_secs(61)).await;

        // The revote converges on the Mafia.
        for voter in ["carol", "dana", "erin", "mallory"] {
            harness.vote(voter, "mallory").await;
        }

        task.await.unwrap();

        let posted = gateway.posted().await;
        assert!(posted.iter().any(|m| m.contains("It is a tie")));
        assert!(posted.iter().any(|m| m.contains("Civilians win")));
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_failures_never_stall_the_match() {
        let (harness, task) = Harness::start(
            &[
                ("carol", Role::Civilian),
                ("dana", Role::Doctor),
                ("mallory", Role::Mafia),
            ],
            Arc::new(FailingGateway),
        )
        .await;

        harness.night_action(Role::Mafia, "carol").await;
        harness.night_action(Role::Doctor, "dana").await;

        task.await.unwrap();

        assert_eq!(harness.state.lock().await.phase(), Phase::Ended);
    }
}
