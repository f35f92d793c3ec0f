use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::game::Role;

/// Names of the lifetime counters tracked per player.
///
/// The string form matches the keys used in the ledger file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "camelCase")]
pub enum Counter {
    GamesPlayed,
    TimesVoted,
    TimesVotedAgainst,
    TimesVotedOut,
    TimesKilled,
    KillsAsMafia,
    SavesAsDoctor,
    RoleMafia,
    RoleDoctor,
    RoleCivilian,
}

impl Counter {
    pub const ALL: [Counter; 10] = [
        Counter::GamesPlayed,
        Counter::TimesVoted,
        Counter::TimesVotedAgainst,
        Counter::TimesVotedOut,
        Counter::TimesKilled,
        Counter::KillsAsMafia,
        Counter::SavesAsDoctor,
        Counter::RoleMafia,
        Counter::RoleDoctor,
        Counter::RoleCivilian,
    ];

    /// The "times played as" counter for a role.
    pub fn for_role(role: Role) -> Counter {
        match role {
            Role::Mafia => Counter::RoleMafia,
            Role::Doctor => Counter::RoleDoctor,
            Role::Civilian => Counter::RoleCivilian,
        }
    }
}

/// Lifetime counters for one player. Also used as the per-match delta shape,
/// since deltas are non-negative after the same-day vote-retraction
/// correction has been applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerCounters {
    pub games_played: u32,
    pub times_voted: u32,
    pub times_voted_against: u32,
    pub times_voted_out: u32,
    pub times_killed: u32,
    pub kills_as_mafia: u32,
    pub saves_as_doctor: u32,
    pub role_mafia: u32,
    pub role_doctor: u32,
    pub role_civilian: u32,
}

impl PlayerCounters {
    pub fn get(&self, counter: Counter) -> u32 {
        match counter {
            Counter::GamesPlayed => self.games_played,
            Counter::TimesVoted => self.times_voted,
            Counter::TimesVotedAgainst => self.times_voted_against,
            Counter::TimesVotedOut => self.times_voted_out,
            Counter::TimesKilled => self.times_killed,
            Counter::KillsAsMafia => self.kills_as_mafia,
            Counter::SavesAsDoctor => self.saves_as_doctor,
            Counter::RoleMafia => self.role_mafia,
            Counter::RoleDoctor => self.role_doctor,
            Counter::RoleCivilian => self.role_civilian,
        }
    }

    fn slot_mut(&mut self, counter: Counter) -> &mut u32 {
        match counter {
            Counter::GamesPlayed => &mut self.games_played,
            Counter::TimesVoted => &mut self.times_voted,
            Counter::TimesVotedAgainst => &mut self.times_voted_against,
            Counter::TimesVotedOut => &mut self.times_voted_out,
            Counter::TimesKilled => &mut self.times_killed,
            Counter::KillsAsMafia => &mut self.kills_as_mafia,
            Counter::SavesAsDoctor => &mut self.saves_as_doctor,
            Counter::RoleMafia => &mut self.role_mafia,
            Counter::RoleDoctor => &mut self.role_doctor,
            Counter::RoleCivilian => &mut self.role_civilian,
        }
    }

    /// Applies a signed delta to one counter. Counters never go below zero;
    /// the only legitimate negative delta is the same-day vote-retraction
    /// correction, which undoes an increment applied earlier that day.
    pub fn apply(&mut self, counter: Counter, delta: i64) {
        let slot = self.slot_mut(counter);
        if delta >= 0 {
            *slot = slot.saturating_add(delta as u32);
        } else {
            *slot = slot.saturating_sub(delta.unsigned_abs() as u32);
        }
    }

    /// Field-wise `self - baseline`, the per-match delta view.
    pub fn diff(&self, baseline: &PlayerCounters) -> PlayerCounters {
        let mut out = PlayerCounters::default();
        for counter in Counter::ALL {
            *out.slot_mut(counter) = self.get(counter).saturating_sub(baseline.get(counter));
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        Counter::ALL.iter().all(|c| self.get(*c) == 0)
    }
}

/// One entry in the bounded finished-game history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedGame {
    pub game_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Per-player counter deltas attributable to this match.
    pub players: BTreeMap<String, PlayerCounters>,
}

/// The baseline captured when a match begins, discarded when the snapshot is
/// closed or cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSnapshot {
    pub started_at: DateTime<Utc>,
    pub player_ids: Vec<String>,
    pub baseline: BTreeMap<String, PlayerCounters>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMeta {
    /// Finished games, most recent last.
    #[serde(default)]
    pub games: Vec<FinishedGame>,
    #[serde(default)]
    pub active_games: BTreeMap<String, ActiveSnapshot>,
}

/// The whole durable ledger. On disk this is a single JSON object with one
/// key per player id plus the `_meta` section, so existing ledger files
/// round-trip unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsLedger {
    #[serde(flatten)]
    pub players: BTreeMap<String, PlayerCounters>,
    #[serde(rename = "_meta", default)]
    pub meta: LedgerMeta,
}

impl StatsLedger {
    pub fn ensure_player(&mut self, player_id: &str) -> &mut PlayerCounters {
        self.players.entry(player_id.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_clamps_at_zero() {
        let mut counters = PlayerCounters::default();
        counters.apply(Counter::TimesVotedAgainst, 1);
        counters.apply(Counter::TimesVotedAgainst, -1);
        counters.apply(Counter::TimesVotedAgainst, -1);
        assert_eq!(counters.times_voted_against, 0);
    }

    #[test]
    fn diff_is_field_wise() {
        let mut before = PlayerCounters::default();
        before.apply(Counter::GamesPlayed, 3);

        let mut after = before;
        after.apply(Counter::GamesPlayed, 1);
        after.apply(Counter::KillsAsMafia, 2);

        let delta = after.diff(&before);
        assert_eq!(delta.games_played, 1);
        assert_eq!(delta.kills_as_mafia, 2);
        assert_eq!(delta.times_voted, 0);
    }

    #[test]
    fn ledger_round_trips_with_meta_key() {
        let mut ledger = StatsLedger::default();
        ledger.ensure_player("alice").apply(Counter::GamesPlayed, 1);
        ledger.meta.games.push(FinishedGame {
            game_id: "g_1".to_string(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            players: BTreeMap::new(),
        });

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["alice"]["gamesPlayed"], 1);
        assert_eq!(json["_meta"]["games"][0]["gameId"], "g_1");

        let back: StatsLedger = serde_json::from_value(json).unwrap();
        assert_eq!(back.players.get("alice").unwrap().games_played, 1);
        assert_eq!(back.meta.games.len(), 1);
    }
}
