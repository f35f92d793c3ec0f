use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A player's role for the duration of one match. Assigned once at match
/// start, never reassigned.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum Role {
    Mafia,
    Doctor,
    Civilian,
}

/// External collaborator contract: maps a player set to roles, covering
/// every input id exactly once.
pub trait RoleAllocator: Send + Sync {
    fn assign(&self, player_ids: &BTreeSet<String>) -> BTreeMap<String, Role>;
}

/// Standard allocation: one Mafia, one Doctor, everyone else Civilian,
/// chosen uniformly at random.
#[derive(Debug, Default)]
pub struct RandomRoleAllocator;

impl RoleAllocator for RandomRoleAllocator {
    fn assign(&self, player_ids: &BTreeSet<String>) -> BTreeMap<String, Role> {
        let mut shuffled: Vec<&String> = player_ids.iter().collect();
        shuffled.shuffle(&mut rand::rng());

        shuffled
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let role = match i {
                    0 => Role::Mafia,
                    1 => Role::Doctor,
                    _ => Role::Civilian,
                };
                (id.clone(), role)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(n: usize) -> BTreeSet<String> {
        (0..n).map(|i| format!("player-{i}")).collect()
    }

    #[test]
    fn covers_every_player_exactly_once() {
        let ids = players(6);
        let roles = RandomRoleAllocator.assign(&ids);

        assert_eq!(roles.len(), ids.len());
        for id in &ids {
            assert!(roles.contains_key(id));
        }
    }

    #[test]
    fn assigns_one_mafia_and_one_doctor() {
        let roles = RandomRoleAllocator.assign(&players(5));

        let count = |role| roles.values().filter(|r| **r == role).count();
        assert_eq!(count(Role::Mafia), 1);
        assert_eq!(count(Role::Doctor), 1);
        assert_eq!(count(Role::Civilian), 3);
    }
}
