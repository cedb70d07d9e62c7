//! Room state model (component D): a plain value mutated only inside the
//! tick scheduler's critical section. Readers (hub, HTTP handlers) clone an
//! `Arc<RoomState>` published by the scheduler rather than touching the
//! mutable copy directly -- the "single writer, many readers" discipline
//! the teacher applies to `Room`/`Engine`.

use std::collections::BTreeMap;

use terra_core::ID;

use crate::command::Command;
use crate::nation::Nation;

pub struct RoomMarker;
pub type RoomId = ID<RoomMarker>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Initializing,
    Open,
    Paused,
    Ended,
    Error,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: String,
    pub password: String,
}

/// Authoritative in-memory state for one room. Nations are keyed by owner
/// id and kept in a `BTreeMap` so iteration order is the ascending-owner-id
/// order the updater's determinism guarantee requires.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room_id: RoomId,
    pub room_name: String,
    pub creator_id: String,
    pub status: RoomStatus,
    pub tick_count: u64,
    pub players: Vec<Player>,
    pub nations: BTreeMap<String, Nation>,
    pub winning_nation: Option<String>,
    /// `(x, y) -> tick` a defeated nation's former cell stays unclaimable
    /// until, per `GameplayConfig::scorched_cooldown_ticks`. Empty whenever
    /// the cooldown is disabled (the default).
    pub scorched: BTreeMap<(u32, u32), u64>,
}

impl RoomState {
    pub fn new(room_id: RoomId, room_name: impl Into<String>, creator_id: impl Into<String>) -> Self {
        Self {
            room_id,
            room_name: room_name.into(),
            creator_id: creator_id.into(),
            status: RoomStatus::Initializing,
            tick_count: 0,
            players: Vec::new(),
            nations: BTreeMap::new(),
            winning_nation: None,
            scorched: BTreeMap::new(),
        }
    }

    /// Whether `(x, y)` is currently within a defeated nation's cooldown
    /// window and thus not claimable via `expand_territory`.
    pub fn is_scorched(&self, x: u32, y: u32) -> bool {
        self.scorched.get(&(x, y)).is_some_and(|&until| until > self.tick_count)
    }

    pub fn player_by_credentials(&self, user_id: &str, password: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.user_id == user_id && p.password == password)
    }

    pub fn is_creator(&self, user_id: &str) -> bool {
        self.creator_id == user_id
    }

    pub fn territory_owner(&self, x: u32, y: u32) -> Option<&str> {
        self.nations
            .values()
            .find(|n| n.territory.contains(x, y))
            .map(|n| n.owner.as_str())
    }

}

/// Drains a FIFO command queue per-nation while preserving each nation's
/// relative order, the grouping the updater's apply-commands step expects.
pub fn group_by_owner(commands: Vec<Command>) -> BTreeMap<String, Vec<Command>> {
    let mut grouped: BTreeMap<String, Vec<Command>> = BTreeMap::new();
    let mut room_level = Vec::new();
    for command in commands {
        match command.owner() {
            Some(owner) => grouped.entry(owner.to_string()).or_default().push(command),
            None => room_level.push(command),
        }
    }
    if !room_level.is_empty() {
        grouped.entry(String::new()).or_default().extend(room_level);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_lookup_requires_exact_credentials() {
        let mut room = RoomState::new(RoomId::default(), "r", "creator");
        room.players.push(Player { user_id: "p1".into(), password: "secret".into() });
        assert!(room.player_by_credentials("p1", "secret").is_some());
        assert!(room.player_by_credentials("p1", "wrong").is_none());
    }

    #[test]
    fn group_by_owner_preserves_fifo_within_nation() {
        let commands = vec![
            Command::SetTroopTarget { owner: "p1".into(), target: 0.2 },
            Command::SetAttackPercent { owner: "p1".into(), percent: 0.3 },
            Command::Pause,
        ];
        let grouped = group_by_owner(commands);
        assert_eq!(grouped["p1"].len(), 2);
        assert_eq!(grouped[""].len(), 1);
    }
}
