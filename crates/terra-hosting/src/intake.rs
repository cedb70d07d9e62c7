//! Command intake (component I): one validated entry point per command
//! kind. Validation runs synchronously against a read-only room snapshot --
//! credentials, room status, ownership, affordability, numeric bounds --
//! and only a command that passes is handed to the caller for enqueueing.
//! Intake never touches the mutable room state directly; that stays the
//! scheduler's job (component E/F).

use terra_core::{Conflict, Error};
use terra_sim::{ArrowType, Command, RoomState, RoomStatus};

fn authenticate(room: &RoomState, user_id: &str, password: &str) -> Result<(), Error> {
    if room.player_by_credentials(user_id, password).is_none() {
        return Err(Error::AuthFailed(format!("unknown credentials for {user_id}")));
    }
    Ok(())
}

fn require_open(room: &RoomState) -> Result<(), Error> {
    match room.status {
        RoomStatus::Ended => Err(Error::GameEnded),
        RoomStatus::Error => Err(Error::Fatal("room is in the error state".into())),
        _ => Ok(()),
    }
}

fn require_creator(room: &RoomState, user_id: &str) -> Result<(), Error> {
    if !room.is_creator(user_id) {
        return Err(Error::Forbidden(format!("{user_id} is not the room creator")));
    }
    Ok(())
}

fn require_in_bounds(x: u32, y: u32, width: u32, height: u32) -> Result<(), Error> {
    if x >= width || y >= height {
        return Err(Error::InvalidInput(format!("({x},{y}) is outside the {width}x{height} map")));
    }
    Ok(())
}

/// `joinRoom`: registers a new player's credentials (or is a no-op if the
/// user id is already seated). Authenticating the supplied `joinCode`
/// against the room's own code is the caller's job (the manager holds the
/// code; intake only ever sees the room snapshot) -- this function assumes
/// that check already passed.
pub fn join(room: &RoomState, user_id: &str, password: &str) -> Result<Command, Error> {
    require_open(room)?;
    if room.players.iter().any(|p| p.user_id == user_id && p.password != password) {
        return Err(Error::AuthFailed(format!("{user_id} is already registered with a different password")));
    }
    Ok(Command::Join { user_id: user_id.to_string(), password: password.to_string() })
}

/// `foundNation`: the cell must be land, not a river, unowned, and the user
/// must not already hold an active nation -- refounding an active nation
/// returns the named `REFOUND_DISABLED` conflict rather than a generic one.
/// Land and river are checked separately since every river cell also
/// satisfies `elevation >= seaLevel` and would otherwise pass as land.
pub fn found_nation(
    room: &RoomState,
    width: u32,
    height: u32,
    is_land: bool,
    is_river: bool,
    user_id: &str,
    password: &str,
    x: u32,
    y: u32,
) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    require_in_bounds(x, y, width, height)?;
    if !is_land {
        return Err(Error::InvalidInput(format!("({x},{y}) is not land")));
    }
    if is_river {
        return Err(Error::InvalidInput(format!("({x},{y}) is a river")));
    }
    if room.territory_owner(x, y).is_some() {
        return Err(Error::Conflict(Conflict::CellAlreadyOwned));
    }
    if room.nations.get(user_id).is_some_and(|n| n.is_active()) {
        return Err(Error::Conflict(Conflict::RefoundDisabled));
    }
    Ok(Command::FoundNation { owner: user_id.to_string(), x, y })
}

/// `buildCity`/`buildStructure`: requires an active nation owning the
/// target cell; affordability is re-checked by the updater against the
/// tick's actual resource levels, but an intake-time check rejects obvious
/// misuse before it ever reaches the command queue.
pub fn build_city(
    room: &RoomState,
    user_id: &str,
    password: &str,
    x: u32,
    y: u32,
    city_type: String,
    city_name: Option<String>,
) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    require_owns_cell(room, user_id, x, y)?;
    Ok(Command::BuildCity { owner: user_id.to_string(), x, y, city_type, name: city_name })
}

pub fn build_structure(
    room: &RoomState,
    user_id: &str,
    password: &str,
    x: u32,
    y: u32,
    structure_type: String,
) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    require_owns_cell(room, user_id, x, y)?;
    if room.nations[user_id].structures.iter().any(|s| s.x == x && s.y == y) {
        return Err(Error::Conflict(Conflict::StructureAlreadyPresent));
    }
    Ok(Command::BuildStructure { owner: user_id.to_string(), x, y, structure_type })
}

fn require_owns_cell(room: &RoomState, user_id: &str, x: u32, y: u32) -> Result<(), Error> {
    match room.territory_owner(x, y) {
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(Error::InvalidInput(format!("({x},{y}) is not owned by {user_id}"))),
        None => Err(Error::InvalidInput(format!("({x},{y}) is unowned"))),
    }
}

/// `arrow`: the path's first cell must be owned by the sender and `percent`
/// must be a valid slider value; the max-concurrent-arrows cap is enforced
/// by the updater since it depends on the tick's actual arrow count.
pub fn arrow(
    room: &RoomState,
    user_id: &str,
    password: &str,
    arrow_type: ArrowType,
    path: Vec<(u32, u32)>,
    percent: f32,
) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    if path.len() < 2 {
        return Err(Error::InvalidInput("arrow path needs at least two cells".into()));
    }
    if !(0.0..=1.0).contains(&percent) {
        return Err(Error::InvalidInput("percent must be within [0,1]".into()));
    }
    let (start_x, start_y) = path[0];
    require_owns_cell(room, user_id, start_x, start_y)?;
    Ok(Command::Arrow { owner: user_id.to_string(), arrow_type, path, percent })
}

pub fn clear_arrow(room: &RoomState, user_id: &str, password: &str, arrow_type: ArrowType) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    Ok(Command::ClearArrow { owner: user_id.to_string(), arrow_type })
}

pub fn set_troop_target(room: &RoomState, user_id: &str, password: &str, target: f32) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    if !(0.0..=1.0).contains(&target) {
        return Err(Error::InvalidInput("troopTarget must be within [0,1]".into()));
    }
    Ok(Command::SetTroopTarget { owner: user_id.to_string(), target })
}

pub fn set_attack_percent(room: &RoomState, user_id: &str, password: &str, percent: f32) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    if !(0.0..=1.0).contains(&percent) {
        return Err(Error::InvalidInput("attackPercent must be within [0,1]".into()));
    }
    Ok(Command::SetAttackPercent { owner: user_id.to_string(), percent })
}

pub fn quit(room: &RoomState, user_id: &str, password: &str) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_open(room)?;
    Ok(Command::Quit { owner: user_id.to_string() })
}

/// `pause`/`unpause`/`end` are creator-only and idempotent: pausing an
/// already-paused room, or unpausing an already-open one, is accepted as a
/// no-op rather than rejected (the updater's `advance` already treats a
/// non-`Open` room as a no-op tick, so duplicate signals cost nothing).
pub fn pause(room: &RoomState, user_id: &str, password: &str) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_creator(room, user_id)?;
    if room.status == RoomStatus::Ended {
        return Err(Error::GameEnded);
    }
    Ok(Command::Pause)
}

pub fn unpause(room: &RoomState, user_id: &str, password: &str) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_creator(room, user_id)?;
    if room.status == RoomStatus::Ended {
        return Err(Error::GameEnded);
    }
    Ok(Command::Unpause)
}

pub fn end(room: &RoomState, user_id: &str, password: &str) -> Result<Command, Error> {
    authenticate(room, user_id, password)?;
    require_creator(room, user_id)?;
    Ok(Command::End)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_sim::{Nation, Player, RoomId};

    fn room_with_player() -> RoomState {
        let mut room = RoomState::new(RoomId::default(), "room", "creator");
        room.status = RoomStatus::Open;
        room.players.push(Player { user_id: "creator".into(), password: "pw".into() });
        room.players.push(Player { user_id: "p1".into(), password: "pw".into() });
        room
    }

    #[test]
    fn found_nation_rejects_bad_password() {
        let room = room_with_player();
        let err = found_nation(&room, 10, 10, true, false, "p1", "wrong", 1, 1).unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));
    }

    #[test]
    fn found_nation_rejects_non_land() {
        let room = room_with_player();
        let err = found_nation(&room, 10, 10, false, false, "p1", "pw", 1, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn found_nation_rejects_river() {
        let room = room_with_player();
        let err = found_nation(&room, 10, 10, true, true, "p1", "pw", 1, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn found_nation_rejects_active_refound() {
        let mut room = room_with_player();
        room.nations.insert("p1".to_string(), Nation::found("p1", 2, 2));
        let err = found_nation(&room, 10, 10, true, false, "p1", "pw", 1, 1).unwrap_err();
        assert_eq!(err, Error::Conflict(Conflict::RefoundDisabled));
    }

    #[test]
    fn pause_requires_creator() {
        let room = room_with_player();
        let err = pause(&room, "p1", "pw").unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(pause(&room, "creator", "pw").is_ok());
    }

    #[test]
    fn arrow_requires_ownership_of_first_cell() {
        let mut room = room_with_player();
        room.nations.insert("p1".to_string(), Nation::found("p1", 5, 5));
        let err = arrow(&room, "p1", "pw", ArrowType::Attack, vec![(1, 1), (2, 2)], 0.5).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(arrow(&room, "p1", "pw", ArrowType::Attack, vec![(5, 5), (6, 6)], 0.5).is_ok());
    }
}
