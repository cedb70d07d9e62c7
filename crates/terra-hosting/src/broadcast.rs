//! Builds the tailored `state` wire message for one subscriber: either the
//! absolute territory (full sync) or the add/sub delta against that
//! subscriber's last-seen snapshot, mirroring §4.G and the `state` payload
//! shape in §6. The snapshot a delta is computed against is owned by the
//! caller (the hub's `Subscriber`, see `hub.rs`) rather than by `RoomState`
//! itself -- the scheduler only ever hands its `on_tick` hook a shared
//! `&RoomState`, so nothing here can carry write-back state across ticks.

use std::collections::BTreeMap;

use terra_dto::{
    ChunkMappings, Coords, DeltaCoords, GameStateDto, NationStateDto, NationStatus as DtoNationStatus,
    ServerMessage, TerritoryPayload, WinningNationDto,
};
use terra_sim::{Delta, NationStatus, RoomState, Territory};

fn to_coords(territory: &Territory) -> Coords {
    let (x, y) = territory.to_coords();
    Coords { x, y }
}

fn to_delta_coords(delta: &Delta) -> DeltaCoords {
    DeltaCoords {
        add: to_coords(&delta.add),
        sub: to_coords(&delta.sub),
    }
}

fn dto_status(status: NationStatus) -> DtoNationStatus {
    match status {
        NationStatus::Active => DtoNationStatus::Active,
        NationStatus::Defeated => DtoNationStatus::Defeated,
        NationStatus::Winner => DtoNationStatus::Winner,
    }
}

/// Builds the `GameStateDto` for one subscriber, diffing each nation's
/// territory against `snapshot` and leaving `snapshot` updated to the
/// territory just sent.
pub fn build_game_state(room: &RoomState, snapshot: &mut BTreeMap<String, Territory>, full: bool) -> GameStateDto {
    let mut nations = Vec::with_capacity(room.nations.len());

    for (owner, nation) in &room.nations {
        let prior = snapshot.get(owner).cloned().unwrap_or_default();
        let territory = if full {
            TerritoryPayload::Full { territory: to_coords(&nation.territory) }
        } else {
            let delta = Delta::diff(&prior, &nation.territory);
            TerritoryPayload::Delta { territory_delta_for_client: to_delta_coords(&delta) }
        };
        snapshot.insert(owner.clone(), nation.territory.clone());

        nations.push(NationStateDto {
            owner: nation.owner.clone(),
            population: nation.population,
            national_will: nation.national_will,
            resources: nation.resources.clone(),
            cities: nation
                .cities
                .iter()
                .map(|c| terra_dto::CityDto {
                    x: c.x,
                    y: c.y,
                    city_type: c.city_type.clone(),
                    name: Some(c.name.clone()).filter(|n| !n.is_empty()),
                })
                .collect(),
            structures: nation
                .structures
                .iter()
                .map(|s| terra_dto::StructureDto { x: s.x, y: s.y, structure_type: s.structure_type.clone() })
                .collect(),
            status: dto_status(nation.status),
            troop_target: nation.troop_target,
            attack_percent: nation.attack_percent,
            territory,
        });
    }

    GameStateDto {
        nations,
        winning_nation: room.winning_nation.clone().map(|owner| WinningNationDto { owner }),
    }
}

pub fn build_state_message(
    room: &RoomState,
    snapshot: &mut BTreeMap<String, Territory>,
    full: bool,
    use_packed_deltas: bool,
) -> ServerMessage {
    let game_state = build_game_state(room, snapshot, full);
    ServerMessage::State {
        tick_count: room.tick_count,
        room_name: room.room_name.clone(),
        room_creator: room.creator_id.clone(),
        game_state,
        use_packed_deltas: use_packed_deltas.then_some(true),
    }
}

pub fn mapping_table() -> ChunkMappings {
    let mappings = terra_map::Mappings::default();
    ChunkMappings {
        biomes: mappings.biomes.iter().map(|s| s.to_string()).collect(),
        features: mappings.features.iter().map(|s| s.to_string()).collect(),
        resources: mappings.resources.iter().map(|s| s.to_string()).collect(),
    }
}
