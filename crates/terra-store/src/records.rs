//! Persisted state layout (abstract): rooms keyed by id with embedded game
//! state; map chunks keyed by (mapId, startRow); one mappings document per
//! map. Periodic snapshots write the room's gameState + tickCount atomically.

use serde::{Deserialize, Serialize};
use terra_core::ID;

pub struct RoomMarker;
pub struct MapMarker;

/// A room's durable record: everything needed to resume a room after a
/// process restart, short of the in-flight command queue (which is
/// transient by design -- a restarted room starts its next tick clean).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id: ID<RoomMarker>,
    pub map_id: ID<MapMarker>,
    pub room_name: String,
    pub creator_id: String,
    pub join_code: String,
    pub status: String,
    pub tick_count: u64,
    pub players: Vec<PlayerRecord>,
    /// Opaque serialized `RoomState` snapshot (nations, territories, etc).
    pub game_state: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub user_id: String,
    pub password: String,
}

/// A row-major chunk of generated cells, stored at (mapId, startRow) so the
/// HTTP surface can request sub-ranges without re-reading the whole map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapChunkRecord {
    pub map_id: ID<MapMarker>,
    pub start_row: u32,
    pub cells: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapMappingsRecord {
    pub map_id: ID<MapMarker>,
    pub biomes: Vec<String>,
    pub features: Vec<String>,
    pub resources: Vec<String>,
}

/// A periodic full-state snapshot, written from the scheduler's snapshot
/// path (never from the per-tick hot path, per the documented resource
/// model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub room_id: ID<RoomMarker>,
    pub tick_count: u64,
    pub game_state: serde_json::Value,
}
