//! Pluggable persistence for room state, map chunks, and snapshots.
//!
//! The [`Store`] trait is the single seam between the game server and
//! whatever keeps it alive across restarts. [`InMemoryStore`] is always
//! available and is what a room runs on by default; enabling the
//! `database` feature adds [`postgres::PostgresStore`], built on
//! terra-pg's connection helper. Each room/chunk/mapping/snapshot is
//! stored as a single JSONB row -- chunks are written once at room
//! creation, not often enough to justify a binary COPY path.
mod in_memory;
mod records;

#[cfg(feature = "database")]
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use records::{MapChunkRecord, MapMappingsRecord, MapMarker, PlayerRecord, RoomMarker, RoomRecord, SnapshotRecord};

use terra_core::{Error, ID};

/// Persistence surface a room manager needs: create/load/save rooms, stash
/// generated map chunks once so they never need regenerating, and write
/// periodic snapshots off the per-tick hot path.
///
/// Implementations must not block the async runtime; the Postgres backend
/// in particular is expected to use pooled/streamed writes for chunk bulk
/// inserts rather than row-by-row round trips.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn create_room(&self, room: RoomRecord) -> Result<(), Error>;
    async fn load_room(&self, room_id: ID<RoomMarker>) -> Result<Option<RoomRecord>, Error>;
    async fn save_room(&self, room: RoomRecord) -> Result<(), Error>;
    async fn delete_room(&self, room_id: ID<RoomMarker>) -> Result<(), Error>;
    async fn list_room_ids(&self) -> Result<Vec<ID<RoomMarker>>, Error>;

    async fn save_chunks(&self, chunks: Vec<MapChunkRecord>) -> Result<(), Error>;
    async fn load_chunk(
        &self,
        map_id: ID<MapMarker>,
        start_row: u32,
    ) -> Result<Option<MapChunkRecord>, Error>;
    async fn save_mappings(&self, mappings: MapMappingsRecord) -> Result<(), Error>;
    async fn load_mappings(&self, map_id: ID<MapMarker>) -> Result<Option<MapMappingsRecord>, Error>;

    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> Result<(), Error>;
    async fn load_latest_snapshot(
        &self,
        room_id: ID<RoomMarker>,
    ) -> Result<Option<SnapshotRecord>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips_a_room() {
        let store = InMemoryStore::new();
        let room_id = ID::default();
        let record = RoomRecord {
            room_id,
            map_id: ID::default(),
            room_name: "bricktown".into(),
            creator_id: "creator-1".into(),
            join_code: "ABCD".into(),
            status: "running".into(),
            tick_count: 0,
            players: vec![],
            game_state: serde_json::json!({}),
        };
        store.create_room(record.clone()).await.unwrap();
        let loaded = store.load_room(room_id).await.unwrap().unwrap();
        assert_eq!(loaded.room_name, "bricktown");

        store.delete_room(room_id).await.unwrap();
        assert!(store.load_room(room_id).await.unwrap().is_none());
    }
}
