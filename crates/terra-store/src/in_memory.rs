use std::collections::HashMap;
use std::sync::Mutex;

use terra_core::{Conflict, Error, ID};

use crate::{MapChunkRecord, MapMappingsRecord, MapMarker, RoomMarker, RoomRecord, SnapshotRecord, Store};

/// Always-available persistence backend. Rooms survive a process restart
/// only as long as the process itself survives; used as the default store
/// and in tests, and as the fallback when `database` isn't enabled.
#[derive(Default)]
pub struct InMemoryStore {
    rooms: Mutex<HashMap<uuid::Uuid, RoomRecord>>,
    chunks: Mutex<HashMap<(uuid::Uuid, u32), MapChunkRecord>>,
    mappings: Mutex<HashMap<uuid::Uuid, MapMappingsRecord>>,
    snapshots: Mutex<HashMap<uuid::Uuid, SnapshotRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for InMemoryStore {
    async fn create_room(&self, room: RoomRecord) -> Result<(), Error> {
        let mut rooms = self.rooms.lock().expect("rooms lock poisoned");
        if rooms.contains_key(&room.room_id.inner()) {
            return Err(Error::Conflict(Conflict::RoomAlreadyExists));
        }
        rooms.insert(room.room_id.inner(), room);
        Ok(())
    }

    async fn load_room(&self, room_id: ID<RoomMarker>) -> Result<Option<RoomRecord>, Error> {
        Ok(self
            .rooms
            .lock()
            .expect("rooms lock poisoned")
            .get(&room_id.inner())
            .cloned())
    }

    async fn save_room(&self, room: RoomRecord) -> Result<(), Error> {
        self.rooms
            .lock()
            .expect("rooms lock poisoned")
            .insert(room.room_id.inner(), room);
        Ok(())
    }

    async fn delete_room(&self, room_id: ID<RoomMarker>) -> Result<(), Error> {
        self.rooms
            .lock()
            .expect("rooms lock poisoned")
            .remove(&room_id.inner());
        Ok(())
    }

    async fn list_room_ids(&self) -> Result<Vec<ID<RoomMarker>>, Error> {
        Ok(self
            .rooms
            .lock()
            .expect("rooms lock poisoned")
            .keys()
            .copied()
            .map(ID::from)
            .collect())
    }

    async fn save_chunks(&self, chunks: Vec<MapChunkRecord>) -> Result<(), Error> {
        let mut store = self.chunks.lock().expect("chunks lock poisoned");
        for chunk in chunks {
            store.insert((chunk.map_id.inner(), chunk.start_row), chunk);
        }
        Ok(())
    }

    async fn load_chunk(
        &self,
        map_id: ID<MapMarker>,
        start_row: u32,
    ) -> Result<Option<MapChunkRecord>, Error> {
        Ok(self
            .chunks
            .lock()
            .expect("chunks lock poisoned")
            .get(&(map_id.inner(), start_row))
            .cloned())
    }

    async fn save_mappings(&self, mappings: MapMappingsRecord) -> Result<(), Error> {
        self.mappings
            .lock()
            .expect("mappings lock poisoned")
            .insert(mappings.map_id.inner(), mappings);
        Ok(())
    }

    async fn load_mappings(&self, map_id: ID<MapMarker>) -> Result<Option<MapMappingsRecord>, Error> {
        Ok(self
            .mappings
            .lock()
            .expect("mappings lock poisoned")
            .get(&map_id.inner())
            .cloned())
    }

    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> Result<(), Error> {
        self.snapshots
            .lock()
            .expect("snapshots lock poisoned")
            .insert(snapshot.room_id.inner(), snapshot);
        Ok(())
    }

    async fn load_latest_snapshot(
        &self,
        room_id: ID<RoomMarker>,
    ) -> Result<Option<SnapshotRecord>, Error> {
        Ok(self
            .snapshots
            .lock()
            .expect("snapshots lock poisoned")
            .get(&room_id.inner())
            .cloned())
    }
}
