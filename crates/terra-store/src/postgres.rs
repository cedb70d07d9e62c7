//! Postgres-backed [`Store`], built on terra-pg's connection helper and
//! table constants. Rooms and snapshots are small enough to read/write as
//! single JSONB rows; map chunks are write-once-per-map and go through
//! plain batched inserts rather than binary COPY, since a chunk is
//! produced once at room creation rather than millions of times.
use std::sync::Arc;

use terra_core::{Error, ID};
use tokio_postgres::Client;

use crate::{MapChunkRecord, MapMappingsRecord, MapMarker, RoomMarker, RoomRecord, SnapshotRecord, Store};

const CREATE_TABLES: &str = const_format::concatcp!(
    "CREATE TABLE IF NOT EXISTS ",
    terra_pg::ROOMS,
    " (room_id UUID PRIMARY KEY, map_id UUID NOT NULL, body JSONB NOT NULL);\n",
    "CREATE TABLE IF NOT EXISTS ",
    terra_pg::CHUNKS,
    " (map_id UUID NOT NULL, start_row INT NOT NULL, body JSONB NOT NULL, PRIMARY KEY (map_id, start_row));\n",
    "CREATE TABLE IF NOT EXISTS ",
    terra_pg::MAPPINGS,
    " (map_id UUID PRIMARY KEY, body JSONB NOT NULL);\n",
    "CREATE TABLE IF NOT EXISTS ",
    terra_pg::SNAPSHOTS,
    " (room_id UUID PRIMARY KEY, tick_count BIGINT NOT NULL, body JSONB NOT NULL);\n",
);

/// Persistence backend for a deployed server. Each method maps a Postgres
/// error to [`Error::Transient`] so command intake can surface a retryable
/// failure rather than crash the room worker.
pub struct PostgresStore {
    client: Arc<Client>,
}

impl PostgresStore {
    /// Connects via terra-pg's `DB_URL`-driven connector and ensures the
    /// schema exists. Call once at server boot.
    pub async fn connect() -> Self {
        let client = terra_pg::db().await;
        client
            .batch_execute(CREATE_TABLES)
            .await
            .expect("create terra-store tables");
        Self { client }
    }

    fn transient(err: tokio_postgres::Error) -> Error {
        Error::Transient(err.to_string())
    }
}

#[async_trait::async_trait]
impl Store for PostgresStore {
    async fn create_room(&self, room: RoomRecord) -> Result<(), Error> {
        let body = serde_json::to_value(&room).expect("serialize room record");
        self.client
            .execute(
                "INSERT INTO rooms (room_id, map_id, body) VALUES ($1, $2, $3)",
                &[&room.room_id.inner(), &room.map_id.inner(), &body],
            )
            .await
            .map_err(Self::transient)?;
        Ok(())
    }

    async fn load_room(&self, room_id: ID<RoomMarker>) -> Result<Option<RoomRecord>, Error> {
        let row = self
            .client
            .query_opt("SELECT body FROM rooms WHERE room_id = $1", &[&room_id.inner()])
            .await
            .map_err(Self::transient)?;
        Ok(row.map(|r| {
            let body: serde_json::Value = r.get(0);
            serde_json::from_value(body).expect("deserialize room record")
        }))
    }

    async fn save_room(&self, room: RoomRecord) -> Result<(), Error> {
        let body = serde_json::to_value(&room).expect("serialize room record");
        self.client
            .execute(
                "INSERT INTO rooms (room_id, map_id, body) VALUES ($1, $2, $3)
                 ON CONFLICT (room_id) DO UPDATE SET body = EXCLUDED.body",
                &[&room.room_id.inner(), &room.map_id.inner(), &body],
            )
            .await
            .map_err(Self::transient)?;
        Ok(())
    }

    async fn delete_room(&self, room_id: ID<RoomMarker>) -> Result<(), Error> {
        self.client
            .execute("DELETE FROM rooms WHERE room_id = $1", &[&room_id.inner()])
            .await
            .map_err(Self::transient)?;
        Ok(())
    }

    async fn list_room_ids(&self) -> Result<Vec<ID<RoomMarker>>, Error> {
        let rows = self
            .client
            .query("SELECT room_id FROM rooms", &[])
            .await
            .map_err(Self::transient)?;
        Ok(rows
            .into_iter()
            .map(|r| ID::from(r.get::<_, uuid::Uuid>(0)))
            .collect())
    }

    async fn save_chunks(&self, chunks: Vec<MapChunkRecord>) -> Result<(), Error> {
        for chunk in chunks {
            self.client
                .execute(
                    "INSERT INTO map_chunks (map_id, start_row, body) VALUES ($1, $2, $3)
                     ON CONFLICT (map_id, start_row) DO UPDATE SET body = EXCLUDED.body",
                    &[&chunk.map_id.inner(), &(chunk.start_row as i32), &chunk.cells],
                )
                .await
                .map_err(Self::transient)?;
        }
        Ok(())
    }

    async fn load_chunk(
        &self,
        map_id: ID<MapMarker>,
        start_row: u32,
    ) -> Result<Option<MapChunkRecord>, Error> {
        let row = self
            .client
            .query_opt(
                "SELECT body FROM map_chunks WHERE map_id = $1 AND start_row = $2",
                &[&map_id.inner(), &(start_row as i32)],
            )
            .await
            .map_err(Self::transient)?;
        Ok(row.map(|r| MapChunkRecord {
            map_id,
            start_row,
            cells: r.get(0),
        }))
    }

    async fn save_mappings(&self, mappings: MapMappingsRecord) -> Result<(), Error> {
        let body = serde_json::to_value(&mappings).expect("serialize mappings record");
        self.client
            .execute(
                "INSERT INTO map_mappings (map_id, body) VALUES ($1, $2)
                 ON CONFLICT (map_id) DO UPDATE SET body = EXCLUDED.body",
                &[&mappings.map_id.inner(), &body],
            )
            .await
            .map_err(Self::transient)?;
        Ok(())
    }

    async fn load_mappings(&self, map_id: ID<MapMarker>) -> Result<Option<MapMappingsRecord>, Error> {
        let row = self
            .client
            .query_opt("SELECT body FROM map_mappings WHERE map_id = $1", &[&map_id.inner()])
            .await
            .map_err(Self::transient)?;
        Ok(row.map(|r| {
            let body: serde_json::Value = r.get(0);
            serde_json::from_value(body).expect("deserialize mappings record")
        }))
    }

    async fn save_snapshot(&self, snapshot: SnapshotRecord) -> Result<(), Error> {
        let body = serde_json::to_value(&snapshot).expect("serialize snapshot record");
        self.client
            .execute(
                "INSERT INTO room_snapshots (room_id, tick_count, body) VALUES ($1, $2, $3)
                 ON CONFLICT (room_id) DO UPDATE SET tick_count = EXCLUDED.tick_count, body = EXCLUDED.body",
                &[&snapshot.room_id.inner(), &(snapshot.tick_count as i64), &body],
            )
            .await
            .map_err(Self::transient)?;
        Ok(())
    }

    async fn load_latest_snapshot(
        &self,
        room_id: ID<RoomMarker>,
    ) -> Result<Option<SnapshotRecord>, Error> {
        let row = self
            .client
            .query_opt(
                "SELECT body FROM room_snapshots WHERE room_id = $1",
                &[&room_id.inner()],
            )
            .await
            .map_err(Self::transient)?;
        Ok(row.map(|r| {
            let body: serde_json::Value = r.get(0);
            serde_json::from_value(body).expect("deserialize snapshot record")
        }))
    }
}
