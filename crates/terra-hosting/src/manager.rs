//! Room manager (component J): serializes lifecycle across rooms.
//! `create_room` generates the map (B), persists its chunks, starts the
//! tick scheduler (F), and returns a join code; `start/stop/pause/unpause`
//! each acquire the room's own lifecycle lock so concurrent lifecycle calls
//! on the *same* room serialize while different rooms don't contend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use terra_core::config::Config;
use terra_core::{Error, ID};
use terra_map::CellStore;
use terra_sim::{Player, RoomId, RoomState, RoomStatus, TickWorker, WorkerHandle, WorkerStatus};
use terra_store::{MapChunkRecord, MapMappingsRecord, RoomRecord, SnapshotRecord, Store};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::hub::Hub;

/// Inputs for `createRoom`: map shape plus the founding creator's
/// credentials (they're added to the room's player list up front).
pub struct CreateRoomRequest {
    pub room_name: String,
    pub creator_id: String,
    pub creator_password: String,
    pub width: u32,
    pub height: u32,
    pub seed: u32,
    pub num_blobs: usize,
}

pub struct CreatedRoom {
    pub room_id: RoomId,
    pub join_code: String,
    pub status: RoomStatus,
}

struct RoomEntry {
    handle: WorkerHandle,
    map: Arc<CellStore>,
    join: JoinHandle<()>,
    /// Per-room lifecycle lock: start/stop/pause/unpause on one room never
    /// race each other, but two different rooms never wait on each other.
    lifecycle: Mutex<()>,
    last_activity: Mutex<Instant>,
    join_code: String,
    snapshot_task: JoinHandle<()>,
    /// Restart attempts made since the worker last entered `Errored`; reset
    /// implicitly whenever a fresh worker is spawned for this room.
    restart_attempts: u32,
    /// Earliest time the sweeper will attempt another restart, implementing
    /// the exponential backoff between attempts.
    next_restart_at: Instant,
}

pub struct RoomManager {
    store: Arc<dyn Store>,
    hub: Arc<Hub>,
    cfg: Config,
    rooms: RwLock<HashMap<RoomId, RoomEntry>>,
}

impl RoomManager {
    pub fn new(store: Arc<dyn Store>, hub: Arc<Hub>, cfg: Config) -> Self {
        Self { store, hub, cfg, rooms: RwLock::new(HashMap::new()) }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Applies the reset-on-boot / clear-rooms environment toggles: either
    /// wipes every persisted room before the server starts accepting
    /// traffic, or leaves the store untouched. Map chunks and mappings are
    /// left in place either way -- they're content-addressed by `mapId` and
    /// orphaning them costs storage, not correctness.
    pub async fn bootstrap(&self) -> Result<(), Error> {
        if !self.cfg.runtime.reset_on_boot && !self.cfg.runtime.clear_rooms {
            return Ok(());
        }
        for room_id in self.store.list_room_ids().await? {
            self.store.delete_room(room_id).await?;
        }
        log::info!("cleared all persisted rooms on boot");
        Ok(())
    }

    pub async fn room_map(&self, room_id: RoomId) -> Option<Arc<CellStore>> {
        self.rooms.read().await.get(&room_id).map(|e| e.map.clone())
    }

    pub async fn room_snapshot(&self, room_id: RoomId) -> Option<RoomState> {
        let handle = self.rooms.read().await.get(&room_id).map(|e| e.handle.clone());
        match handle {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        }
    }

    pub async fn worker_handle(&self, room_id: RoomId) -> Option<WorkerHandle> {
        self.rooms.read().await.get(&room_id).map(|e| e.handle.clone())
    }

    pub async fn touch_room(&self, room_id: RoomId) {
        if let Some(entry) = self.rooms.read().await.get(&room_id) {
            *entry.last_activity.lock().await = Instant::now();
        }
    }

    /// Generates the map, persists its chunks + mapping table, initializes
    /// room state with the creator already seated, and starts the
    /// scheduler. Map generation and persistence happen before the worker
    /// exists, so a generator failure never leaves an orphaned room.
    pub async fn create_room(&self, req: CreateRoomRequest) -> Result<CreatedRoom, Error> {
        let room_id = RoomId::default();
        let map_id: ID<terra_store::MapMarker> = ID::default();

        let generator = terra_worldgen::Generator::new(req.width, req.height, req.seed, req.num_blobs, self.cfg.world.clone())
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let map = generator.generate();
        let store_handle = CellStore::new(map, self.cfg.runtime.max_rows_per_chunk);

        self.persist_chunks(map_id, &store_handle).await?;

        let mut state = RoomState::new(room_id, req.room_name.clone(), req.creator_id.clone());
        state.players.push(Player { user_id: req.creator_id.clone(), password: req.creator_password.clone() });
        state.status = RoomStatus::Open;

        let join_code = generate_join_code();
        let record = RoomRecord {
            room_id: room_id.cast(),
            map_id,
            room_name: req.room_name,
            creator_id: req.creator_id,
            join_code: join_code.clone(),
            status: "open".to_string(),
            tick_count: 0,
            players: vec![terra_store::PlayerRecord { user_id: state.players[0].user_id.clone(), password: state.players[0].password.clone() }],
            game_state: serde_json::json!({}),
        };
        self.store.create_room(record).await?;

        let map = Arc::new(store_handle);
        let (handle, join) = self.spawn_worker(state, map.clone());

        let snapshot_task = self.spawn_snapshot_writer(room_id, handle.clone());

        let entry = RoomEntry {
            handle,
            map,
            join,
            lifecycle: Mutex::new(()),
            last_activity: Mutex::new(Instant::now()),
            join_code: join_code.clone(),
            snapshot_task,
            restart_attempts: 0,
            next_restart_at: Instant::now(),
        };
        self.rooms.write().await.insert(room_id, entry);

        Ok(CreatedRoom { room_id, join_code, status: RoomStatus::Open })
    }

    /// Spawns a tick worker wired to broadcast through the hub. Shared by
    /// `create_room` and the restart path so a respawned worker after
    /// `Errored` is indistinguishable from a fresh one.
    fn spawn_worker(&self, state: RoomState, map: Arc<CellStore>) -> (WorkerHandle, JoinHandle<()>) {
        let hub = self.hub.clone();
        let use_packed_deltas = self.cfg.runtime.use_packed_deltas;
        TickWorker::spawn(state, map, self.cfg.clone(), move |room: &RoomState| {
            let hub = hub.clone();
            let snapshot = room.clone();
            tokio::spawn(async move {
                hub.broadcast(&snapshot, use_packed_deltas).await;
            });
        })
    }

    /// Writes a full `gameState`/`tickCount` snapshot off the per-tick hot
    /// path, on the configured interval, so a restarted process can resume
    /// without replaying every command a room ever saw.
    fn spawn_snapshot_writer(&self, room_id: RoomId, handle: WorkerHandle) -> JoinHandle<()> {
        let store = self.store.clone();
        let interval = Duration::from_millis(self.cfg.runtime.full_snapshot_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                let room = handle.snapshot().await;
                let game_state = crate::broadcast::build_game_state(&room, &mut BTreeMap::new(), true);
                let record = SnapshotRecord {
                    room_id: room_id.cast(),
                    tick_count: room.tick_count,
                    game_state: serde_json::json!(game_state),
                };
                if let Err(e) = store.save_snapshot(record).await {
                    log::warn!("snapshot write failed for room {room_id}: {e}");
                }
            }
        })
    }

    /// `joinRoom`: authenticates the supplied join code against the room's
    /// own, then enqueues the credential registration (component I's `join`
    /// validates everything else against the live snapshot).
    pub async fn join_room(&self, room_id: RoomId, user_id: &str, password: &str, join_code: &str) -> Result<(), Error> {
        let (handle, expected_code) = {
            let rooms = self.rooms.read().await;
            let entry = rooms.get(&room_id).ok_or_else(|| Error::NotFound(room_id.to_string()))?;
            (entry.handle.clone(), entry.join_code.clone())
        };
        if join_code != expected_code {
            return Err(Error::AuthFailed("wrong joinCode".into()));
        }
        let snapshot = handle.snapshot().await;
        let command = crate::intake::join(&snapshot, user_id, password)?;
        handle.enqueue(command)?;
        self.touch_room(room_id).await;
        Ok(())
    }

    /// `getState`: the HTTP equivalent of a WS `state` message, always sent
    /// full since an HTTP request has no standing subscriber to diff
    /// against.
    pub async fn get_state(&self, room_id: RoomId, user_id: &str, password: &str) -> Result<terra_dto::ServerMessage, Error> {
        let handle = self.worker_handle(room_id).await.ok_or_else(|| Error::NotFound(room_id.to_string()))?;
        let room = handle.snapshot().await;
        if room.player_by_credentials(user_id, password).is_none() {
            return Err(Error::AuthFailed(format!("unknown credentials for {user_id}")));
        }
        Ok(crate::broadcast::build_state_message(&room, &mut BTreeMap::new(), true, self.cfg.runtime.use_packed_deltas))
    }

    async fn persist_chunks(&self, map_id: ID<terra_store::MapMarker>, store_handle: &CellStore) -> Result<(), Error> {
        let metadata = store_handle.metadata();
        let mut chunks = Vec::new();
        let mut row = 0;
        while row < metadata.height {
            let payload = store_handle.rows(row, metadata.height);
            if payload.start_row == 0 {
                self.store
                    .save_mappings(MapMappingsRecord {
                        map_id,
                        biomes: payload.mappings.as_ref().map(|m| m.biomes.iter().map(|s| s.to_string()).collect()).unwrap_or_default(),
                        features: payload.mappings.as_ref().map(|m| m.features.iter().map(|s| s.to_string()).collect()).unwrap_or_default(),
                        resources: payload.mappings.as_ref().map(|m| m.resources.iter().map(|s| s.to_string()).collect()).unwrap_or_default(),
                    })
                    .await?;
            }
            chunks.push(MapChunkRecord {
                map_id,
                start_row: payload.start_row,
                cells: serde_json::to_value(&payload.chunk).map_err(|e| Error::Fatal(e.to_string()))?,
            });
            row = payload.end_row;
        }
        self.store.save_chunks(chunks).await
    }

    pub async fn pause_worker(&self, room_id: RoomId, user_id: &str) -> Result<(), Error> {
        self.with_lifecycle_lock(room_id, |entry| {
            entry.handle.pause();
            Ok(())
        })
        .await?;
        log::info!("room {room_id} paused by {user_id}");
        Ok(())
    }

    pub async fn unpause_worker(&self, room_id: RoomId, user_id: &str) -> Result<(), Error> {
        self.with_lifecycle_lock(room_id, |entry| {
            entry.handle.unpause();
            Ok(())
        })
        .await?;
        log::info!("room {room_id} unpaused by {user_id}");
        Ok(())
    }

    pub async fn stop_room(&self, room_id: RoomId) -> Result<(), Error> {
        let handle = { self.rooms.read().await.get(&room_id).map(|e| e.handle.clone()) };
        let Some(handle) = handle else { return Err(Error::NotFound(room_id.to_string())) };
        handle.stop();

        let entry = self.rooms.write().await.remove(&room_id);
        if let Some(entry) = entry {
            entry.snapshot_task.abort();
            let _ = tokio::time::timeout(Duration::from_secs(2), entry.join).await;
        }
        self.hub.drop_room(room_id).await;
        Ok(())
    }

    async fn with_lifecycle_lock<F>(&self, room_id: RoomId, f: F) -> Result<(), Error>
    where
        F: FnOnce(&RoomEntry) -> Result<(), Error>,
    {
        let rooms = self.rooms.read().await;
        let entry = rooms.get(&room_id).ok_or_else(|| Error::NotFound(room_id.to_string()))?;
        let _guard = entry.lifecycle.lock().await;
        f(entry)
    }

    /// Background sweeper: stops and drops any room with zero subscribers
    /// whose last activity exceeds the configured idle TTL.
    pub async fn sweep_idle_rooms(&self) {
        let idle_ttl = Duration::from_millis(self.cfg.runtime.idle_room_ttl_ms);
        let candidates: Vec<RoomId> = {
            let rooms = self.rooms.read().await;
            let mut out = Vec::new();
            for (&room_id, entry) in rooms.iter() {
                let idle_for = entry.last_activity.lock().await.elapsed();
                if idle_for > idle_ttl && self.hub.subscriber_count(room_id).await == 0 {
                    out.push(room_id);
                }
            }
            out
        };
        for room_id in candidates {
            log::info!("reaping idle room {room_id}");
            let _ = self.stop_room(room_id).await;
        }
    }

    /// Spawns the idle-room sweeper as a background task on the configured
    /// interval. Returns its join handle so the caller can hold/abort it.
    pub fn spawn_idle_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = self.clone();
        let interval = Duration::from_millis(manager.cfg.runtime.idle_sweep_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.sweep_idle_rooms().await;
            }
        })
    }

    /// Background sweeper: finds workers that exited after exhausting their
    /// tick-level failure budget (`WorkerStatus::Errored`) and either
    /// restarts them from their last known-good state or, once
    /// `Config::max_worker_restarts` is used up, fails the room
    /// permanently. Mirrors `sweep_idle_rooms`'s scan-then-act shape.
    pub async fn sweep_errored_workers(&self) {
        let now = Instant::now();
        let candidates: Vec<RoomId> = {
            let rooms = self.rooms.read().await;
            rooms
                .iter()
                .filter(|(_, entry)| entry.handle.status() == WorkerStatus::Errored && now >= entry.next_restart_at)
                .map(|(&room_id, _)| room_id)
                .collect()
        };
        for room_id in candidates {
            self.restart_or_fail_room(room_id).await;
        }
    }

    /// Spawns the errored-worker sweeper as a background task, reusing the
    /// tick period as its poll interval -- restarts don't need finer
    /// granularity than a tick.
    pub fn spawn_restart_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = self.clone();
        let interval = Duration::from_millis(manager.cfg.runtime.tick_period_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.sweep_errored_workers().await;
            }
        })
    }

    async fn restart_or_fail_room(&self, room_id: RoomId) {
        let last_state = {
            let rooms = self.rooms.read().await;
            let Some(entry) = rooms.get(&room_id) else { return };
            entry.handle.snapshot().await
        };

        let respawned = {
            let mut rooms = self.rooms.write().await;
            let Some(entry) = rooms.get_mut(&room_id) else { return };
            if entry.handle.status() != WorkerStatus::Errored {
                return;
            }
            if entry.restart_attempts >= self.cfg.runtime.max_worker_restarts {
                None
            } else {
                entry.restart_attempts += 1;
                let backoff = Duration::from_millis(self.cfg.runtime.worker_restart_backoff_base_ms.max(1))
                    * 2u32.pow(entry.restart_attempts.saturating_sub(1).min(10));
                entry.next_restart_at = Instant::now() + backoff;

                let (handle, join) = self.spawn_worker(last_state, entry.map.clone());
                entry.handle = handle;
                let old_join = std::mem::replace(&mut entry.join, join);
                old_join.abort();
                log::warn!(
                    "room {room_id} restarted worker (attempt {} of {})",
                    entry.restart_attempts,
                    self.cfg.runtime.max_worker_restarts
                );
                Some(())
            }
        };

        if respawned.is_none() {
            self.fail_room(room_id).await;
        }
    }

    /// Permanently fails a room once its worker has exhausted its restart
    /// budget: marks it `error` in the store, sends subscribers a final
    /// error message, and tears down its entry the same way `stop_room`
    /// does.
    async fn fail_room(&self, room_id: RoomId) {
        log::error!("room {room_id} exhausted its restart budget, marking error");
        self.hub.broadcast_error(room_id, "room worker exhausted its restart budget").await;

        if let Ok(Some(mut record)) = self.store.load_room(room_id.cast()).await {
            record.status = "error".to_string();
            if let Err(e) = self.store.save_room(record).await {
                log::warn!("failed to persist error status for room {room_id}: {e}");
            }
        }

        let entry = self.rooms.write().await.remove(&room_id);
        if let Some(entry) = entry {
            entry.snapshot_task.abort();
            entry.join.abort();
        }
        self.hub.drop_room(room_id).await;
    }
}

/// A 6-character, unambiguous-alphabet join code derived from a fresh
/// UUID's randomness -- avoids pulling in a dedicated RNG crate for
/// something this infrequent.
fn generate_join_code() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let bytes = uuid::Uuid::new_v4().into_bytes();
    bytes.iter().take(6).map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_store::InMemoryStore;

    fn manager() -> RoomManager {
        RoomManager::new(Arc::new(InMemoryStore::new()), Arc::new(Hub::new()), Config::default())
    }

    fn request() -> CreateRoomRequest {
        CreateRoomRequest {
            room_name: "room".into(),
            creator_id: "creator".into(),
            creator_password: "pw".into(),
            width: 20,
            height: 20,
            seed: 7,
            num_blobs: 3,
        }
    }

    #[tokio::test]
    async fn create_room_starts_open_with_a_six_char_join_code() {
        let manager = manager();
        let created = manager.create_room(request()).await.unwrap();
        assert_eq!(created.join_code.len(), 6);
        assert_eq!(created.status, RoomStatus::Open);

        let snapshot = manager.room_snapshot(created.room_id).await.unwrap();
        assert_eq!(snapshot.status, RoomStatus::Open);
        assert!(manager.room_map(created.room_id).await.is_some());

        manager.stop_room(created.room_id).await.unwrap();
    }

    #[tokio::test]
    async fn pause_requires_a_known_room() {
        let manager = manager();
        let err = manager.pause_worker(RoomId::default(), "creator").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn join_room_rejects_wrong_code_then_accepts_right_one() {
        let manager = manager();
        let created = manager.create_room(request()).await.unwrap();

        let err = manager.join_room(created.room_id, "p1", "pw", "WRONGC").await.unwrap_err();
        assert!(matches!(err, Error::AuthFailed(_)));

        manager.join_room(created.room_id, "p1", "pw", &created.join_code).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        let snapshot = manager.room_snapshot(created.room_id).await.unwrap();
        assert!(snapshot.players.iter().any(|p| p.user_id == "p1"));

        manager.stop_room(created.room_id).await.unwrap();
    }

    #[tokio::test]
    async fn pause_then_stop_lifecycle() {
        let manager = manager();
        let created = manager.create_room(request()).await.unwrap();
        manager.pause_worker(created.room_id, "creator").await.unwrap();
        manager.unpause_worker(created.room_id, "creator").await.unwrap();
        manager.stop_room(created.room_id).await.unwrap();
        assert!(manager.room_snapshot(created.room_id).await.is_none());
    }
}
