//! Hosting infrastructure for live game rooms: the WebSocket subscription
//! hub, command intake, and the room manager that ties both to the tick
//! scheduler and persistence layer (components H, I, J).
//!
//! ## Core Types
//!
//! - [`Hub`] — per-room subscriber registry and broadcast fan-out
//! - [`RoomManager`] — room lifecycle: create, start, pause, stop
//!
//! ## HTTP/WS surface
//!
//! [`ws_index`] is the actix-web handler for the client control protocol's
//! WebSocket endpoint; [`intake`] exposes the validated entry points the
//! HTTP handlers (in `terra-server`) call before enqueueing a command.
mod broadcast;
mod hub;
pub mod intake;
mod manager;
mod ws;

pub use broadcast::mapping_table;
pub use hub::Hub;
pub use manager::{CreateRoomRequest, CreatedRoom, RoomManager};
pub use ws::ws_index;
