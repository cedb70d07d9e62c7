//! Per-room simulation: state model, nation updater, tick scheduler, and
//! delta engine (components D, E, F, G).
pub mod command;
pub mod nation;
pub mod scheduler;
pub mod state;
pub mod territory;
pub mod updater;

pub use command::Command;
pub use nation::{ArrowOrder, ArrowType, City, Nation, NationStatus, Structure};
pub use scheduler::{TickWorker, WorkerHandle, WorkerStatus};
pub use state::{group_by_owner, Player, RoomId, RoomState, RoomStatus};
pub use territory::{Delta, Territory};
pub use updater::advance;
