//! Real-time tile-based territorial strategy game server.
//!
//! This facade crate re-exports all public terra crates for convenient access.
//!
//! ## Crate Organization
//!
//! ### Core Types
//! - [`core`] — IDs, error taxonomy, configuration, logging helpers
//! - [`noise`] — Noise primitives feeding the world generator (component A)
//!
//! ### World Generation
//! - [`worldgen`] — Map generator: elevation, biomes, rivers (component B)
//! - [`map`] — Chunked cell storage and bandwidth-capped reads (component C)
//!
//! ### Simulation
//! - [`sim`] — Room state, nation updater, tick scheduler (components D/E/F)
//!
//! ### Wire and Persistence
//! - [`dto`] — Wire message and HTTP DTOs (component G's delta shapes)
//! - [`store`] — Room/map/snapshot persistence
//! - [`pg`] — Postgres connection helper
//!
//! ### Application
//! - [`hosting`] — Subscription hub, command intake, room manager (components H/I/J)
//! - [`server`] — Unified HTTP and WebSocket backend

pub use terra_core      as core;
pub use terra_noise     as noise;
pub use terra_worldgen  as worldgen;
pub use terra_map       as map;
pub use terra_dto       as dto;
pub use terra_store     as store;
pub use terra_sim       as sim;
pub use terra_hosting   as hosting;
pub use terra_pg        as pg;

#[cfg(feature = "server")]
pub use terra_server    as server;
