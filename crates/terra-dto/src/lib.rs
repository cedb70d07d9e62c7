//! Wire message and HTTP request/response types for the terra game server.

pub mod http;
pub mod pack;
pub mod response;

pub use response::{
    ChunkMappings, ClientMessage, Coords, DeltaCoords, GameStateDto, NationStateDto, NationStatus,
    ServerMessage, TerritoryPayload, WinningNationDto,
};
