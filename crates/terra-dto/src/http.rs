//! HTTP request/response bodies. Shape only -- the transport (REST here,
//! could be gRPC/JSON-RPC elsewhere) is not this crate's concern.

use crate::response::ChunkMappings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CreatorDto {
    pub id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapSpecDto {
    pub width: u32,
    pub height: u32,
    #[serde(rename = "numBlobs", default = "default_num_blobs")]
    pub num_blobs: u32,
    pub seed: Option<u32>,
}

fn default_num_blobs() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(rename = "mapSpec")]
    pub map_spec: MapSpecDto,
    #[serde(rename = "roomName")]
    pub room_name: String,
    pub creator: CreatorDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomResponse {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "joinCode")]
    pub join_code: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomMetadataResponse {
    pub map: MapDimensionsDto,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapDimensionsDto {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
    #[serde(rename = "joinCode")]
    pub join_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinRoomResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialedRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub full: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoundNationRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildCityRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
    pub x: u32,
    pub y: u32,
    #[serde(rename = "cityType")]
    pub city_type: String,
    #[serde(rename = "cityName")]
    pub city_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrowRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
    #[serde(rename = "type")]
    pub arrow_type: String,
    pub path: Vec<[u32; 2]>,
    pub percent: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearArrowRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
    #[serde(rename = "type")]
    pub arrow_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatorActionRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}
impl Default for OkResponse {
    fn default() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomDataResponse {
    #[serde(rename = "startRow")]
    pub start_row: u32,
    #[serde(rename = "endRow")]
    pub end_row: u32,
    #[serde(rename = "totalRows")]
    pub total_rows: u32,
    pub chunk: serde_json::Value,
    pub mappings: Option<ChunkMappings>,
}
