//! HTTP handlers for room lifecycle and gameplay commands (component I's
//! wire side). Each handler parses its request, calls either the room
//! manager directly (lifecycle) or a `terra_hosting::intake` validator plus
//! `WorkerHandle::enqueue` (gameplay commands), and maps the result onto
//! the documented error taxonomy.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use terra_core::{Error, ID};
use terra_dto::http::{
    ArrowRequest, BuildCityRequest, ClearArrowRequest, CreateRoomRequest, CreateRoomResponse, CreatorActionRequest,
    CredentialedRequest, FoundNationRequest, JoinRoomRequest, JoinRoomResponse, MapDimensionsDto, OkResponse,
    RoomDataResponse, RoomMetadataResponse,
};
use terra_hosting::{intake, RoomManager};
use terra_sim::{ArrowType, RoomId};

fn error_response(e: Error) -> HttpResponse {
    let status = match &e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::AuthFailed(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Forbidden(_) => StatusCode::FORBIDDEN,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Unaffordable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::GameEnded => StatusCode::GONE,
        Error::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let code = match &e {
        Error::Conflict(c) => Some(c.code()),
        _ => None,
    };
    HttpResponse::build(status).json(serde_json::json!({
        "error": e.kind(),
        "code": code,
        "message": e.to_string(),
    }))
}

fn parse_room_id(raw: uuid::Uuid) -> RoomId {
    ID::from(raw)
}

pub async fn create_room(manager: web::Data<Arc<RoomManager>>, body: web::Json<CreateRoomRequest>) -> impl Responder {
    let body = body.into_inner();
    let seed = body.map_spec.seed.unwrap_or_else(default_seed);
    let request = terra_hosting::CreateRoomRequest {
        room_name: body.room_name,
        creator_id: body.creator.id,
        creator_password: body.creator.password,
        width: body.map_spec.width,
        height: body.map_spec.height,
        seed,
        num_blobs: body.map_spec.num_blobs as usize,
    };
    match manager.create_room(request).await {
        Ok(created) => HttpResponse::Ok().json(CreateRoomResponse {
            room_id: created.room_id.to_string(),
            join_code: created.join_code,
            status: format!("{:?}", created.status).to_lowercase(),
        }),
        Err(e) => error_response(e),
    }
}

/// No RNG crate in the dependency stack for something this infrequent;
/// system time jitter is plenty when the caller didn't pin a seed.
fn default_seed() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0)
}

pub async fn room_metadata(manager: web::Data<Arc<RoomManager>>, path: web::Path<uuid::Uuid>) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    match manager.room_map(room_id).await {
        Some(map) => {
            let metadata = map.metadata();
            HttpResponse::Ok().json(RoomMetadataResponse {
                map: MapDimensionsDto { width: metadata.width, height: metadata.height },
                config: serde_json::json!(manager.config()),
            })
        }
        None => error_response(Error::NotFound(room_id.to_string())),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRangeQuery {
    pub start_row: u32,
    pub end_row: u32,
}

pub async fn room_data(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    query: web::Query<RowRangeQuery>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    match manager.room_map(room_id).await {
        Some(map) => {
            let payload = map.rows(query.start_row, query.end_row);
            HttpResponse::Ok().json(RoomDataResponse {
                start_row: payload.start_row,
                end_row: payload.end_row,
                total_rows: payload.total_rows,
                chunk: serde_json::json!(payload.chunk),
                mappings: payload.mappings.map(|m| terra_dto::ChunkMappings {
                    biomes: m.biomes.iter().map(|s| s.to_string()).collect(),
                    features: m.features.iter().map(|s| s.to_string()).collect(),
                    resources: m.resources.iter().map(|s| s.to_string()).collect(),
                }),
            })
        }
        None => error_response(Error::NotFound(room_id.to_string())),
    }
}

pub async fn join_room(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<JoinRoomRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    match manager.join_room(room_id, &body.user_id, &body.password, &body.join_code).await {
        Ok(()) => HttpResponse::Ok().json(JoinRoomResponse { user_id: body.user_id.clone() }),
        Err(e) => error_response(e),
    }
}

pub async fn get_state(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<CredentialedRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    match manager.get_state(room_id, &body.user_id, &body.password).await {
        Ok(message) => HttpResponse::Ok().content_type("application/json").body(message.to_json()),
        Err(e) => error_response(e),
    }
}

/// Validates against the room's current snapshot (component I) then
/// enqueues onto the room's worker (component F) -- the shared tail of
/// every gameplay-command handler below.
async fn validate_and_enqueue(
    manager: &RoomManager,
    room_id: RoomId,
    build: impl FnOnce(&terra_sim::RoomState) -> Result<terra_sim::Command, Error>,
) -> Result<(), Error> {
    let handle = manager.worker_handle(room_id).await.ok_or_else(|| Error::NotFound(room_id.to_string()))?;
    let snapshot = handle.snapshot().await;
    let command = build(&snapshot)?;
    handle.enqueue(command)?;
    manager.touch_room(room_id).await;
    Ok(())
}

pub async fn found_nation(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<FoundNationRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let Some(map) = manager.room_map(room_id).await else {
        return error_response(Error::NotFound(room_id.to_string()));
    };
    let metadata = map.metadata();
    let sea_level = manager.config().world.sea_level;
    let in_bounds = body.x < metadata.width && body.y < metadata.height;
    let is_land = in_bounds && map.is_land(body.x, body.y, sea_level);
    let is_river = in_bounds && map.is_river(body.x, body.y);
    let result = validate_and_enqueue(&manager, room_id, |room| {
        intake::found_nation(room, metadata.width, metadata.height, is_land, is_river, &body.user_id, &body.password, body.x, body.y)
    })
    .await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

pub async fn build_city(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<BuildCityRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let result = validate_and_enqueue(&manager, room_id, |room| {
        intake::build_city(room, &body.user_id, &body.password, body.x, body.y, body.city_type.clone(), body.city_name.clone())
    })
    .await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

fn parse_arrow_type(raw: &str) -> Result<ArrowType, Error> {
    match raw {
        "attack" => Ok(ArrowType::Attack),
        "defend" => Ok(ArrowType::Defend),
        other => Err(Error::InvalidInput(format!("unknown arrow type {other}"))),
    }
}

pub async fn arrow(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<ArrowRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let arrow_type = match parse_arrow_type(&body.arrow_type) {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    let path_cells: Vec<(u32, u32)> = body.path.iter().map(|[x, y]| (*x, *y)).collect();
    let result = validate_and_enqueue(&manager, room_id, |room| {
        intake::arrow(room, &body.user_id, &body.password, arrow_type, path_cells, body.percent)
    })
    .await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

pub async fn clear_arrow(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<ClearArrowRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let arrow_type = match parse_arrow_type(&body.arrow_type) {
        Ok(t) => t,
        Err(e) => return error_response(e),
    };
    let result = validate_and_enqueue(&manager, room_id, |room| intake::clear_arrow(room, &body.user_id, &body.password, arrow_type)).await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

pub async fn pause(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<CreatorActionRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let result = validate_and_enqueue(&manager, room_id, |room| intake::pause(room, &body.user_id, &body.password)).await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

pub async fn unpause(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<CreatorActionRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let result = validate_and_enqueue(&manager, room_id, |room| intake::unpause(room, &body.user_id, &body.password)).await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

pub async fn end(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<CreatorActionRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let result = validate_and_enqueue(&manager, room_id, |room| intake::end(room, &body.user_id, &body.password)).await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}

pub async fn quit(
    manager: web::Data<Arc<RoomManager>>,
    path: web::Path<uuid::Uuid>,
    body: web::Json<CreatorActionRequest>,
) -> impl Responder {
    let room_id = parse_room_id(path.into_inner());
    let result = validate_and_enqueue(&manager, room_id, |room| intake::quit(room, &body.user_id, &body.password)).await;
    match result {
        Ok(()) => HttpResponse::Ok().json(OkResponse::default()),
        Err(e) => error_response(e),
    }
}
