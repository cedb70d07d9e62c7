//! Unified HTTP and WebSocket server wiring for the terra game backend.
//!
//! Combines the REST surface for room lifecycle and commands (component I,
//! via [`routes`]) with the WebSocket subscription bridge (component H,
//! `terra_hosting::ws_index`) behind one `RoomManager` (component J).
//!
//! ## Submodules
//!
//! - [`routes`] — HTTP handlers for createRoom/joinRoom/foundNation/etc.

pub mod routes;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use terra_core::config::Config;
use terra_hosting::{Hub, RoomManager};
use terra_store::{InMemoryStore, Store};

async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

/// Boots the persistence layer, applies the reset-on-boot/clear-rooms
/// toggles, and starts the idle-room sweeper before serving any traffic.
async fn build_manager(cfg: Config) -> Result<Arc<RoomManager>, std::io::Error> {
    let store: Arc<dyn Store> = match std::env::var("DB_URL") {
        Ok(_) => Arc::new(terra_store::postgres::PostgresStore::connect().await),
        Err(_) => Arc::new(InMemoryStore::new()),
    };
    let manager = Arc::new(RoomManager::new(store, Arc::new(Hub::new()), cfg));
    manager.bootstrap().await.map_err(to_io_error)?;
    manager.clone().spawn_idle_sweeper();
    manager.clone().spawn_restart_sweeper();
    Ok(manager)
}

fn to_io_error(e: terra_core::Error) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

#[rustfmt::skip]
pub async fn run() -> Result<(), std::io::Error> {
    let cfg = Config::from_env();
    let manager = web::Data::new(build_manager(cfg).await?);

    log::info!("starting terra server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header(),
            )
            .app_data(manager.clone())
            .route("/health", web::get().to(health))
            .route("/ws", web::get().to(terra_hosting::ws_index))
            .service(
                web::scope("/room")
                    .route("", web::post().to(routes::create_room))
                    .route("/{room_id}/metadata", web::get().to(routes::room_metadata))
                    .route("/{room_id}/data", web::get().to(routes::room_data))
                    .route("/{room_id}/join", web::post().to(routes::join_room))
                    .route("/{room_id}/state", web::post().to(routes::get_state))
                    .route("/{room_id}/found-nation", web::post().to(routes::found_nation))
                    .route("/{room_id}/build-city", web::post().to(routes::build_city))
                    .route("/{room_id}/arrow", web::post().to(routes::arrow))
                    .route("/{room_id}/clear-arrow", web::post().to(routes::clear_arrow))
                    .route("/{room_id}/pause", web::post().to(routes::pause))
                    .route("/{room_id}/unpause", web::post().to(routes::unpause))
                    .route("/{room_id}/end", web::post().to(routes::end))
                    .route("/{room_id}/quit", web::post().to(routes::quit)),
            )
    })
    .workers(6)
    .bind(std::env::var("BIND_ADDR").expect("BIND_ADDR must be set"))?
    .run()
    .await
}
