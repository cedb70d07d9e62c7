//! WebSocket bridging for the client control protocol (component H's wire
//! side). One session per socket: a first `subscribe` message authenticates
//! against the room's player list and binds the hub channel; everything
//! after that is `tokio::select!`-driven fan-in between the socket and the
//! hub's outbound channel, mirroring the teacher's bridge between a
//! player's transport and its room -- just fanned out to many viewers
//! instead of one seat.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use futures::StreamExt;
use terra_dto::{ClientMessage, ServerMessage};
use terra_sim::RoomId;

use crate::manager::RoomManager;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const MAX_MISSED_PONGS: u32 = 2;

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    manager: web::Data<Arc<RoomManager>>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    actix_web::rt::spawn(run_session(session, msg_stream, manager.get_ref().clone()));
    Ok(response)
}

/// A session starts unsubscribed; the first valid `subscribe` message binds
/// `room_id`/`user_id` and opens the hub channel. A session may only ever
/// be bound to one room at a time -- a second `subscribe` replaces it.
struct Bound {
    room_id: RoomId,
    user_id: String,
    rx: tokio::sync::mpsc::Receiver<ServerMessage>,
}

async fn run_session(mut session: actix_ws::Session, mut msg_stream: actix_ws::MessageStream, manager: Arc<RoomManager>) {
    let mut bound: Option<Bound> = None;
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.tick().await; // first tick fires immediately; skip it

    loop {
        let outbound = async {
            match &mut bound {
                Some(b) => b.rx.recv().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            incoming = msg_stream.next() => {
                match incoming {
                    Some(Ok(actix_ws::Message::Text(text))) => {
                        if !handle_client_message(&text, &mut session, &mut bound, &manager).await {
                            break;
                        }
                    }
                    Some(Ok(actix_ws::Message::Pong(_))) => {
                        if let Some(b) = &bound {
                            manager.hub().record_pong(b.room_id, &b.user_id).await;
                        }
                    }
                    Some(Ok(actix_ws::Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(actix_ws::Message::Close(reason))) => {
                        let _ = session.close(reason).await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }

            message = outbound => {
                match message {
                    Some(message) => {
                        if session.text(message.to_json()).await.is_err() {
                            break;
                        }
                    }
                    None => break, // hub dropped us (slow consumer or keepalive timeout)
                }
            }

            _ = keepalive.tick() => {
                if let Some(b) = &bound {
                    let missed = manager.hub().sweep_keepalive(b.room_id, MAX_MISSED_PONGS).await;
                    if missed.iter().any(|u| u == &b.user_id) {
                        break;
                    }
                }
                if session.ping(b"keepalive").await.is_err() {
                    break;
                }
            }

        }
    }

    if let Some(b) = bound {
        manager.hub().leave(b.room_id, &b.user_id).await;
    }
    let _ = session.close(None).await;
}

/// Handles one inbound text frame. Returns `false` when the session should
/// end (malformed frame on a protocol that doesn't tolerate garbage, or the
/// underlying send failed).
async fn handle_client_message(
    text: &str,
    session: &mut actix_ws::Session,
    bound: &mut Option<Bound>,
    manager: &Arc<RoomManager>,
) -> bool {
    let message = match ClientMessage::from_json(text) {
        Ok(m) => m,
        Err(e) => return send_error(session, format!("malformed message: {e}")).await,
    };

    match message {
        ClientMessage::Subscribe { room_id, user_id, password, full } => {
            let Ok(uuid) = room_id.parse::<uuid::Uuid>() else {
                return send_error(session, "invalid roomId".to_string()).await;
            };
            let room_id = RoomId::from(uuid);
            let Some(room) = manager.room_snapshot(room_id).await else {
                return send_error(session, "room not found".to_string()).await;
            };
            if room.player_by_credentials(&user_id, &password).is_none() {
                return send_error(session, "authentication failed".to_string()).await;
            }

            let full = full.unwrap_or(true);
            let rx = manager.hub().join(room_id, user_id.clone(), full).await;
            manager.touch_room(room_id).await;
            *bound = Some(Bound { room_id, user_id, rx });

            let ack = ServerMessage::Subscribed { room_id: uuid.to_string(), full };
            session.text(ack.to_json()).await.is_ok()
        }
        ClientMessage::Unsubscribe => {
            if let Some(b) = bound.take() {
                manager.hub().leave(b.room_id, &b.user_id).await;
            }
            true
        }
    }
}

async fn send_error(session: &mut actix_ws::Session, message: String) -> bool {
    session.text(ServerMessage::Error { message }.to_json()).await.is_ok()
}
