//! Terra game server binary.
//!
//! Combines the HTTP/WebSocket hosting surface into a single server.
//! Runs on BIND_ADDR (e.g. 0.0.0.0:8888).

#[tokio::main]
async fn main() {
    terra_core::log();
    terra_core::kys();
    terra_core::brb();
    terra_server::run().await.unwrap();
}
