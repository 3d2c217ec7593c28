//! Room relay server.
//!
//! Run with: cargo run --bin relay-server

use room_relay_server::{Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    println!("Starting room relay ({} rooms)...", config.room_mode);
    println!("  HTTP: http://{}", config.http_addr);
    println!("  WS:   ws://{}/websocket?roomCode={{code}}", config.http_addr);
    println!();
    println!("Endpoints:");
    println!("  POST /api            - Resolve room (body: {{\"roomCode\": \"code\"}})");
    println!("  GET  /websocket      - Join room (Upgrade: websocket)");
    println!("  *    /*              - Hello, world!");
    println!();

    let server = Server::builder().config(config).build()?;
    server.run().await?;

    Ok(())
}
