//! Listener binary for socket.io 0.9 servers
//!
//! Connects to `SOCKETIO_URL`, logs the events named on the command line,
//! optionally emits `SOCKETIO_ACK_EVENT` with an ack, and disconnects after
//! `SOCKETIO_RUN_SECS` seconds, on Ctrl+C, or when the server goes away.
//!
//! ```text
//! SOCKETIO_URL=http://localhost:4500/socket.io/1 socketio_listen news chat
//! ```

use anyhow::{Context, Result};
use socketio09_client::bin_common::{init_tracing, parse_args, ListenConfig};
use socketio09_client::socketio09::{
    Connection, EventHandler, SocketIoClient, CONNECT_EVENT, DISCONNECT_EVENT,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = ListenConfig::from_env(parse_args())?;

    info!("========================================");
    info!("Starting socketio_listen");
    info!("Server: {}", config.url);
    info!("Events: {:?}", config.events);
    info!("Press Ctrl+C to stop");
    info!("========================================");

    let mut builder = SocketIoClient::builder()
        .url(config.url.as_str())
        .on(
            CONNECT_EVENT,
            EventHandler::new(|conn: &Connection| info!("[{}] Session confirmed", conn.id())),
        )?
        .on(
            DISCONNECT_EVENT,
            EventHandler::new(|conn: &Connection| {
                let reason = conn
                    .close_reason()
                    .map(|reason| reason.to_string())
                    .unwrap_or_default();
                info!("[{}] Disconnected: {}", conn.id(), reason);
            }),
        )?;

    for event in &config.events {
        let name = event.clone();
        builder = builder.on(
            event.clone(),
            EventHandler::with_args(move |conn: &Connection, args: serde_json::Value| {
                info!("[{}] {} {}", conn.id(), name, args);
            }),
        )?;
    }

    let client = builder
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", config.url))?;

    if let Some(event) = &config.ack_event {
        match client.emit_with_ack(event, &()).await {
            Ok(reply) => info!("Ack for {}: {}", event, reply.as_str()),
            Err(e) => warn!("No ack for {}: {}", event, e),
        }
    }

    tokio::select! {
        _ = tokio::time::sleep(config.run_for) => info!("Run time elapsed"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = client.closed() => warn!("Connection ended by server"),
    }

    let metrics = client.metrics();
    client.shutdown().await;

    info!("========================================");
    info!("socketio_listen stopped");
    info!(
        "Frames sent: {}, received: {}",
        metrics.frames_sent, metrics.frames_received
    );
    info!("========================================");
    Ok(())
}
