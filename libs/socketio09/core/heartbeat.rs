//! Client heartbeat ticker
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │                     │
//! │  Every interval:    │
//! │  1. Wait for tick   │
//! │  2. Still alive? ───┼──> no: exit
//! │  3. Enqueue "2::" ──┼──> Outbound queue ──> Writer ──> Transport
//! └─────────────────────┘
//! ```
//!
//! The interval is half the heartbeat timeout announced in the handshake.
//! A full queue only skips that beat; the writer's backpressure check decides
//! whether the connection survives.

use crate::core::connection::Connection;
use crate::core::frame::Frame;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Enqueue a heartbeat every `interval` until the connection closes
///
/// Spawned by [`Connection::start`] when the handshake announced a heartbeat
/// timeout. The task will:
/// 1. Wait for the first interval (skips immediate first tick)
/// 2. On each tick, enqueue `2::` on the connection's outbound queue
/// 3. Exit as soon as the connection closes
///
/// # Arguments
/// * `connection` - The connection to keep alive
/// * `interval` - Duration between heartbeats, half the server's timeout
pub async fn heartbeat_task(connection: Arc<Connection>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("[{}] Heartbeat task started with interval: {:?}", connection.id(), interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = connection.wait_closed() => break,
        }

        if let Err(e) = connection.send_frame(&Frame::heartbeat()) {
            debug!("[{}] Heartbeat not queued: {}", connection.id(), e);
        }
    }

    debug!("[{}] Heartbeat task exiting", connection.id());
}
