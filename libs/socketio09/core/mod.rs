//! # socket.io 0.9 protocol engine
//!
//! Layers, bottom-up:
//!
//! - [`frame`]: wire text ⇄ [`Frame`] codec
//! - [`acks`]: ack id allocation and waiter correlation
//! - [`registry`]: event name → typed handler table
//! - [`backpressure`] / [`overflow`]: outbound queue thresholds and the
//!   shared set of backed-up connections
//! - [`connection`]: reader, writer and [`heartbeat`] tasks around a
//!   [`Transport`](crate::Transport)
//! - [`handshake`] / [`websocket`]: session negotiation and the
//!   tokio-tungstenite transport
//! - [`client`] / [`builder`]: the public entry point
//!
//! ## Example
//!
//! ```rust,ignore
//! use socketio09::{EventHandler, SocketIoClient};
//!
//! #[tokio::main]
//! async fn main() -> socketio09::Result<()> {
//!     let client = SocketIoClient::builder()
//!         .url("http://localhost:4500/socket.io/1")
//!         .on("connect", EventHandler::new(|_conn| println!("connected")))?
//!         .on("news", EventHandler::with_args(|_conn, args: Vec<String>| {
//!             println!("news: {:?}", args);
//!         }))?
//!         .connect()
//!         .await?;
//!
//!     client.emit("subscribe", &"sports")?;
//!     let reply = client.emit_with_ack("ping", &()).await?;
//!     println!("ack: {}", reply.as_str());
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod acks;
pub mod backpressure;
pub mod builder;
pub mod client;
pub mod config;
pub mod connection;
pub mod frame;
pub mod handshake;
pub mod heartbeat;
pub mod overflow;
pub mod registry;
pub mod websocket;

// Re-export main types
pub use acks::{AckCorrelator, AckHandle, AckPayload, PendingAck};
pub use backpressure::{Pressure, DEFAULT_QUEUE_CAPACITY};
pub use builder::{states, ClientBuilder};
pub use client::SocketIoClient;
pub use config::{ClientConfig, ConnectionOptions, SessionTimings};
pub use connection::{CloseReason, Connection, ConnectionTasks, Metrics};
pub use frame::{AckId, Frame, FrameKind};
pub use handshake::HandshakeResponse;
pub use overflow::{ConnectionId, OverflowRegistry};
pub use registry::{
    Dispatch, EventHandler, EventRegistry, HandlerShape, CONNECT_EVENT, DISCONNECT_EVENT,
};
pub use websocket::WebSocketTransport;

// Re-export traits for convenience
pub use crate::traits::*;

/// Create a new client builder
///
/// Convenience for `SocketIoClient::builder()`.
pub fn builder() -> ClientBuilder<states::NoUrl> {
    ClientBuilder::new()
}
