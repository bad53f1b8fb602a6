//! # socketio09
//!
//! Client for the socket.io 0.9 protocol (`/socket.io/1`) over WebSocket.
//!
//! ## Features
//!
//! - **Handshake + upgrade**: HTTP session negotiation, then WebSocket I/O
//! - **Typed handlers**: event arguments bound through serde at dispatch
//! - **Acknowledgments**: `emit_with_ack` with a per-session deadline
//! - **Backpressure**: bounded outbound queue with overflow tracking and
//!   flood shutdown
//! - **Pluggable transport**: the engine runs over any [`Transport`]

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;
pub use traits::{error, headers, transport};

// Re-export core client functionality
pub use core::{
    acks, backpressure, builder, client, config, connection, frame, handshake, heartbeat,
    overflow, registry, websocket,
    AckPayload, ClientBuilder, ClientConfig, CloseReason, Connection, ConnectionId,
    ConnectionOptions, ConnectionTasks, Dispatch, EventHandler, EventRegistry, Frame, FrameKind,
    HandlerShape, HandshakeResponse, Metrics, OverflowRegistry, Pressure, SessionTimings,
    SocketIoClient, WebSocketTransport, CONNECT_EVENT, DISCONNECT_EVENT,
};

// Convenience function
pub use core::builder as client_builder;
