use thiserror::Error;

use crate::core::frame::FrameKind;

/// Main error type for the socket.io 0.9 client
#[derive(Error, Debug)]
pub enum SocketIoError {
    /// Inbound text does not have the shape of a socket.io frame
    #[error("Protocol error: invalid packet received: {0}")]
    MalformedFrame(String),

    /// Inbound frame carries a type code this client does not handle
    #[error("Protocol error: unexpected inbound message type: {0}")]
    UnexpectedInboundType(String),

    /// Attempted to encode a frame kind the client never sends
    #[error("Protocol error: unexpected outbound message type: {0:?}")]
    UnexpectedOutboundType(FrameKind),

    /// Underlying WebSocket read/write failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport delivered a binary frame
    #[error("Received non-text message at websocket")]
    NonTextPayload,

    /// The transport delivered an empty text frame
    #[error("Web socket message is empty and that is not allowed")]
    EmptyPayload,

    /// Connection is closed (or closed while the operation was in flight)
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// No pending ack is registered for this id (already resolved, timed out, or unknown)
    #[error("ACK listener not found for id {0}")]
    AckListenerNotFound(u64),

    /// No ack arrived before the receive deadline
    #[error("Timed out waiting for ack {id} after {waited_ms}ms")]
    AckTimeout { id: u64, waited_ms: u128 },

    /// Outbound queue is full; the message was not enqueued
    #[error("Outbound queue is full ({capacity} messages)")]
    Overflow { capacity: usize },

    /// Outbound queue reached the hard limit and the connection was closed
    #[error("Socket is flooded ({queued} queued messages)")]
    SocketFlooded { queued: usize },

    /// Handler declares an argument/return shape the registry cannot call
    #[error("Handler shape error: {0}")]
    HandlerShape(String),

    /// Event arguments could not be bound to the handler's argument type
    #[error("Failed to deserialize event arguments: {0}")]
    Deserialize(String),

    /// Outbound arguments could not be serialized
    #[error("Failed to serialize arguments: {0}")]
    Serialize(String),

    /// Handshake request or response failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SocketIoError {
    /// Whether this error ends the connection it occurred on.
    ///
    /// Anything that breaks frame-level understanding of the stream, or the
    /// stream itself, is fatal. Errors local to one request/response pair
    /// (acks, a rejected enqueue, handler binding) are not.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            SocketIoError::MalformedFrame(_)
                | SocketIoError::UnexpectedInboundType(_)
                | SocketIoError::Transport(_)
                | SocketIoError::NonTextPayload
                | SocketIoError::EmptyPayload
                | SocketIoError::ConnectionClosed(_)
                | SocketIoError::SocketFlooded { .. }
        )
    }
}

impl From<reqwest::Error> for SocketIoError {
    fn from(err: reqwest::Error) -> Self {
        SocketIoError::Handshake(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SocketIoError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SocketIoError::Transport(err.to_string())
    }
}

/// Result type for socket.io client operations
pub type Result<T> = std::result::Result<T, SocketIoError>;
