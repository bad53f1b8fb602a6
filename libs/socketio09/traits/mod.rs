//! # socket.io client traits
//!
//! Capabilities the protocol engine is written against:
//!
//! - **Transport**: raw text frame I/O underneath a connection
//! - **HeaderProvider**: extra HTTP headers for handshake and upgrade
//! - **SocketIoError**: the error taxonomy shared by every layer

pub mod error;
pub mod headers;
pub mod transport;

pub use error::{Result, SocketIoError};
pub use headers::{HeaderProvider, Headers, NoHeaders, StaticHeaders};
pub use transport::Transport;
