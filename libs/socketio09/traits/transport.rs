use crate::error::Result;
use async_trait::async_trait;

/// Raw text transport underneath a socket.io connection
///
/// The connection drives a transport from two independent tasks: the reader
/// calls [`receive`](Transport::receive) in a loop while the writer calls
/// [`send`](Transport::send), so implementations must allow both to be in
/// flight at the same time.
///
/// # Contract
/// - `receive` blocks until one text frame arrives or the implementation's
///   deadline elapses. Binary frames must be reported as
///   [`SocketIoError::NonTextPayload`](crate::SocketIoError::NonTextPayload)
///   and empty text as
///   [`SocketIoError::EmptyPayload`](crate::SocketIoError::EmptyPayload).
/// - `close` is synchronous and idempotent. After it returns, pending and
///   future `receive`/`send` calls fail with
///   [`SocketIoError::ConnectionClosed`](crate::SocketIoError::ConnectionClosed).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Receive the next text frame
    async fn receive(&self) -> Result<String>;

    /// Write one text frame
    async fn send(&self, text: String) -> Result<()>;

    /// Stop the transport
    fn close(&self);
}
