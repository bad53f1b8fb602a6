use crate::core::backpressure::DEFAULT_QUEUE_CAPACITY;
use crate::core::connection::Connection;
use crate::core::handshake::HandshakeResponse;
use crate::core::overflow::OverflowRegistry;
use crate::core::registry::EventRegistry;
use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for the handshake HTTP request
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline used when the server disables heartbeats in its handshake
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Timers of one session, fixed for the connection's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// How often the client sends a heartbeat (`None` = never)
    pub heartbeat_interval: Option<Duration>,
    /// Heartbeat timeout announced by the server
    pub heartbeat_timeout: Option<Duration>,
    /// Per-read deadline, also the `emit_with_ack` deadline
    pub receive_timeout: Duration,
    /// Per-write deadline
    pub send_timeout: Duration,
    /// Close timeout announced by the server
    pub close_timeout: Option<Duration>,
}

impl SessionTimings {
    /// Derive timings from a handshake response
    ///
    /// The heartbeat interval is half the heartbeat timeout, and the
    /// send/receive deadlines equal it. Without a heartbeat timeout the
    /// ticker is disabled and both deadlines use `fallback`.
    pub fn from_handshake(response: &HandshakeResponse, fallback: Duration) -> Self {
        let deadline = response.heartbeat_timeout.unwrap_or(fallback);
        Self {
            heartbeat_interval: response.heartbeat_timeout.map(half_in_whole_seconds),
            heartbeat_timeout: response.heartbeat_timeout,
            receive_timeout: deadline,
            send_timeout: deadline,
            close_timeout: response.close_timeout,
        }
    }

    /// Timings for a connection not opened through a handshake
    pub fn fixed(heartbeat_interval: Option<Duration>, deadline: Duration) -> Self {
        Self {
            heartbeat_interval,
            heartbeat_timeout: heartbeat_interval.map(|interval| interval * 2),
            receive_timeout: deadline,
            send_timeout: deadline,
            close_timeout: None,
        }
    }
}

/// Half of `timeout`, floored to whole seconds (exact half below two seconds)
fn half_in_whole_seconds(timeout: Duration) -> Duration {
    match timeout.as_secs() / 2 {
        0 => timeout / 2,
        secs => Duration::from_secs(secs),
    }
}

/// Per-connection settings shared with the code that opens connections
#[derive(Clone)]
pub struct ConnectionOptions {
    /// Outbound queue capacity
    pub queue_capacity: usize,
    /// Handlers consulted for inbound events (may be shared between connections)
    pub events: Arc<EventRegistry<Connection>>,
    /// Observability set for backed-up connections
    pub overflow: Arc<OverflowRegistry>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            events: Arc::new(EventRegistry::new()),
            overflow: Arc::new(OverflowRegistry::new()),
        }
    }
}

impl ConnectionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity < 2 {
            return Err(SocketIoError::Configuration(format!(
                "queue capacity must be at least 2, got {}",
                self.queue_capacity
            )));
        }
        Ok(())
    }
}

/// Configuration for [`SocketIoClient`](crate::SocketIoClient)
///
/// Built with the type-state builder returned by
/// [`SocketIoClient::builder`](crate::SocketIoClient::builder).
pub struct ClientConfig {
    /// Handshake endpoint, e.g. `http://localhost:4500/socket.io/1`
    pub(crate) url: String,

    /// Timeout for the handshake HTTP request
    pub(crate) handshake_timeout: Duration,

    /// Deadline used when the handshake disables heartbeats
    pub(crate) fallback_timeout: Duration,

    /// Optional header provider for handshake and upgrade requests
    pub(crate) headers: Option<Arc<dyn HeaderProvider>>,

    /// Settings handed to the opened connection
    pub(crate) connection: ConnectionOptions,
}

impl ClientConfig {
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    pub fn fallback_timeout(&self) -> Duration {
        self.fallback_timeout
    }

    pub fn has_headers(&self) -> bool {
        self.headers.is_some()
    }

    pub fn queue_capacity(&self) -> usize {
        self.connection.queue_capacity
    }

    /// Get the number of handlers registered so far
    pub fn handler_count(&self) -> usize {
        self.connection.events.len()
    }
}
