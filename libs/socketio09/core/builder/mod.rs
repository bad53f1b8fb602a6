pub mod states;

use crate::core::client::SocketIoClient;
use crate::core::config::{
    ClientConfig, ConnectionOptions, DEFAULT_FALLBACK_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
};
use crate::core::connection::Connection;
use crate::core::overflow::OverflowRegistry;
use crate::core::registry::{EventHandler, EventRegistry};
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`SocketIoClient`]
///
/// The handshake URL must be set before `connect` becomes available.
/// Handlers registered here land in the event registry the connection will
/// use, so they are in place before the first inbound frame.
pub struct ClientBuilder<U>
where
    U: UrlState,
{
    _state: TypeState<U>,
    url: Option<String>,
    headers: Option<Arc<dyn HeaderProvider>>,
    handshake_timeout: Duration,
    fallback_timeout: Duration,
    connection: ConnectionOptions,
}

impl ClientBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            headers: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
            connection: ConnectionOptions::default(),
        }
    }

    /// Set the handshake endpoint, e.g. `http://localhost:4500/socket.io/1`
    pub fn url(self, url: impl Into<String>) -> ClientBuilder<HasUrl> {
        ClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            headers: self.headers,
            handshake_timeout: self.handshake_timeout,
            fallback_timeout: self.fallback_timeout,
            connection: self.connection,
        }
    }
}

impl Default for ClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> ClientBuilder<U>
where
    U: UrlState,
{
    /// Register a handler for `event`
    ///
    /// Fails if the handler declares a shape the registry cannot call.
    pub fn on(self, event: impl Into<String>, handler: EventHandler<Connection>) -> Result<Self> {
        self.connection.events.register(event, handler)?;
        Ok(self)
    }

    /// Use a shared event registry instead of a private one
    ///
    /// Replaces the current registry, including handlers added with `on`
    /// before this call.
    pub fn event_registry(mut self, events: Arc<EventRegistry<Connection>>) -> Self {
        self.connection.events = events;
        self
    }

    /// Report overflow state into a shared registry
    pub fn overflow_registry(mut self, overflow: Arc<OverflowRegistry>) -> Self {
        self.connection.overflow = overflow;
        self
    }

    /// Set the outbound queue capacity (default 500)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.connection.queue_capacity = capacity;
        self
    }

    /// Set custom header provider (optional)
    pub fn headers(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.headers = Some(Arc::new(provider));
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Deadline used when the server disables heartbeats
    pub fn fallback_timeout(mut self, timeout: Duration) -> Self {
        self.fallback_timeout = timeout;
        self
    }
}

impl ClientBuilder<HasUrl> {
    /// Validate and produce the configuration without connecting
    pub fn build_config(self) -> Result<ClientConfig> {
        let url = self
            .url
            .ok_or_else(|| SocketIoError::Configuration("URL is required".to_string()))?;
        self.connection.validate()?;

        Ok(ClientConfig {
            url,
            handshake_timeout: self.handshake_timeout,
            fallback_timeout: self.fallback_timeout,
            headers: self.headers,
            connection: self.connection,
        })
    }

    /// Handshake, upgrade and start the connection
    pub async fn connect(self) -> Result<SocketIoClient> {
        SocketIoClient::establish(self.build_config()?).await
    }
}
