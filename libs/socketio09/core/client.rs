use crate::core::acks::AckPayload;
use crate::core::builder::{states::NoUrl, ClientBuilder};
use crate::core::config::{ClientConfig, SessionTimings};
use crate::core::connection::{CloseReason, Connection, ConnectionTasks, Metrics};
use crate::core::handshake;
use crate::core::registry::EventHandler;
use crate::core::websocket::WebSocketTransport;
use crate::traits::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// socket.io 0.9 client over WebSocket
///
/// Connecting performs the HTTP handshake, upgrades to the WebSocket named
/// by the session token and starts the connection's reader, writer and
/// heartbeat tasks. Dropping the client closes the connection.
///
/// # Example
/// ```ignore
/// let client = SocketIoClient::builder()
///     .url("http://localhost:4500/socket.io/1")
///     .on("news", EventHandler::with_args(|_conn, (headline,): (String,)| {
///         println!("news: {}", headline);
///     }))?
///     .connect()
///     .await?;
///
/// client.emit("subscribe", &"sports")?;
/// let reply = client.emit_with_ack("save", &settings).await?;
/// client.shutdown().await;
/// ```
pub struct SocketIoClient {
    connection: Arc<Connection>,
    tasks: Option<ConnectionTasks>,
}

impl SocketIoClient {
    /// Start building a client
    pub fn builder() -> ClientBuilder<NoUrl> {
        ClientBuilder::new()
    }

    /// Connect with default settings
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        Self::builder().url(url).connect().await
    }

    pub(crate) async fn establish(config: ClientConfig) -> Result<Self> {
        let headers = match &config.headers {
            Some(provider) => provider.get_headers().await,
            None => Headers::new(),
        };

        let http = reqwest::Client::new();
        let session =
            handshake::handshake(&http, &config.url, &headers, config.handshake_timeout).await?;
        let timings = SessionTimings::from_handshake(&session, config.fallback_timeout);

        let ws_url = handshake::websocket_url(&config.url, &session.token)?;
        debug!("Upgrading to {}", ws_url);
        let transport = WebSocketTransport::connect(&ws_url, &headers, &timings).await?;

        let connection = Connection::new(Arc::new(transport), timings, config.connection)?;
        let tasks = connection.start();
        info!("[{}] Connected to {}", connection.id(), config.url);

        Ok(Self {
            connection,
            tasks: Some(tasks),
        })
    }

    /// Register (or replace) the handler for `event`
    pub fn on(&self, event: impl Into<String>, handler: EventHandler<Connection>) -> Result<()> {
        self.connection.events().register(event, handler)
    }

    /// Remove the handler for `event`
    pub fn off(&self, event: &str) -> bool {
        self.connection.events().unregister(event)
    }

    /// Fire-and-forget event
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, args: &T) -> Result<()> {
        self.connection.emit(event, args)
    }

    /// Emit and wait for the server's acknowledgment
    pub async fn emit_with_ack<T: Serialize + Sync + ?Sized>(
        &self,
        event: &str,
        args: &T,
    ) -> Result<AckPayload> {
        self.connection.emit_with_ack(event, args).await
    }

    pub fn is_active(&self) -> bool {
        self.connection.is_active()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.connection.close_reason()
    }

    pub fn metrics(&self) -> Metrics {
        self.connection.metrics()
    }

    /// The underlying connection
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Close the connection without waiting for its tasks
    pub fn close(&self) {
        self.connection.close();
    }

    /// Close the connection and wait for its tasks to exit
    pub async fn shutdown(mut self) {
        self.connection.close();
        if let Some(tasks) = self.tasks.take() {
            tasks.join().await;
        }
        info!("[{}] Client shut down", self.connection.id());
    }

    /// Wait until the connection closes on its own (server disconnect,
    /// transport failure, flood) or through `close` from another task
    ///
    /// Cancel-safe: the task handles stay with the client, so a later
    /// [`shutdown`](Self::shutdown) still waits for them.
    pub async fn closed(&self) {
        self.connection.wait_closed().await;
    }
}

impl Drop for SocketIoClient {
    fn drop(&mut self) {
        self.connection.close();
    }
}
