//! Common test utilities for socketio09 integration tests
//!
//! - [`ChannelTransport`]: in-memory transport driven from the test body
//! - [`MockSocketIoServer`]: real TCP server speaking the 0.9 handshake and
//!   WebSocket framing

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use socketio09::frame::{self, FrameKind};
use socketio09::{Result, SocketIoError, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ---------------------------------------------------------------------------
// In-memory transport
// ---------------------------------------------------------------------------

/// Transport whose far end is a [`ChannelPeer`] held by the test
pub struct ChannelTransport {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<String>>>,
    outbound: mpsc::Sender<String>,
    closed: watch::Sender<bool>,
    closes: AtomicUsize,
}

/// Test-side end of a [`ChannelTransport`]
pub struct ChannelPeer {
    to_client: mpsc::UnboundedSender<Result<String>>,
    from_client: mpsc::Receiver<String>,
}

/// Create a connected transport/peer pair
///
/// `outbound_capacity` bounds how many client frames may sit unread at the
/// peer before the client's writer blocks in `send`.
pub fn channel_pair(outbound_capacity: usize) -> (Arc<ChannelTransport>, ChannelPeer) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::channel(outbound_capacity);
    let (closed, _) = watch::channel(false);

    let transport = Arc::new(ChannelTransport {
        inbound: tokio::sync::Mutex::new(inbound),
        outbound,
        closed,
        closes: AtomicUsize::new(0),
    });
    (transport, ChannelPeer { to_client, from_client })
}

impl ChannelTransport {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn receive(&self) -> Result<String> {
        let mut closed = self.closed.subscribe();
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            _ = closed.wait_for(|closed| *closed) => {
                Err(SocketIoError::ConnectionClosed("channel transport closed".into()))
            }
            next = inbound.recv() => match next {
                Some(result) => result,
                None => Err(SocketIoError::ConnectionClosed("peer dropped".into())),
            },
        }
    }

    async fn send(&self, text: String) -> Result<()> {
        let mut closed = self.closed.subscribe();
        tokio::select! {
            _ = closed.wait_for(|closed| *closed) => {
                Err(SocketIoError::ConnectionClosed("channel transport closed".into()))
            }
            sent = self.outbound.send(text) => {
                sent.map_err(|_| SocketIoError::Transport("peer dropped".into()))
            }
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
    }
}

impl ChannelPeer {
    /// Deliver raw text to the client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Ok(text.into()));
    }

    /// Make the client's next read fail with `error`
    pub fn fail(&self, error: SocketIoError) {
        let _ = self.to_client.send(Err(error));
    }

    /// Next frame the client wrote, if one arrives within `timeout`
    pub async fn next_sent(&mut self, timeout: Duration) -> Option<String> {
        tokio::time::timeout(timeout, self.from_client.recv())
            .await
            .ok()
            .flatten()
    }
}

// ---------------------------------------------------------------------------
// Mock socket.io 0.9 server
// ---------------------------------------------------------------------------

/// Behaviour knobs for [`MockSocketIoServer`]
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Status line for the handshake response
    pub handshake_status: &'static str,
    /// Handshake body (`token:heartbeat:close:transports`)
    pub handshake_body: String,
    /// Send `1::` right after the upgrade
    pub send_connect: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            handshake_status: "200 OK",
            handshake_body: "testtoken:60:60:websocket,xhr-polling".to_string(),
            send_connect: true,
        }
    }
}

/// A small socket.io 0.9 server for tests
///
/// - answers the handshake `GET` with the configured body
/// - upgrades `/websocket/<token>` and sends `1::`
/// - answers heartbeats with a heartbeat
/// - echoes every event back as `echo` with the same arguments
/// - acknowledges events that request it with their own arguments
/// - records request heads and every frame the client sends
pub struct MockSocketIoServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    received: Arc<Mutex<Vec<String>>>,
    push_tx: broadcast::Sender<String>,
    shutdown: Arc<Notify>,
}

impl MockSocketIoServer {
    pub async fn start() -> Self {
        Self::start_with(ServerOptions::default()).await
    }

    /// Create and start a new mock server
    pub async fn start_with(options: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let received = Arc::new(Mutex::new(Vec::new()));
        let (push_tx, _) = broadcast::channel(64);

        let server = Self {
            addr,
            requests: Arc::clone(&requests),
            received: Arc::clone(&received),
            push_tx: push_tx.clone(),
            shutdown: Arc::clone(&shutdown),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let options = options.clone();
                                let requests = Arc::clone(&requests);
                                let received = Arc::clone(&received);
                                let push_rx = push_tx.subscribe();
                                let shutdown = Arc::clone(&shutdown);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, options, requests, received, push_rx, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        server
    }

    async fn read_request_head(stream: &TcpStream) -> Option<String> {
        let mut buf = vec![0u8; 8192];
        for _ in 0..500 {
            let n = stream.peek(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            let text = String::from_utf8_lossy(&buf[..n]);
            if let Some(end) = text.find("\r\n\r\n") {
                return Some(text[..end].to_string());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    async fn handle_connection(
        mut stream: TcpStream,
        options: ServerOptions,
        requests: Arc<Mutex<Vec<String>>>,
        received: Arc<Mutex<Vec<String>>>,
        push_rx: broadcast::Receiver<String>,
        shutdown: Arc<Notify>,
    ) {
        let Some(head) = Self::read_request_head(&stream).await else {
            return;
        };
        requests.lock().push(head.clone());

        if head.to_ascii_lowercase().contains("upgrade: websocket") {
            Self::serve_websocket(stream, options, received, push_rx, shutdown).await;
            return;
        }

        // Consume the peeked request before answering
        let mut consumed = vec![0u8; head.len() + 4];
        if stream.read_exact(&mut consumed).await.is_err() {
            return;
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            options.handshake_status,
            options.handshake_body.len(),
            options.handshake_body
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    async fn serve_websocket(
        stream: TcpStream,
        options: ServerOptions,
        received: Arc<Mutex<Vec<String>>>,
        mut push_rx: broadcast::Receiver<String>,
        shutdown: Arc<Notify>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        if options.send_connect && write.send(Message::Text("1::".into())).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    received.lock().push(text.clone());

                    for reply in Self::replies_for(&text) {
                        if write.send(Message::Text(reply)).await.is_err() {
                            return;
                        }
                    }
                }
                pushed = push_rx.recv() => {
                    match pushed {
                        Ok(text) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    fn replies_for(text: &str) -> Vec<String> {
        let Ok(frame) = frame::decode(text) else {
            return Vec::new();
        };
        match frame.kind() {
            FrameKind::Heartbeat => return vec!["2::".to_string()],
            FrameKind::Event => {}
            _ => return Vec::new(),
        }

        let args = frame.payload().unwrap_or("[]").to_string();
        let mut replies = vec![format!(r#"5:::{{"name":"echo","args":{}}}"#, args)];
        if let Some(id) = frame.ack_id() {
            replies.push(format!("6:::{}+{}", id, args));
        }
        replies
    }

    /// Handshake endpoint for this server
    pub fn url(&self) -> String {
        format!("http://{}/socket.io/1", self.addr)
    }

    /// Send raw text to every connected client
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.push_tx.send(text.into());
    }

    /// Request heads seen so far (handshake and upgrade)
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Frames received from clients so far
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockSocketIoServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
