//! tokio-tungstenite implementation of [`Transport`]

use crate::core::config::SessionTimings;
use crate::traits::*;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport with per-operation deadlines
///
/// Reads skip ping/pong control frames (tungstenite answers pings itself).
/// `close` is non-blocking: it wakes any pending read and sends the close
/// frame from a background task.
pub struct WebSocketTransport {
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
    receive_timeout: Duration,
    send_timeout: Duration,
}

impl WebSocketTransport {
    /// Open the WebSocket at `url`, sending `headers` with the upgrade request
    pub async fn connect(url: &Url, headers: &Headers, timings: &SessionTimings) -> Result<Self> {
        let mut request = url.as_str().into_client_request()?;
        for (key, value) in headers {
            match key.parse::<http::header::HeaderName>() {
                Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                    Ok(header_value) => {
                        request.headers_mut().insert(header_name, header_value);
                    }
                    Err(_) => warn!("Invalid header value for key '{}'", key),
                },
                Err(_) => warn!("Invalid header name: {}", key),
            }
        }

        let connect = connect_async(request);
        let (ws, _response) = tokio::time::timeout(timings.receive_timeout, connect)
            .await
            .map_err(|_| {
                SocketIoError::Transport(format!(
                    "websocket upgrade timed out after {:?}",
                    timings.receive_timeout
                ))
            })??;

        debug!("WebSocket upgrade complete");
        Ok(Self::from_stream(ws, timings))
    }

    /// Wrap an already-upgraded stream
    pub fn from_stream(ws: WsStream, timings: &SessionTimings) -> Self {
        let (sink, stream) = ws.split();
        let (closed, _) = watch::channel(false);
        Self {
            sink: Arc::new(Mutex::new(sink)),
            stream: Mutex::new(stream),
            closed,
            receive_timeout: timings.receive_timeout,
            send_timeout: timings.send_timeout,
        }
    }

    fn closed_error() -> SocketIoError {
        SocketIoError::ConnectionClosed("websocket transport closed".to_string())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn receive(&self) -> Result<String> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(Self::closed_error());
        }

        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                _ = closed.wait_for(|closed| *closed) => return Err(Self::closed_error()),
                next = tokio::time::timeout(self.receive_timeout, stream.next()) => next,
            };

            match next {
                Err(_) => {
                    return Err(SocketIoError::Transport(format!(
                        "no frame received within {:?}",
                        self.receive_timeout
                    )))
                }
                Ok(None) => {
                    return Err(SocketIoError::ConnectionClosed(
                        "websocket stream ended".to_string(),
                    ))
                }
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(Message::Text(text)))) => {
                    if text.is_empty() {
                        return Err(SocketIoError::EmptyPayload);
                    }
                    return Ok(text);
                }
                Ok(Some(Ok(Message::Binary(_)))) => return Err(SocketIoError::NonTextPayload),
                Ok(Some(Ok(Message::Close(frame)))) => {
                    return Err(SocketIoError::ConnectionClosed(format!(
                        "server closed websocket: {:?}",
                        frame
                    )))
                }
                Ok(Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)))) => continue,
            }
        }
    }

    async fn send(&self, text: String) -> Result<()> {
        if *self.closed.borrow() {
            return Err(Self::closed_error());
        }

        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(self.send_timeout, sink.send(Message::Text(text))).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(SocketIoError::Transport(format!(
                "send timed out after {:?}",
                self.send_timeout
            ))),
        }
    }

    fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let sink = Arc::clone(&self.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.lock().await.close().await {
                        debug!("WebSocket close frame not sent: {}", e);
                    }
                });
            }
            Err(_) => debug!("No runtime available, dropping websocket without close frame"),
        }
    }
}
