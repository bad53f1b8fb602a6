//! socket.io 0.9 HTTP handshake
//!
//! Before the WebSocket is opened the client asks the server for a session:
//!
//! ```text
//! GET http://host/socket.io/1/?t=<millis>
//! 200 OK
//! 4d4f185e96a7b:60:60:websocket,xhr-polling
//! └─ token     └─┘ └┘ └─ transports
//!          heartbeat close timeout (seconds)
//! ```
//!
//! The token then selects the WebSocket endpoint
//! `ws://host/socket.io/1/websocket/<token>`.

use crate::error::{Result, SocketIoError};
use crate::headers::Headers;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Transport name the server must offer for this client to connect
pub const WEBSOCKET_TRANSPORT: &str = "websocket";

/// Session parameters returned by the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub token: String,
    /// `None` when the server disables heartbeats
    pub heartbeat_timeout: Option<Duration>,
    pub close_timeout: Option<Duration>,
    /// Transports offered by the server (empty if not announced)
    pub transports: Vec<String>,
}

impl HandshakeResponse {
    /// Parse `token:heartbeatTimeout:closeTimeout[:transports]`
    pub fn parse(body: &str) -> Result<Self> {
        let parts: Vec<&str> = body.trim().split(':').collect();
        if parts.len() < 3 {
            return Err(SocketIoError::Handshake(format!(
                "expected token:heartbeat:close[:transports], got {:?}",
                body
            )));
        }

        let token = parts[0].trim();
        if token.is_empty() {
            return Err(SocketIoError::Handshake("empty session token".to_string()));
        }

        let transports: Vec<String> = parts
            .get(3)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let response = Self {
            token: token.to_string(),
            heartbeat_timeout: parse_seconds(parts[1], "heartbeat timeout")?,
            close_timeout: parse_seconds(parts[2], "close timeout")?,
            transports,
        };

        if !response.supports_websocket() {
            return Err(SocketIoError::Handshake(format!(
                "server does not offer the websocket transport (offers {:?})",
                response.transports
            )));
        }

        Ok(response)
    }

    /// True if the server offers WebSocket, or did not list transports
    pub fn supports_websocket(&self) -> bool {
        self.transports.is_empty() || self.transports.iter().any(|t| t == WEBSOCKET_TRANSPORT)
    }
}

/// Empty or zero means "disabled"
fn parse_seconds(raw: &str, field: &str) -> Result<Option<Duration>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let secs = raw.parse::<u64>().map_err(|_| {
        SocketIoError::Handshake(format!("invalid {} {:?}", field, raw))
    })?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    Url::parse(endpoint)
        .map_err(|e| SocketIoError::Configuration(format!("invalid url {:?}: {}", endpoint, e)))
}

fn switch_scheme(url: &mut Url, scheme: &str) -> Result<()> {
    url.set_scheme(scheme).map_err(|_| {
        SocketIoError::Configuration(format!("cannot use scheme {} for {}", scheme, url))
    })
}

/// Handshake request URL with a cache-busting `t` parameter
pub fn handshake_url(endpoint: &str, timestamp_ms: i64) -> Result<Url> {
    let mut url = parse_endpoint(endpoint)?;
    match url.scheme() {
        "http" | "https" => {}
        "ws" => switch_scheme(&mut url, "http")?,
        "wss" => switch_scheme(&mut url, "https")?,
        other => {
            return Err(SocketIoError::Configuration(format!(
                "unsupported url scheme {:?}",
                other
            )))
        }
    }
    url.query_pairs_mut()
        .append_pair("t", &timestamp_ms.to_string());
    Ok(url)
}

/// WebSocket URL for an established session
///
/// `http`→`ws`, `https`→`wss`; the handshake path is extended with
/// `/websocket/<token>` and the query string is kept.
pub fn websocket_url(endpoint: &str, token: &str) -> Result<Url> {
    let mut url = parse_endpoint(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => {}
        "http" => switch_scheme(&mut url, "ws")?,
        "https" => switch_scheme(&mut url, "wss")?,
        other => {
            return Err(SocketIoError::Configuration(format!(
                "unsupported url scheme {:?}",
                other
            )))
        }
    }
    let path = format!("{}/websocket/{}", url.path().trim_end_matches('/'), token);
    url.set_path(&path);
    Ok(url)
}

/// Perform the handshake request
pub async fn handshake(
    http: &reqwest::Client,
    endpoint: &str,
    headers: &Headers,
    timeout: Duration,
) -> Result<HandshakeResponse> {
    let url = handshake_url(endpoint, chrono::Utc::now().timestamp_millis())?;
    debug!("Handshake request to {}", url);

    let mut request = http.get(url).timeout(timeout);
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SocketIoError::Handshake(format!(
            "HTTP {}: {}",
            status,
            body.trim()
        )));
    }

    let parsed = HandshakeResponse::parse(&body)?;
    debug!(
        "Handshake complete: heartbeat={:?} close={:?} transports={:?}",
        parsed.heartbeat_timeout, parsed.close_timeout, parsed.transports
    );
    Ok(parsed)
}
