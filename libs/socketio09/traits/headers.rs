use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers to send with the handshake and WebSocket upgrade requests
pub type Headers = HashMap<String, String>;

/// Trait for providing HTTP headers dynamically
///
/// Called once per connect, before the handshake request. The same headers
/// are applied to the handshake `GET` and to the WebSocket upgrade request,
/// which is where socket.io 0.9 servers usually look for cookies or API keys.
///
/// # Example
/// ```ignore
/// struct SessionCookie(String);
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for SessionCookie {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = Headers::new();
///         headers.insert("Cookie".to_string(), format!("sid={}", self.0));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Generate headers for the next connection attempt
    async fn get_headers(&self) -> Headers;
}

/// A header provider that doesn't add any headers
pub struct NoHeaders;

#[async_trait]
impl HeaderProvider for NoHeaders {
    async fn get_headers(&self) -> Headers {
        HashMap::new()
    }
}

/// Fixed set of headers, sent unchanged on every connect
pub struct StaticHeaders(pub Headers);

#[async_trait]
impl HeaderProvider for StaticHeaders {
    async fn get_headers(&self) -> Headers {
        self.0.clone()
    }
}
