//! Acknowledgment correlation
//!
//! Every `emit_with_ack` call allocates an [`AckId`], registers an
//! [`AckHandle`] under it and parks on the matching [`PendingAck`]. The
//! reader resolves the handle when an ack frame with that id arrives; the
//! waiter removes it itself when its deadline passes. Whichever side removes
//! the entry first wins, so a reply is delivered at most once and late or
//! duplicate acks find nothing to resolve.

use crate::core::frame::AckId;
use crate::error::{Result, SocketIoError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Raw reply to an acknowledged emit (the JSON argument list the server sent)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckPayload(String);

impl AckPayload {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Bind the reply to a concrete type (usually a tuple or `Vec`)
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.0).map_err(|e| SocketIoError::Deserialize(e.to_string()))
    }
}

/// Resolver side of a pending ack; consumed by delivery
#[derive(Debug)]
pub struct AckHandle(oneshot::Sender<AckPayload>);

impl AckHandle {
    /// Deliver the reply to the waiter. Returns `false` if the waiter is gone.
    pub fn deliver(self, payload: impl Into<String>) -> bool {
        self.0.send(AckPayload::new(payload)).is_ok()
    }
}

/// Waiter side of a pending ack
#[derive(Debug)]
pub struct PendingAck {
    id: AckId,
    rx: oneshot::Receiver<AckPayload>,
}

impl PendingAck {
    /// Create a linked handle/waiter pair for `id`
    pub fn channel(id: AckId) -> (AckHandle, PendingAck) {
        let (tx, rx) = oneshot::channel();
        (AckHandle(tx), PendingAck { id, rx })
    }

    pub fn id(&self) -> AckId {
        self.id
    }

    /// Wait for delivery, giving up after `timeout`
    ///
    /// A dropped handle (the correlator was cleared on close) surfaces as
    /// [`SocketIoError::ConnectionClosed`].
    pub async fn wait(self, timeout: Duration) -> Result<AckPayload> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(SocketIoError::ConnectionClosed(format!(
                "connection closed while waiting for ack {}",
                self.id
            ))),
            Err(_) => Err(SocketIoError::AckTimeout {
                id: self.id,
                waited_ms: timeout.as_millis(),
            }),
        }
    }
}

/// Id allocator plus table of outstanding acks for one connection
#[derive(Debug, Default)]
pub struct AckCorrelator {
    counter: AtomicU64,
    listeners: Mutex<HashMap<AckId, AckHandle>>,
}

impl AckCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id. The first id is 1.
    pub fn next_id(&self) -> AckId {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Store a handle under `id`, replacing any previous one
    pub fn register(&self, id: AckId, handle: AckHandle) {
        self.listeners.lock().insert(id, handle);
    }

    /// Take the handle for `id` out of the table
    pub fn resolve(&self, id: AckId) -> Result<AckHandle> {
        self.listeners
            .lock()
            .remove(&id)
            .ok_or(SocketIoError::AckListenerNotFound(id))
    }

    /// Drop the handle for `id`, if still present
    pub fn unregister(&self, id: AckId) {
        self.listeners.lock().remove(&id);
    }

    /// Drop every outstanding handle, waking their waiters
    pub fn clear(&self) -> usize {
        let mut listeners = self.listeners.lock();
        let count = listeners.len();
        listeners.clear();
        count
    }

    /// Number of acks still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_pending(&self, id: AckId) -> bool {
        self.listeners.lock().contains_key(&id)
    }
}
