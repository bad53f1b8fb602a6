//! Cross-connection overflow observability
//!
//! Tracks which connections currently have a backed-up outbound queue. One
//! registry is created by the application (or by the client builder when none
//! is supplied) and shared by every connection it opens; connections mark and
//! clear themselves from their writer task. The registry takes its own lock
//! and is never touched while a connection holds its liveness lock.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next identifier
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Set of connections whose outbound queue is past the soft threshold
#[derive(Debug, Default)]
pub struct OverflowRegistry {
    flooded: Mutex<HashSet<ConnectionId>>,
}

impl OverflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as overflowed; returns true if it was not marked before
    pub fn mark(&self, id: ConnectionId) -> bool {
        self.flooded.lock().insert(id)
    }

    /// Clear `id`; returns true if it was marked
    pub fn clear(&self, id: ConnectionId) -> bool {
        self.flooded.lock().remove(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.flooded.lock().contains(&id)
    }

    /// Number of connections currently overflowed
    pub fn count(&self) -> usize {
        self.flooded.lock().len()
    }

    /// Snapshot of overflowed connection ids
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.flooded.lock().iter().copied().collect();
        ids.sort();
        ids
    }
}
