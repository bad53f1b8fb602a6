//! Outbound queue pressure policy
//!
//! Evaluated by the writer before every send, against the queue length `Q`
//! and capacity `M`:
//!
//! ```text
//! Q <= M/2            Normal      connection cleared from the overflow set
//! M/2 < Q < M-1       Overflowed  connection marked in the overflow set
//! Q >= M-1            Flooded     connection closed
//! ```
//!
//! Marking is observability only; producers are never throttled by it.

/// Default outbound queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    Normal,
    Overflowed,
    Flooded,
}

impl Pressure {
    /// Classify a queue of `queued` messages out of `capacity`
    pub fn evaluate(queued: usize, capacity: usize) -> Self {
        if queued >= capacity.saturating_sub(1) {
            Pressure::Flooded
        } else if queued > capacity / 2 {
            Pressure::Overflowed
        } else {
            Pressure::Normal
        }
    }
}
