//! One live socket.io session
//!
//! A [`Connection`] owns the transport and runs three tasks against it:
//!
//! ```text
//!            ┌──────────── reader ────────────┐
//! transport ─┤ decode → heartbeat/ack/event   │
//!            └────────────────────────────────┘
//!            ┌──────────── writer ────────────┐
//! transport ◄┤ backpressure check → queue pop │◄── emit / heartbeat
//!            └────────────────────────────────┘
//! ```
//!
//! Liveness flips from alive to closed exactly once, under the connection's
//! own lock. Everything else that close does (draining the queue, waking the
//! writer, the `disconnect` event, clearing the overflow mark) runs after that
//! lock is released, so handlers may call back into the connection and the
//! global overflow lock is never taken while the connection lock is held.

use crate::core::acks::{AckCorrelator, AckPayload, PendingAck};
use crate::core::backpressure::Pressure;
use crate::core::config::{ConnectionOptions, SessionTimings};
use crate::core::frame::{self, Frame, FrameKind, DISCONNECT_TEXT, EMPTY_ARGS};
use crate::core::heartbeat;
use crate::core::overflow::{ConnectionId, OverflowRegistry};
use crate::core::registry::{Dispatch, EventRegistry, CONNECT_EVENT, DISCONNECT_EVENT};
use crate::traits::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a connection stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called locally
    Requested,
    /// The server sent a disconnect frame
    ServerDisconnect,
    /// Read or write on the transport failed
    Transport(String),
    /// The server sent something that is not a valid frame
    Protocol(String),
    /// The outbound queue hit its hard limit
    Flooded,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Requested => write!(f, "closed by client"),
            CloseReason::ServerDisconnect => write!(f, "server disconnected"),
            CloseReason::Transport(e) => write!(f, "transport failure: {}", e),
            CloseReason::Protocol(e) => write!(f, "protocol violation: {}", e),
            CloseReason::Flooded => write!(f, "outbound queue flooded"),
        }
    }
}

#[derive(Debug)]
enum Liveness {
    Alive,
    Closed(CloseReason),
}

/// Frame counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
}

/// Handles of the tasks started by [`Connection::start`]
pub struct ConnectionTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl ConnectionTasks {
    /// Wait until every task has exited
    pub async fn join(self) {
        if let Err(e) = self.reader.await {
            warn!("Reader task failed: {}", e);
        }
        if let Err(e) = self.writer.await {
            warn!("Writer task failed: {}", e);
        }
        if let Some(heartbeat) = self.heartbeat {
            if let Err(e) = heartbeat.await {
                warn!("Heartbeat task failed: {}", e);
            }
        }
    }

    /// `true` once the reader, writer and heartbeat have all exited
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished()
            && self.writer.is_finished()
            && self.heartbeat.as_ref().map_or(true, |h| h.is_finished())
    }
}

/// A live socket.io session over some [`Transport`]
pub struct Connection {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    timings: SessionTimings,
    liveness: Mutex<Liveness>,
    capacity: usize,
    outbound_tx: Sender<String>,
    // Kept so close() can drain and the writer can pop without a second owner
    outbound_rx: Receiver<String>,
    outbound_ready: Notify,
    closed: Notify,
    acks: AckCorrelator,
    events: Arc<EventRegistry<Connection>>,
    overflow: Arc<OverflowRegistry>,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    // Lets close hand an owned connection to the blocking pool
    this: Weak<Connection>,
}

impl Connection {
    /// Wrap an already-open transport. Call [`start`](Self::start) to run it.
    pub fn new(
        transport: Arc<dyn Transport>,
        timings: SessionTimings,
        options: ConnectionOptions,
    ) -> Result<Arc<Self>> {
        options.validate()?;
        let (outbound_tx, outbound_rx) = bounded(options.queue_capacity);

        Ok(Arc::new_cyclic(|this| Self {
            id: ConnectionId::next(),
            transport,
            timings,
            liveness: Mutex::new(Liveness::Alive),
            capacity: options.queue_capacity,
            outbound_tx,
            outbound_rx,
            outbound_ready: Notify::new(),
            closed: Notify::new(),
            acks: AckCorrelator::new(),
            events: options.events,
            overflow: options.overflow,
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            this: this.clone(),
        }))
    }

    /// Spawn the reader, writer and (if enabled) heartbeat tasks
    ///
    /// The tasks run until the connection closes, for whatever reason. The
    /// returned handles let the owner wait for them to exit.
    ///
    /// # Returns
    /// A [`ConnectionTasks`] holding the reader, writer and optional
    /// heartbeat handles
    pub fn start(self: &Arc<Self>) -> ConnectionTasks {
        let reader = tokio::spawn(Arc::clone(self).read_loop());
        let writer = tokio::spawn(Arc::clone(self).write_loop());
        let heartbeat = self
            .timings
            .heartbeat_interval
            .map(|interval| tokio::spawn(heartbeat::heartbeat_task(Arc::clone(self), interval)));

        info!(
            "[{}] Connection started (heartbeat {:?}, queue capacity {})",
            self.id, self.timings.heartbeat_interval, self.capacity
        );

        ConnectionTasks {
            reader,
            writer,
            heartbeat,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn timings(&self) -> &SessionTimings {
        &self.timings
    }

    /// Handler table consulted for inbound events
    pub fn events(&self) -> &Arc<EventRegistry<Connection>> {
        &self.events
    }

    pub fn acks(&self) -> &AckCorrelator {
        &self.acks
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.liveness.lock(), Liveness::Alive)
    }

    /// Why the connection closed, or `None` while it is alive
    pub fn close_reason(&self) -> Option<CloseReason> {
        match &*self.liveness.lock() {
            Liveness::Alive => None,
            Liveness::Closed(reason) => Some(reason.clone()),
        }
    }

    /// Resolve once the connection has closed
    pub async fn wait_closed(&self) {
        let notified = self.closed.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if !self.is_active() {
            return;
        }
        notified.await;
    }

    /// Number of frames waiting in the outbound queue
    pub fn queued_len(&self) -> usize {
        self.outbound_rx.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
        }
    }

    /// Fire-and-forget event
    ///
    /// `args` is sent as the event's single argument; `()` sends none.
    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, args: &T) -> Result<()> {
        let payload = frame::encode_args(args)?;
        self.send_frame(&Frame::event(event, payload))
    }

    /// Emit an event and wait for the server's acknowledgment
    ///
    /// Fails with [`SocketIoError::AckTimeout`] if no reply arrives within
    /// the receive timeout; a reply arriving after that is dropped.
    pub async fn emit_with_ack<T: Serialize + Sync + ?Sized>(
        &self,
        event: &str,
        args: &T,
    ) -> Result<AckPayload> {
        let payload = frame::encode_args(args)?;
        let id = self.acks.next_id();
        let (handle, pending) = PendingAck::channel(id);
        self.acks.register(id, handle);

        if let Err(e) = self.send_frame(&Frame::event(event, payload).with_ack(id)) {
            self.acks.unregister(id);
            return Err(e);
        }
        debug!("[{}] Waiting for ack {} on {:?}", self.id, id, event);

        let result = pending.wait(self.timings.receive_timeout).await;
        if result.is_err() {
            self.acks.unregister(id);
        }
        result
    }

    /// Encode and enqueue an outbound frame
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        let text = frame::encode(frame)?;
        self.enqueue(text)
    }

    fn enqueue(&self, text: String) -> Result<()> {
        if !self.is_active() {
            return Err(SocketIoError::ConnectionClosed(format!(
                "{} is no longer active",
                self.id
            )));
        }
        match self.outbound_tx.try_send(text) {
            Ok(()) => {
                self.outbound_ready.notify_one();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(SocketIoError::Overflow {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(SocketIoError::ConnectionClosed(
                "outbound queue disconnected".to_string(),
            )),
        }
    }

    /// Close the connection. Idempotent; only the first call fires `disconnect`.
    pub fn close(&self) {
        self.close_with(CloseReason::Requested);
    }

    /// Returns `true` if this call performed the teardown
    pub(crate) fn close_with(&self, reason: CloseReason) -> bool {
        let discarded = {
            let mut liveness = self.liveness.lock();
            if let Liveness::Closed(_) = *liveness {
                return false;
            }
            self.transport.close();
            *liveness = Liveness::Closed(reason.clone());

            let discarded = self.outbound_rx.try_iter().count();
            // The queue is empty now, so the sentinel always fits
            let _ = self.outbound_tx.try_send(DISCONNECT_TEXT.to_string());
            self.outbound_ready.notify_one();
            discarded
        };
        self.closed.notify_waiters();

        let abandoned = self.acks.clear();
        info!(
            "[{}] Connection closed: {} ({} queued frames discarded, {} acks abandoned)",
            self.id, reason, discarded, abandoned
        );

        self.dispatch_disconnect();
        self.overflow.clear(self.id);
        true
    }

    /// Fire `disconnect` on the blocking pool, or inline outside a runtime
    fn dispatch_disconnect(&self) {
        match (tokio::runtime::Handle::try_current(), self.this.upgrade()) {
            (Ok(runtime), Some(connection)) => {
                runtime.spawn_blocking(move || {
                    connection.dispatch_event(DISCONNECT_EVENT, EMPTY_ARGS)
                });
            }
            _ => self.dispatch_event(DISCONNECT_EVENT, EMPTY_ARGS),
        }
    }

    /// Compare the queue length against the thresholds and act on it
    ///
    /// Flooded closes the connection and returns [`SocketIoError::SocketFlooded`].
    pub fn check_backpressure(&self) -> Result<Pressure> {
        let queued = self.outbound_rx.len();
        let pressure = Pressure::evaluate(queued, self.capacity);

        match pressure {
            Pressure::Flooded => {
                warn!(
                    "[{}] Outbound queue flooded ({} of {}), closing",
                    self.id, queued, self.capacity
                );
                self.close_with(CloseReason::Flooded);
                return Err(SocketIoError::SocketFlooded { queued });
            }
            Pressure::Overflowed => {
                if self.overflow.mark(self.id) {
                    warn!(
                        "[{}] Outbound queue backing up ({} of {})",
                        self.id, queued, self.capacity
                    );
                }
                // A concurrent close may have cleared the mark already
                if !self.is_active() {
                    self.overflow.clear(self.id);
                }
            }
            Pressure::Normal => {
                if self.overflow.clear(self.id) {
                    info!("[{}] Outbound queue recovered ({} queued)", self.id, queued);
                }
            }
        }
        Ok(pressure)
    }

    /// React to one decoded inbound frame
    pub(crate) fn handle_frame(self: &Arc<Self>, frame: Frame) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);

        match frame.kind() {
            FrameKind::Noop => {
                if let Err(e) = self.send_frame(&Frame::heartbeat()) {
                    debug!("[{}] Heartbeat reply not queued: {}", self.id, e);
                }
            }
            FrameKind::Heartbeat => debug!("[{}] Heartbeat from server", self.id),
            FrameKind::Connect => self.spawn_dispatch(CONNECT_EVENT.to_string(), EMPTY_ARGS.to_string()),
            FrameKind::Disconnect => {
                self.close_with(CloseReason::ServerDisconnect);
            }
            FrameKind::Event => {
                let name = frame.event_name().unwrap_or_default().to_string();
                // Reserved for the lifecycle; a server cannot fire them
                if name == CONNECT_EVENT || name == DISCONNECT_EVENT {
                    debug!("[{}] Ignoring inbound event with reserved name {:?}", self.id, name);
                    return;
                }
                if let Some(id) = frame.ack_id() {
                    debug!(
                        "[{}] Server requested ack {} for {:?}; replies are not sent",
                        self.id, id, name
                    );
                }
                let args = frame.into_payload().unwrap_or_else(|| EMPTY_ARGS.to_string());
                self.spawn_dispatch(name, args);
            }
            FrameKind::Ack => self.deliver_ack(frame),
        }
    }

    fn deliver_ack(&self, frame: Frame) {
        let Some(id) = frame.ack_id() else {
            debug!("[{}] Ack frame without id, dropping", self.id);
            return;
        };
        match self.acks.resolve(id) {
            Ok(handle) => {
                let payload = frame.into_payload().unwrap_or_default();
                if !handle.deliver(payload) {
                    debug!("[{}] Waiter for ack {} is gone", self.id, id);
                }
            }
            Err(e) => debug!("[{}] Dropping ack: {}", self.id, e),
        }
    }

    fn spawn_dispatch(self: &Arc<Self>, event: String, args: String) {
        let connection = Arc::clone(self);
        tokio::task::spawn_blocking(move || connection.dispatch_event(&event, &args));
    }

    fn dispatch_event(&self, event: &str, args: &str) {
        match self.events.dispatch(self, event, args) {
            Ok(Dispatch::Invoked) => debug!("[{}] Handled {:?}", self.id, event),
            Ok(Dispatch::NoHandler) => debug!("[{}] No handler for {:?}, dropped", self.id, event),
            Err(e) => warn!("[{}] Handler for {:?} failed: {}", self.id, event, e),
        }
    }

    /// Reader task: receive, decode and react until the transport fails
    ///
    /// A receive error closes with [`CloseReason::Transport`]; text that does
    /// not decode closes with [`CloseReason::Protocol`].
    async fn read_loop(self: Arc<Self>) {
        debug!("[{}] Reader started", self.id);
        loop {
            let text = match self.transport.receive().await {
                Ok(text) => text,
                Err(e) => {
                    if self.is_active() {
                        match e {
                            SocketIoError::ConnectionClosed(_) => info!("[{}] {}", self.id, e),
                            _ => error!("[{}] Receive failed: {}", self.id, e),
                        }
                    }
                    self.close_with(CloseReason::Transport(e.to_string()));
                    break;
                }
            };

            match frame::decode(&text) {
                Ok(frame) => self.handle_frame(frame),
                Err(e) => {
                    warn!("[{}] Invalid frame {:?}: {}", self.id, text, e);
                    self.close_with(CloseReason::Protocol(e.to_string()));
                    break;
                }
            }
        }
        debug!("[{}] Reader exited", self.id);
    }

    /// Writer task: drain the outbound queue in FIFO order
    ///
    /// Each iteration first checks backpressure, then pops one frame. The
    /// `0::` sentinel pushed by close ends the loop without being sent.
    async fn write_loop(self: Arc<Self>) {
        debug!("[{}] Writer started", self.id);
        loop {
            if self.check_backpressure().is_err() {
                break;
            }

            let text = self.next_outbound().await;
            if text == DISCONNECT_TEXT {
                break;
            }

            if let Err(e) = self.transport.send(text).await {
                if self.is_active() {
                    error!("[{}] Send failed: {}", self.id, e);
                }
                self.close_with(CloseReason::Transport(e.to_string()));
                break;
            }
            self.frames_sent.fetch_add(1, Ordering::Relaxed);
        }
        debug!("[{}] Writer exited", self.id);
    }

    async fn next_outbound(&self) -> String {
        loop {
            if let Ok(text) = self.outbound_rx.try_recv() {
                return text;
            }
            self.outbound_ready.notified().await;
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("queued", &self.queued_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::HEARTBEAT_TEXT;
    use crate::core::registry::EventHandler;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Transport that never yields inbound text and records what is sent
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        closes: AtomicUsize,
        closed: Notify,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn receive(&self) -> Result<String> {
            self.closed.notified().await;
            Err(SocketIoError::ConnectionClosed("test transport closed".into()))
        }

        async fn send(&self, text: String) -> Result<()> {
            self.sent.lock().push(text);
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.closed.notify_waiters();
        }
    }

    fn connection_with(capacity: usize) -> (Arc<Connection>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let options = ConnectionOptions {
            queue_capacity: capacity,
            ..ConnectionOptions::default()
        };
        let connection = Connection::new(
            transport.clone(),
            SessionTimings::fixed(None, Duration::from_secs(5)),
            options,
        )
        .unwrap();
        (connection, transport)
    }

    #[test]
    fn test_backpressure_thresholds() {
        let (connection, _transport) = connection_with(500);
        let overflow = Arc::clone(&connection.overflow);

        for _ in 0..250 {
            connection.emit("tick", &1).unwrap();
        }
        assert_eq!(connection.check_backpressure().unwrap(), Pressure::Normal);
        assert!(!overflow.contains(connection.id()));

        connection.emit("tick", &1).unwrap();
        assert_eq!(connection.check_backpressure().unwrap(), Pressure::Overflowed);
        assert!(overflow.contains(connection.id()));

        for _ in 251..498 {
            connection.emit("tick", &1).unwrap();
        }
        assert_eq!(connection.queued_len(), 498);
        assert_eq!(connection.check_backpressure().unwrap(), Pressure::Overflowed);
        assert!(connection.is_active());

        connection.emit("tick", &1).unwrap();
        assert!(matches!(
            connection.check_backpressure(),
            Err(SocketIoError::SocketFlooded { queued: 499 })
        ));
        assert!(!connection.is_active());
        assert_eq!(connection.close_reason(), Some(CloseReason::Flooded));
        assert!(!overflow.contains(connection.id()));
    }

    #[test]
    fn test_overflow_mark_clears_when_queue_drains() {
        let (connection, _transport) = connection_with(10);
        for _ in 0..6 {
            connection.emit("tick", &1).unwrap();
        }
        assert_eq!(connection.check_backpressure().unwrap(), Pressure::Overflowed);
        assert_eq!(connection.overflow.count(), 1);

        while connection.outbound_rx.try_recv().is_ok() {}
        assert_eq!(connection.check_backpressure().unwrap(), Pressure::Normal);
        assert_eq!(connection.overflow.count(), 0);
    }

    #[test]
    fn test_enqueue_into_full_queue_fails() {
        let (connection, _transport) = connection_with(4);
        for _ in 0..4 {
            connection.emit("tick", &1).unwrap();
        }
        assert!(matches!(
            connection.emit("tick", &1),
            Err(SocketIoError::Overflow { capacity: 4 })
        ));
        assert_eq!(connection.queued_len(), 4);
    }

    #[test]
    fn test_noop_enqueues_one_heartbeat() {
        let (connection, _transport) = connection_with(500);
        connection.handle_frame(frame::decode("8::").unwrap());

        assert_eq!(connection.queued_len(), 1);
        assert_eq!(connection.outbound_rx.try_recv().unwrap(), HEARTBEAT_TEXT);
        assert_eq!(connection.metrics().frames_received, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (connection, transport) = connection_with(500);
        let disconnects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disconnects);
        connection
            .events()
            .register(
                DISCONNECT_EVENT,
                EventHandler::new(move |_: &Connection| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        connection.emit("queued", &"x").unwrap();
        connection.close();
        connection.close();
        assert!(!connection.close_with(CloseReason::ServerDisconnect));

        assert!(!connection.is_active());
        assert_eq!(connection.close_reason(), Some(CloseReason::Requested));
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(transport.closes.load(Ordering::SeqCst), 1);

        // Only the writer sentinel survives the drain
        assert_eq!(connection.queued_len(), 1);
        assert_eq!(connection.outbound_rx.try_recv().unwrap(), DISCONNECT_TEXT);
    }

    #[test]
    fn test_inbound_reserved_events_are_ignored() {
        let (connection, _transport) = connection_with(500);
        let calls = Arc::new(AtomicUsize::new(0));
        for event in [CONNECT_EVENT, DISCONNECT_EVENT] {
            let counter = Arc::clone(&calls);
            connection
                .events()
                .register(
                    event,
                    EventHandler::new(move |_: &Connection| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap();
        }

        connection.handle_frame(frame::decode(r#"5:::{"name":"disconnect","args":[]}"#).unwrap());
        connection.handle_frame(frame::decode(r#"5:::{"name":"connect","args":[]}"#).unwrap());
        assert!(connection.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(connection.metrics().frames_received, 2);

        connection.close();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_handler_runs_off_the_closing_task() {
        let (connection, _transport) = connection_with(500);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        connection
            .events()
            .register(
                DISCONNECT_EVENT,
                EventHandler::new(move |_: &Connection| {
                    let _ = release_rx.recv_timeout(Duration::from_secs(5));
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        // A blocking handler must not hold up close itself
        connection.close();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!connection.is_active());

        release_tx.send(()).unwrap();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        connection.close();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_after_close_fails() {
        let (connection, _transport) = connection_with(500);
        connection.close();
        assert!(matches!(
            connection.emit("late", &1),
            Err(SocketIoError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_disconnect_frame_closes() {
        let (connection, _transport) = connection_with(500);
        connection.handle_frame(frame::decode("0::").unwrap());
        assert_eq!(connection.close_reason(), Some(CloseReason::ServerDisconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_with_ack_times_out_and_drops_late_reply() {
        let (connection, _transport) = connection_with(500);

        let err = connection
            .emit_with_ack("save", &serde_json::json!({"id": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, SocketIoError::AckTimeout { id: 1, .. }));
        assert_eq!(connection.acks().pending_count(), 0);

        let queued = connection.outbound_rx.try_recv().unwrap();
        assert_eq!(queued, r#"5:1+::{"name":"save","args":[{"id":1}]}"#);

        // Late reply finds nothing to resolve and leaves the connection alive
        connection.handle_frame(frame::decode("6:::1+[\"late\"]").unwrap());
        assert!(connection.is_active());
        assert!(matches!(
            connection.acks().resolve(1),
            Err(SocketIoError::AckListenerNotFound(1))
        ));
    }

    #[tokio::test]
    async fn test_ack_resolves_waiter() {
        let (connection, _transport) = connection_with(500);
        let waiter = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.emit_with_ack("save", &("a", 2)).await })
        };

        while !connection.acks().is_pending(1) {
            tokio::task::yield_now().await;
        }
        connection.handle_frame(frame::decode("6:::1+[\"ok\",2]").unwrap());
        assert!(!connection.acks().is_pending(1));

        let payload = waiter.await.unwrap().unwrap();
        let (status, count): (String, u32) = payload.decode().unwrap();
        assert_eq!(status, "ok");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_close_wakes_ack_waiter() {
        let (connection, _transport) = connection_with(500);
        let waiter = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.emit_with_ack("save", &1).await })
        };

        while connection.acks().pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        connection.close();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, SocketIoError::ConnectionClosed(_)));
    }

    #[tokio::test]
    async fn test_writer_sends_queued_frames_then_exits() {
        let (connection, transport) = connection_with(500);
        let tasks = connection.start();

        connection.emit("hello", &"world").unwrap();
        while transport.sent.lock().is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(!tasks.is_finished());
        connection.close();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !tasks.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        tasks.join().await;

        assert_eq!(
            transport.sent.lock().as_slice(),
            [r#"5:::{"name":"hello","args":["world"]}"#.to_string()]
        );
        assert_eq!(connection.metrics().frames_sent, 1);
    }
}
