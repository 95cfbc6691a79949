//! Async client for the pong wire protocol.
//!
//! [`PongClient`] splits a connected [`Transport`] in two. The read half is
//! moved into a background receive loop task that decodes frames and applies
//! them to the shared [`StateStore`]; the write half stays with the handle,
//! which turns input intents into outbound frames. Events are emitted on a
//! bounded channel returned from [`PongClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let (client, mut events) = PongClient::connect(PongClientConfig::default()).await;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         PongEvent::PlayerAssigned { .. } => client.send_ready(true).await?,
//!         PongEvent::GameState(snapshot) => { /* draw */ }
//!         PongEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{PongError, Result};
use crate::event::PongEvent;
use crate::presentation::Intent;
use crate::protocol::{
    ClientMessage, Direction, FrameHeader, PlayerId, ServerMessage, GAME_STATE_LEN, HEADER_LEN,
};
use crate::state::{ClientState, StateStore};
use crate::transport::{Transport, TransportReader, TransportWriter};

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 9090;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Default cap on a single frame payload.
const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// Default per-iteration sleep of the foreground loop.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How long the receive loop waits for room to deliver `Disconnected`.
const DISCONNECT_GRACE: Duration = Duration::from_millis(100);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`PongClient`].
///
/// # Example
///
/// ```
/// use pong_net_client::client::PongClientConfig;
/// use std::time::Duration;
///
/// let config = PongClientConfig::new("10.0.0.5", 7000)
///     .with_connect_timeout(Duration::from_secs(3))
///     .with_event_channel_capacity(64);
/// assert_eq!(config.addr(), "10.0.0.5:7000");
/// ```
#[derive(Debug, Clone)]
pub struct PongClientConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Deadline for the initial connection. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up, events are dropped (with a warning
    /// logged) so the receive loop never blocks on them. `Disconnected` waits
    /// briefly for room and is dropped only if the channel stays full.
    /// Defaults to **256**; values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// How long [`PongClient::shutdown`] waits for the receive loop before
    /// aborting it. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Largest payload length a header may declare. Anything larger ends the
    /// session, since the stream cannot be resynchronized. Defaults to
    /// **64 KiB**; values below the `GAME_STATE` payload size are clamped up.
    pub max_payload_len: usize,
    /// Sleep between iterations of [`run_presentation`](crate::run_presentation).
    /// Defaults to **100 ms**.
    pub tick_interval: Duration,
}

impl Default for PongClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl PongClientConfig {
    /// Create a configuration for `host:port` with default values elsewhere.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Defaults overridden by `PONG_HOST` and `PONG_PORT` when set.
    ///
    /// An unparsable `PONG_PORT` is logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup("PONG_HOST").filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup("PONG_PORT") {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(e) => warn!(value = %port, "ignoring invalid PONG_PORT: {e}"),
            }
        }
        config
    }

    /// The `host:port` string that will be dialed.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Set a deadline for the initial connection.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the capacity of the bounded event channel. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the largest accepted payload length.
    #[must_use]
    pub fn with_max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len.max(GAME_STATE_LEN);
        self
    }

    /// Set the foreground tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a pong session.
///
/// Owns the write half of the transport and the background receive loop.
/// All command methods take `&self`, so the handle can be shared by a
/// presentation loop and any other foreground task.
pub struct PongClient {
    /// Shared state updated by the receive loop and by optimistic commands.
    state: StateStore,
    /// Write half. `None` when the initial connection failed.
    writer: Option<Mutex<Box<dyn TransportWriter>>>,
    /// Cooperative stop flag for the foreground and receive loops.
    running: Arc<AtomicBool>,
    /// Handle to the background receive loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
    /// Foreground tick interval.
    tick_interval: Duration,
}

impl PongClient {
    /// Dial the configured server and start the client.
    ///
    /// A failed connection is not returned as an error: the client comes back
    /// in a disconnected state whose diagnostic message carries the cause, and
    /// the event channel yields a single `Disconnected` event. Use
    /// [`TcpTransport::connect`](crate::TcpTransport::connect) with
    /// [`start`](Self::start) to handle the error yourself.
    #[cfg(feature = "transport-tcp")]
    #[must_use = "the event receiver must be used to receive events"]
    pub async fn connect(config: PongClientConfig) -> (Self, mpsc::Receiver<PongEvent>) {
        use crate::transports::TcpTransport;

        let connected = match config.connect_timeout {
            Some(timeout) => {
                TcpTransport::connect_with_timeout(&config.host, config.port, timeout).await
            }
            None => TcpTransport::connect(&config.host, config.port).await,
        };

        match connected {
            Ok(transport) => {
                let diagnostic = format!("connected to {}", config.addr());
                Self::start_with(transport, config, diagnostic)
            }
            Err(e) => {
                error!("connection error: {e}");
                Self::offline(&config, format!("connection error: {e}"))
            }
        }
    }

    /// Start the receive loop on an already-connected transport and return a
    /// handle plus the event receiver.
    ///
    /// Must be called within a tokio runtime.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: PongClientConfig,
    ) -> (Self, mpsc::Receiver<PongEvent>) {
        Self::start_with(transport, config, "connected to server".to_string())
    }

    fn start_with(
        transport: impl Transport,
        config: PongClientConfig,
        diagnostic: String,
    ) -> (Self, mpsc::Receiver<PongEvent>) {
        let (reader, writer) = transport.into_split();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<PongEvent>(capacity);

        let state = StateStore::new();
        state.mark_connected(diagnostic);
        let running = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(receive_loop(
            reader,
            state.clone(),
            event_tx,
            Arc::clone(&running),
            config.max_payload_len.max(GAME_STATE_LEN),
        ));

        let writer: Box<dyn TransportWriter> = Box::new(writer);
        let client = Self {
            state,
            writer: Some(Mutex::new(writer)),
            running,
            task: Some(task),
            shutdown_timeout: config.shutdown_timeout,
            tick_interval: config.tick_interval,
        };
        (client, event_rx)
    }

    /// A client that never connected. Commands are no-ops.
    fn offline(config: &PongClientConfig, diagnostic: String) -> (Self, mpsc::Receiver<PongEvent>) {
        let (event_tx, event_rx) = mpsc::channel::<PongEvent>(1);
        let state = StateStore::new();
        state.mark_disconnected(diagnostic.clone());
        emit_event(
            &event_tx,
            PongEvent::Disconnected {
                reason: Some(diagnostic),
            },
        );

        let client = Self {
            state,
            writer: None,
            running: Arc::new(AtomicBool::new(true)),
            task: None,
            shutdown_timeout: config.shutdown_timeout,
            tick_interval: config.tick_interval,
        };
        (client, event_rx)
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Send a `PLAYER_MOVE` frame for the local player.
    ///
    /// A failed send is recorded as the diagnostic message but does not mark
    /// the session disconnected; only the receive loop does that.
    ///
    /// # Errors
    ///
    /// - [`PongError::NotConnected`] / [`PongError::PlayerNotAssigned`]:
    ///   nothing was sent and no state changed
    /// - [`PongError::Send`] / [`PongError::TransportClosed`]: the write failed
    pub async fn send_move(&self, direction: Direction) -> Result<()> {
        let player_id = self.command_guard()?;
        let msg = ClientMessage::PlayerMove {
            player_id,
            direction,
        };
        if let Err(e) = self.write(&msg).await {
            warn!("move send error: {e}");
            self.state.set_diagnostic(format!("move send error: {e}"));
            return Err(e);
        }
        debug!(player_id, ?direction, "sent move");
        Ok(())
    }

    /// Send a `PLAYER_READY` frame for the local player.
    ///
    /// The local readiness flag is updated before the frame is written, under
    /// the writer lock, so a server echo applied while the write is in flight
    /// always lands after it and wins if it disagrees. `game_started` only
    /// latches once the write succeeds. A failed write restores the previous
    /// flag unless an echo has replaced it in the meantime.
    ///
    /// # Errors
    ///
    /// Same as [`send_move`](Self::send_move).
    pub async fn send_ready(&self, ready: bool) -> Result<()> {
        let player_id = self.command_guard()?;
        let Some(writer) = &self.writer else {
            return Err(PongError::NotConnected);
        };
        let bytes = ClientMessage::PlayerReady { player_id, ready }.encode();
        let diagnostic = if ready {
            "you are ready"
        } else {
            "you are not ready"
        };

        let mut writer = writer.lock().await;
        let previous = self.state.stage_ready(player_id, ready, diagnostic);
        let sent = writer.send(&bytes).await;
        drop(writer);

        match sent {
            Ok(()) => {
                self.state.commit_ready();
                debug!(player_id, ready, "sent readiness");
                Ok(())
            }
            Err(e) => {
                if let Some(previous) = previous {
                    self.state.revert_ready(player_id, ready, previous);
                }
                warn!("ready send error: {e}");
                self.state.set_diagnostic(format!("ready send error: {e}"));
                Err(e)
            }
        }
    }

    /// Flip the local player's readiness.
    ///
    /// Does nothing once the game has started.
    ///
    /// # Errors
    ///
    /// Same as [`send_move`](Self::send_move).
    pub async fn toggle_ready(&self) -> Result<()> {
        self.command_guard()?;
        let (started, own) = self.state.read(|s| (s.game_started, s.own_ready()));
        if started {
            debug!("ignoring ready toggle after game start");
            return Ok(());
        }
        self.send_ready(!own.unwrap_or(false)).await
    }

    /// Route a presentation-layer intent to the matching command.
    ///
    /// # Errors
    ///
    /// Propagates the error of the routed command. [`Intent::Quit`] never fails.
    pub async fn apply(&self, intent: Intent) -> Result<()> {
        match intent {
            Intent::Move(direction) => self.send_move(direction).await,
            Intent::ToggleReady => self.toggle_ready().await,
            Intent::Quit => {
                self.quit();
                Ok(())
            }
        }
    }

    /// Ask the foreground loop to stop.
    ///
    /// Cooperative: the receive loop notices on its next frame or when the
    /// connection ends. Use [`shutdown`](Self::shutdown) to also close the
    /// connection and wait for the loop.
    pub fn quit(&self) {
        debug!("quit requested");
        self.running.store(false, Ordering::Release);
    }

    /// Stop the client, close the write half and wait for the receive loop.
    ///
    /// If the loop does not exit within the configured shutdown timeout it is
    /// aborted. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        debug!("PongClient: shutdown requested");
        self.quit();

        if let Some(writer) = &self.writer {
            if let Err(e) = writer.lock().await.close().await {
                debug!("error closing transport: {e}");
            }
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("receive loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("receive loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("receive loop aborted: {join_err}");
                    }
                }
            }
        }

        if self.state.read(|s| s.connected) {
            self.state.mark_disconnected("client shut down");
        }
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Owned copy of the current state.
    pub fn state(&self) -> ClientState {
        self.state.snapshot()
    }

    /// The shared store, for callers that want [`StateStore::read`].
    pub fn store(&self) -> &StateStore {
        &self.state
    }

    /// A receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Returns `true` if the stream is believed to be open.
    pub fn is_connected(&self) -> bool {
        self.state.read(|s| s.connected)
    }

    /// Returns `true` until [`quit`](Self::quit) is called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Assigned identity, or `None` before `PLAYER_JOIN`.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.state
            .read(|s| s.is_assigned().then_some(s.player_id))
    }

    /// Configured foreground tick interval.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Commands require a live session and an assigned identity.
    fn command_guard(&self) -> Result<PlayerId> {
        self.state.read(|s| {
            if !s.connected {
                Err(PongError::NotConnected)
            } else if !s.is_assigned() {
                Err(PongError::PlayerNotAssigned)
            } else {
                Ok(s.player_id)
            }
        })
    }

    /// Encode `msg` and write it as one buffer.
    async fn write(&self, msg: &ClientMessage) -> Result<()> {
        let Some(writer) = &self.writer else {
            return Err(PongError::NotConnected);
        };
        let bytes = msg.encode();
        writer.lock().await.send(&bytes).await
    }
}

impl std::fmt::Debug for PongClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PongClient")
            .field("connected", &self.is_connected())
            .field("running", &self.is_running())
            .field("player_id", &self.player_id())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for PongClient {
    fn drop(&mut self) {
        // No executor context here to close the transport gracefully, so the
        // only safe action is to abort the receive loop.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Receive loop ────────────────────────────────────────────────────

/// Background loop: read a header, read its payload, decode, apply.
///
/// Exits when:
/// - The peer closes the stream (clean EOF or a truncated header)
/// - A transport error occurs
/// - A header declares a payload larger than `max_payload_len`
/// - The client stops running
///
/// It never reconnects. A payload cut short by end-of-stream drops only
/// that frame; the next header read then observes the closed stream.
async fn receive_loop(
    mut reader: impl TransportReader,
    state: StateStore,
    event_tx: mpsc::Sender<PongEvent>,
    running: Arc<AtomicBool>,
    max_payload_len: usize,
) {
    debug!("receive loop started");
    emit_event(&event_tx, PongEvent::Connected);

    let reason = loop {
        if !running.load(Ordering::Acquire) {
            break "client shut down".to_string();
        }

        let header = match reader.read_exact(HEADER_LEN).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_end_of_stream() => {
                debug!("stream closed by server: {e}");
                break "connection closed by server".to_string();
            }
            Err(e) => {
                error!("transport receive error: {e}");
                break format!("receive error: {e}");
            }
        };
        let header = match FrameHeader::decode(&header) {
            Ok(header) => header,
            Err(e) => {
                error!("undecodable header: {e}");
                break format!("receive error: {e}");
            }
        };

        let length = usize::try_from(header.length).unwrap_or(usize::MAX);
        if length > max_payload_len {
            let e = PongError::FrameTooLarge {
                length: header.length,
                max: max_payload_len,
            };
            error!("{e}");
            break format!("receive error: {e}");
        }

        let payload = match reader.read_exact(length).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_end_of_stream() => {
                warn!(kind = header.kind, length, "dropping incomplete frame: {e}");
                record_diagnostic(&state, &event_tx, "incomplete message received");
                continue;
            }
            Err(e) => {
                error!("transport receive error: {e}");
                break format!("receive error: {e}");
            }
        };

        match ServerMessage::decode(header.kind, &payload) {
            Ok(msg) => apply_message(&state, &event_tx, msg),
            Err(e) => warn!(kind = header.kind, length, "ignoring frame: {e}"),
        }
    };

    state.mark_disconnected(reason.clone());
    emit_disconnected(&event_tx, Some(reason)).await;
    debug!("receive loop exited");
}

/// Apply one decoded frame to the store and emit the matching events.
fn apply_message(state: &StateStore, event_tx: &mpsc::Sender<PongEvent>, msg: ServerMessage) {
    match msg {
        ServerMessage::GameState(snapshot) => {
            let started = state.apply_snapshot(snapshot);
            emit_event(event_tx, PongEvent::GameState(snapshot));
            if started {
                emit_event(event_tx, PongEvent::GameStarted);
            }
        }
        ServerMessage::PlayerJoin { player_id } => {
            if state.assign_player(player_id) {
                info!(player_id, "assigned player identity");
                emit_event(event_tx, PongEvent::PlayerAssigned { player_id });
            }
        }
        ServerMessage::PlayerReady { player_id, ready } => {
            let diagnostic = if ready {
                format!("player {player_id} is ready")
            } else {
                format!("player {player_id} is not ready")
            };
            if let Some(started) = state.set_ready(player_id, ready, diagnostic) {
                emit_event(event_tx, PongEvent::ReadinessChanged { player_id, ready });
                if started {
                    emit_event(event_tx, PongEvent::GameStarted);
                }
            }
        }
        ServerMessage::PlayerMove {
            player_id,
            direction,
        } => {
            debug!(player_id, direction, "ignoring PLAYER_MOVE from server");
        }
    }
}

fn record_diagnostic(state: &StateStore, event_tx: &mpsc::Sender<PongEvent>, message: &str) {
    state.set_diagnostic(message);
    emit_event(event_tx, PongEvent::Diagnostic(message.to_string()));
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the receive loop.
fn emit_event(event_tx: &mpsc::Sender<PongEvent>, event: PongEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit [`PongEvent::Disconnected`], waiting up to [`DISCONNECT_GRACE`] for
/// channel space. A consumer that never drains the channel cannot keep the
/// loop from exiting; the store already records the disconnect.
async fn emit_disconnected(event_tx: &mpsc::Sender<PongEvent>, reason: Option<String>) {
    match event_tx
        .send_timeout(PongEvent::Disconnected { reason }, DISCONNECT_GRACE)
        .await
    {
        Ok(()) => {}
        Err(mpsc::error::SendTimeoutError::Timeout(_)) => {
            warn!("event channel full, dropping Disconnected event");
        }
        Err(mpsc::error::SendTimeoutError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::GameSnapshot;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// Replays one scripted result per `read_exact` call.
    struct MockReader {
        incoming: VecDeque<std::result::Result<Vec<u8>, PongError>>,
    }

    #[async_trait]
    impl TransportReader for MockReader {
        async fn read_exact(&mut self, n: usize) -> std::result::Result<Vec<u8>, PongError> {
            if n == 0 {
                return Ok(Vec::new());
            }
            match self.incoming.pop_front() {
                Some(Ok(bytes)) => {
                    assert_eq!(bytes.len(), n, "scripted read has the wrong length");
                    Ok(bytes)
                }
                Some(Err(e)) => Err(e),
                // Hang so the loop stays alive until shutdown.
                None => std::future::pending().await,
            }
        }
    }

    /// Records every buffer; fails every send when `fail` is set.
    struct MockWriter {
        sent: Arc<StdMutex<Vec<Vec<u8>>>>,
        fail: bool,
    }

    #[async_trait]
    impl TransportWriter for MockWriter {
        async fn send(&mut self, bytes: &[u8]) -> std::result::Result<(), PongError> {
            if self.fail {
                return Err(PongError::Send(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "broken pipe",
                )));
            }
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), PongError> {
            Ok(())
        }
    }

    struct MockTransport {
        reader: MockReader,
        writer: MockWriter,
    }

    impl Transport for MockTransport {
        type Reader = MockReader;
        type Writer = MockWriter;

        fn into_split(self) -> (MockReader, MockWriter) {
            (self.reader, self.writer)
        }
    }

    type Sent = Arc<StdMutex<Vec<Vec<u8>>>>;

    /// Script each server frame as a header read followed by a payload read.
    fn start_client(
        frames: Vec<ServerMessage>,
        fail_sends: bool,
    ) -> (PongClient, mpsc::Receiver<PongEvent>, Sent) {
        let mut incoming = VecDeque::new();
        for frame in frames {
            let bytes = frame.encode();
            let (header, payload) = bytes.split_at(HEADER_LEN);
            incoming.push_back(Ok(header.to_vec()));
            incoming.push_back(Ok(payload.to_vec()));
        }
        start_scripted(incoming, fail_sends)
    }

    fn start_scripted(
        incoming: VecDeque<std::result::Result<Vec<u8>, PongError>>,
        fail_sends: bool,
    ) -> (PongClient, mpsc::Receiver<PongEvent>, Sent) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let transport = MockTransport {
            reader: MockReader { incoming },
            writer: MockWriter {
                sent: Arc::clone(&sent),
                fail: fail_sends,
            },
        };
        let config = PongClientConfig::default().with_shutdown_timeout(Duration::from_millis(50));
        let (client, events) = PongClient::start(transport, config);
        (client, events, sent)
    }

    /// Pushes a scripted server frame to the peer from inside `send`, then
    /// holds the send open so the receive loop applies the frame first.
    struct EchoWriter {
        peer: tokio::io::DuplexStream,
        echo: Vec<u8>,
    }

    #[async_trait]
    impl TransportWriter for EchoWriter {
        async fn send(&mut self, _bytes: &[u8]) -> std::result::Result<(), PongError> {
            use tokio::io::AsyncWriteExt;
            self.peer.write_all(&self.echo).await.map_err(PongError::Send)?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }

        async fn close(&mut self) -> std::result::Result<(), PongError> {
            Ok(())
        }
    }

    struct EchoTransport {
        reader: crate::transports::StreamReader<tokio::io::DuplexStream>,
        writer: EchoWriter,
    }

    impl Transport for EchoTransport {
        type Reader = crate::transports::StreamReader<tokio::io::DuplexStream>;
        type Writer = EchoWriter;

        fn into_split(self) -> (Self::Reader, EchoWriter) {
            (self.reader, self.writer)
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (mut client, mut events, _sent) = start_client(vec![], false);
        assert_eq!(events.recv().await.unwrap(), PongEvent::Connected);
        assert!(client.is_connected());
        assert_eq!(client.state().diagnostic_message, "connected to server");
        client.shutdown().await;
    }

    #[tokio::test]
    async fn join_assigns_player() {
        let (mut client, mut events, _sent) =
            start_client(vec![ServerMessage::PlayerJoin { player_id: 1 }], false);
        let _ = events.recv().await; // Connected
        assert_eq!(
            events.recv().await.unwrap(),
            PongEvent::PlayerAssigned { player_id: 1 }
        );
        assert_eq!(client.player_id(), Some(1));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn commands_are_noops_before_assignment() {
        let (mut client, mut events, sent) = start_client(vec![], false);
        let _ = events.recv().await; // Connected
        let before = client.state();

        assert!(matches!(
            client.send_move(Direction::Down).await,
            Err(PongError::PlayerNotAssigned)
        ));
        assert!(matches!(
            client.send_ready(true).await,
            Err(PongError::PlayerNotAssigned)
        ));
        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(client.state(), before);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn send_move_writes_one_frame() {
        let (mut client, mut events, sent) =
            start_client(vec![ServerMessage::PlayerJoin { player_id: 2 }], false);
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // PlayerAssigned

        client.send_move(Direction::Down).await.unwrap();
        assert_eq!(sent.lock().unwrap().as_slice(), &[vec![3, 0, 0, 0, 2, 2, 1]]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn send_ready_is_optimistic() {
        let (mut client, mut events, sent) =
            start_client(vec![ServerMessage::PlayerJoin { player_id: 1 }], false);
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // PlayerAssigned

        client.send_ready(true).await.unwrap();
        let state = client.state();
        assert!(state.player1_ready);
        assert_eq!(state.diagnostic_message, "you are ready");
        assert_eq!(sent.lock().unwrap().as_slice(), &[vec![4, 0, 0, 0, 2, 1, 1]]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn send_failure_keeps_session_connected() {
        let (mut client, mut events, _sent) =
            start_client(vec![ServerMessage::PlayerJoin { player_id: 1 }], true);
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // PlayerAssigned

        assert!(matches!(
            client.send_ready(true).await,
            Err(PongError::Send(_))
        ));
        let state = client.state();
        assert!(state.connected);
        assert!(!state.player1_ready, "failed send must not update readiness");
        assert!(state.diagnostic_message.starts_with("ready send error"));

        assert!(client.send_move(Direction::Up).await.is_err());
        assert!(client.state().diagnostic_message.starts_with("move send error"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_echo_during_send_wins() {
        use tokio::io::AsyncWriteExt;
        let (local, mut remote) = tokio::io::duplex(64);
        remote
            .write_all(&ServerMessage::PlayerJoin { player_id: 1 }.encode())
            .await
            .unwrap();
        let transport = EchoTransport {
            reader: crate::transports::StreamReader::new(local),
            writer: EchoWriter {
                peer: remote,
                echo: ServerMessage::PlayerReady {
                    player_id: 1,
                    ready: false,
                }
                .encode(),
            },
        };
        let config = PongClientConfig::default().with_shutdown_timeout(Duration::from_millis(50));
        let (mut client, mut events) = PongClient::start(transport, config);
        assert_eq!(events.recv().await.unwrap(), PongEvent::Connected);
        assert_eq!(
            events.recv().await.unwrap(),
            PongEvent::PlayerAssigned { player_id: 1 }
        );

        client.send_ready(true).await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            PongEvent::ReadinessChanged {
                player_id: 1,
                ready: false
            }
        );
        let state = client.state();
        assert!(!state.player1_ready, "echo applied mid-send must not be overwritten");
        assert!(!state.game_started);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_ready_flips_own_flag() {
        let (mut client, mut events, sent) =
            start_client(vec![ServerMessage::PlayerJoin { player_id: 2 }], false);
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // PlayerAssigned

        client.toggle_ready().await.unwrap();
        assert!(client.state().player2_ready);
        client.apply(Intent::ToggleReady).await.unwrap();
        assert!(!client.state().player2_ready);

        let messages = sent.lock().unwrap().clone();
        assert_eq!(
            messages,
            vec![vec![4, 0, 0, 0, 2, 2, 1], vec![4, 0, 0, 0, 2, 2, 0]]
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn toggle_ready_is_ignored_after_start() {
        let (mut client, mut events, sent) = start_client(
            vec![
                ServerMessage::PlayerJoin { player_id: 1 },
                ServerMessage::PlayerReady {
                    player_id: 1,
                    ready: true,
                },
                ServerMessage::PlayerReady {
                    player_id: 2,
                    ready: true,
                },
            ],
            false,
        );
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // PlayerAssigned
        let _ = events.recv().await; // ReadinessChanged 1
        let _ = events.recv().await; // ReadinessChanged 2
        assert_eq!(events.recv().await.unwrap(), PongEvent::GameStarted);

        client.toggle_ready().await.unwrap();
        assert!(sent.lock().unwrap().is_empty());
        assert!(client.state().player1_ready);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn short_payload_is_dropped_then_eof_disconnects() {
        let snapshot = ServerMessage::GameState(GameSnapshot {
            ball_x: 1.0,
            ..GameSnapshot::default()
        })
        .encode();
        let incoming = VecDeque::from(vec![
            Ok(snapshot[..HEADER_LEN].to_vec()),
            Err(PongError::ShortRead {
                expected: 18,
                received: 4,
            }),
            Err(PongError::StreamClosed),
        ]);
        let (mut client, mut events, _sent) = start_scripted(incoming, false);

        let _ = events.recv().await; // Connected
        assert_eq!(
            events.recv().await.unwrap(),
            PongEvent::Diagnostic("incomplete message received".into())
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            PongEvent::Disconnected { .. }
        ));
        let state = client.state();
        assert!(!state.connected);
        assert_eq!(state.last_snapshot, GameSnapshot::default());
        assert_eq!(state.diagnostic_message, "connection closed by server");
        client.shutdown().await;
    }

    #[tokio::test]
    async fn receive_error_disconnects() {
        let incoming = VecDeque::from(vec![Err(PongError::Receive(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )))]);
        let (mut client, mut events, _sent) = start_scripted(incoming, false);

        let _ = events.recv().await; // Connected
        match events.recv().await.unwrap() {
            PongEvent::Disconnected { reason } => {
                assert!(reason.unwrap().starts_with("receive error"));
            }
            other => panic!("expected Disconnected, got {other:?}"),
        }
        assert!(!client.is_connected());
        assert!(matches!(
            client.send_move(Direction::Up).await,
            Err(PongError::NotConnected)
        ));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn oversized_frame_ends_session() {
        let header = FrameHeader {
            kind: 1,
            length: u32::MAX,
        };
        let incoming = VecDeque::from(vec![Ok(header.encode().to_vec())]);
        let (mut client, mut events, _sent) = start_scripted(incoming, false);

        let _ = events.recv().await; // Connected
        assert!(matches!(
            events.recv().await.unwrap(),
            PongEvent::Disconnected { .. }
        ));
        assert!(!client.is_connected());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_frame_is_skipped() {
        let incoming = VecDeque::from(vec![
            Ok(vec![9, 0, 0, 0, 3]),
            Ok(vec![1, 2, 3]),
            Ok(vec![2, 0, 0, 0, 1]),
            Ok(vec![2]),
        ]);
        let (mut client, mut events, _sent) = start_scripted(incoming, false);

        let _ = events.recv().await; // Connected
        assert_eq!(
            events.recv().await.unwrap(),
            PongEvent::PlayerAssigned { player_id: 2 }
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_aborts_blocked_loop_and_marks_disconnected() {
        let (mut client, mut events, _sent) = start_client(vec![], false);
        let _ = events.recv().await; // Connected

        client.shutdown().await;
        assert!(!client.is_running());
        assert!(!client.is_connected());
        assert_eq!(client.state().diagnostic_message, "client shut down");

        // Second shutdown must not panic.
        client.shutdown().await;
    }

    #[tokio::test]
    async fn quit_intent_stops_running() {
        let (mut client, _events, _sent) = start_client(vec![], false);
        client.apply(Intent::Quit).await.unwrap();
        assert!(!client.is_running());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (mut client, _events, _sent) = start_client(vec![], false);
        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("PongClient"));
        assert!(debug_str.contains("connected"));
        client.shutdown().await;
    }

    #[test]
    fn config_defaults() {
        let config = PongClientConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:9090");
        assert!(config.connect_timeout.is_none());
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.max_payload_len, 64 * 1024);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
    }

    #[test]
    fn config_builder_clamps() {
        let config = PongClientConfig::default()
            .with_event_channel_capacity(0)
            .with_max_payload_len(1);
        assert_eq!(config.event_channel_capacity, 1);
        assert_eq!(config.max_payload_len, GAME_STATE_LEN);
    }

    #[test]
    fn config_reads_environment_overrides() {
        let config = PongClientConfig::from_lookup(|key| match key {
            "PONG_HOST" => Some("example.test".into()),
            "PONG_PORT" => Some("7001".into()),
            _ => None,
        });
        assert_eq!(config.addr(), "example.test:7001");

        let config = PongClientConfig::from_lookup(|key| {
            (key == "PONG_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
