#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for pong client integration tests.
//!
//! Provides an in-process fake server built on [`tokio::io::duplex`], a
//! byte-scripted [`MockTransport`] for failure injection, and helpers for
//! building server frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use pong_net_client::protocol::{
    ClientMessage, FrameHeader, GameSnapshot, PlayerId, ServerMessage, HEADER_LEN,
};
use pong_net_client::{
    PongClient, PongClientConfig, PongError, PongEvent, StreamTransport, Transport,
    TransportReader, TransportWriter,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

/// How long a test waits for any single event before failing.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

// ── Fake server ─────────────────────────────────────────────────────

/// The server end of an in-process connection.
pub struct FakeServer {
    stream: DuplexStream,
}

impl FakeServer {
    /// Write raw bytes, exactly as given.
    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Encode and write one server frame.
    pub async fn send(&mut self, msg: ServerMessage) {
        self.write_raw(&msg.encode()).await;
    }

    /// Read one client frame.
    pub async fn recv(&mut self) -> ClientMessage {
        let mut header = [0u8; HEADER_LEN];
        tokio::time::timeout(EVENT_TIMEOUT, self.stream.read_exact(&mut header))
            .await
            .expect("timed out waiting for a client frame")
            .unwrap();
        let header = FrameHeader::decode(&header).unwrap();
        let mut payload = vec![0u8; header.length as usize];
        self.stream.read_exact(&mut payload).await.unwrap();
        ClientMessage::decode(header.kind, &payload).unwrap()
    }

    /// Close the server side of the connection.
    pub fn hang_up(self) {
        drop(self.stream);
    }
}

/// Start a client against an in-process fake server.
pub fn connect_pair() -> (PongClient, mpsc::Receiver<PongEvent>, FakeServer) {
    connect_pair_with(test_config())
}

/// Default config with a short shutdown timeout so parked loops abort quickly.
pub fn test_config() -> PongClientConfig {
    PongClientConfig::default().with_shutdown_timeout(Duration::from_millis(100))
}

/// Start a client with a custom config against an in-process fake server.
pub fn connect_pair_with(
    config: PongClientConfig,
) -> (PongClient, mpsc::Receiver<PongEvent>, FakeServer) {
    let (local, remote) = tokio::io::duplex(4096);
    let (client, events) = PongClient::start(StreamTransport::new(local), config);
    (client, events, FakeServer { stream: remote })
}

/// Wait for the next event, failing the test on timeout or channel close.
pub async fn next_event(events: &mut mpsc::Receiver<PongEvent>) -> PongEvent {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Drain events until one matches `pred`, returning it.
pub async fn wait_for(
    events: &mut mpsc::Receiver<PongEvent>,
    pred: impl Fn(&PongEvent) -> bool,
) -> PongEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

/// `PLAYER_JOIN` assigning `player_id`.
pub fn join(player_id: PlayerId) -> ServerMessage {
    ServerMessage::PlayerJoin { player_id }
}

/// `PLAYER_READY` for `player_id`.
pub fn ready(player_id: PlayerId, ready: bool) -> ServerMessage {
    ServerMessage::PlayerReady { player_id, ready }
}

/// `GAME_STATE` with distinctive values.
pub fn snapshot(score1: u8, score2: u8) -> GameSnapshot {
    GameSnapshot {
        paddle1_y: 120.5,
        paddle2_y: 310.0,
        ball_x: 401.25,
        ball_y: 299.75,
        score1,
        score2,
    }
}

// ── MockTransport ───────────────────────────────────────────────────

/// A byte-scripted transport for failure injection.
///
/// The reader serves the scripted bytes and then either reports end-of-stream
/// or hangs forever. The writer records every buffer, or fails every send.
pub struct MockTransport {
    reader: MockReader,
    writer: MockWriter,
}

pub struct MockReader {
    bytes: Vec<u8>,
    pos: usize,
    eof: bool,
}

pub struct MockWriter {
    sent: Arc<StdMutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
    fail_sends: bool,
}

impl MockTransport {
    /// Create a transport serving `incoming`.
    ///
    /// Returns the transport plus shared handles for inspecting sent buffers
    /// and whether close was called.
    pub fn new(
        incoming: Vec<u8>,
        eof: bool,
        fail_sends: bool,
    ) -> (Self, Arc<StdMutex<Vec<Vec<u8>>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            reader: MockReader {
                bytes: incoming,
                pos: 0,
                eof,
            },
            writer: MockWriter {
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                fail_sends,
            },
        };
        (transport, sent, closed)
    }
}

impl Transport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn into_split(self) -> (MockReader, MockWriter) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl TransportReader for MockReader {
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, PongError> {
        let available = self.bytes.len() - self.pos;
        if available >= n {
            let out = self.bytes[self.pos..self.pos + n].to_vec();
            self.pos += n;
            return Ok(out);
        }
        if !self.eof {
            // Script exhausted: hang so the loop stays alive until shutdown.
            return std::future::pending().await;
        }
        self.pos = self.bytes.len();
        if available == 0 {
            Err(PongError::StreamClosed)
        } else {
            Err(PongError::ShortRead {
                expected: n,
                received: available,
            })
        }
    }
}

#[async_trait]
impl TransportWriter for MockWriter {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), PongError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(PongError::TransportClosed);
        }
        if self.fail_sends {
            return Err(PongError::Send(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        self.sent.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PongError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
