//! Error types for the pong network client.

use thiserror::Error;

/// Errors that can occur when using the pong client.
#[derive(Debug, Error)]
pub enum PongError {
    /// The initial connection to the server could not be established.
    #[error("could not reach {addr}: {source}")]
    Connection {
        /// The `host:port` that was dialed.
        addr: String,
        /// Underlying I/O cause.
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the stream before any byte of a read arrived.
    #[error("connection closed by server")]
    StreamClosed,

    /// The peer closed the stream part-way through a read.
    #[error("incomplete read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes that arrived before end-of-stream.
        received: usize,
    },

    /// Failed to write an outbound frame.
    #[error("transport send error: {0}")]
    Send(#[source] std::io::Error),

    /// Failed to read from the transport for a reason other than end-of-stream.
    #[error("transport receive error: {0}")]
    Receive(#[source] std::io::Error),

    /// The write half has already been closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// A frame header declared a payload the client refuses to buffer.
    #[error("frame payload of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared payload length.
        length: u32,
        /// Configured maximum.
        max: usize,
    },

    /// A command was issued while the session is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// A command was issued before the server assigned a player identity.
    #[error("no player identity assigned yet")]
    PlayerNotAssigned,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// Failed to serialize client state.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PongError {
    /// Returns `true` for the end-of-stream conditions (`StreamClosed`, `ShortRead`).
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::StreamClosed | Self::ShortRead { .. })
    }
}

/// A specialized [`Result`] type for pong client operations.
pub type Result<T> = std::result::Result<T, PongError>;
