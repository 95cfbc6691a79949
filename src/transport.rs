//! Transport abstraction for the pong wire protocol.
//!
//! A [`Transport`] is a connected byte stream split into two independently
//! owned halves. The receive loop owns the [`TransportReader`] and blocks in
//! [`read_exact`](TransportReader::read_exact); the client handle owns the
//! [`TransportWriter`] and writes whole frames from the foreground. Splitting
//! the stream lets a move command go out while a read is pending without
//! ever cancelling that read.
//!
//! # Connection Setup
//!
//! Connection setup is NOT part of these traits. Build a connected transport
//! (for example `TcpTransport::connect`) and pass it to `PongClient::start`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use pong_net_client::error::PongError;
//! use pong_net_client::transport::{Transport, TransportReader, TransportWriter};
//!
//! struct MyReader;
//! struct MyWriter;
//! struct MyTransport;
//!
//! #[async_trait]
//! impl TransportReader for MyReader {
//!     async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, PongError> {
//!         // Return exactly `n` bytes, or StreamClosed / ShortRead at end-of-stream.
//!         todo!()
//!     }
//! }
//!
//! #[async_trait]
//! impl TransportWriter for MyWriter {
//!     async fn send(&mut self, bytes: &[u8]) -> Result<(), PongError> {
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), PongError> {
//!         todo!()
//!     }
//! }
//!
//! impl Transport for MyTransport {
//!     type Reader = MyReader;
//!     type Writer = MyWriter;
//!
//!     fn into_split(self) -> (MyReader, MyWriter) {
//!         (MyReader, MyWriter)
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::PongError;

/// The read half of a connected byte stream.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Read exactly `n` bytes.
    ///
    /// Blocks until all `n` bytes have arrived, the peer closes the stream,
    /// or the connection fails. It never returns fewer than `n` bytes as
    /// success.
    ///
    /// # Errors
    ///
    /// - [`PongError::StreamClosed`]: end-of-stream before any byte arrived
    /// - [`PongError::ShortRead`]: end-of-stream after some but not all bytes
    /// - [`PongError::Receive`]: any other transport failure
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, PongError>;
}

/// The write half of a connected byte stream.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    /// Hand the whole buffer to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`PongError::TransportClosed`] after [`close`](Self::close),
    /// or [`PongError::Send`] if the connection fails mid-write.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), PongError>;

    /// Shut down the write direction and release the resource.
    ///
    /// Idempotent: closing twice succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown itself fails. Implementations must
    /// still treat the writer as closed afterwards.
    async fn close(&mut self) -> Result<(), PongError>;
}

/// A connected stream that can be split into a reader and a writer.
pub trait Transport: Send + 'static {
    /// Read half handed to the receive loop.
    type Reader: TransportReader;
    /// Write half kept by the client handle.
    type Writer: TransportWriter;

    /// Split the connection into its two halves.
    fn into_split(self) -> (Self::Reader, Self::Writer);
}
