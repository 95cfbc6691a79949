//! Generic stream halves over any tokio byte stream.
//!
//! [`StreamReader`] turns a raw [`AsyncRead`] into a [`TransportReader`] with
//! strict exact-read semantics: a partial read caused by end-of-stream is
//! always reported, never returned as data. [`StreamWriter`] writes whole
//! buffers and tracks its own closed state so `close` is idempotent.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::error::PongError;
use crate::transport::{Transport, TransportReader, TransportWriter};

/// Read half wrapping any [`AsyncRead`].
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
}

impl<R> StreamReader<R> {
    /// Wrap a raw reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwrap the raw reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R> TransportReader for StreamReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, PongError> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while let Some(dst) = buf.get_mut(filled..).filter(|rest| !rest.is_empty()) {
            match self.inner.read(dst).await {
                Ok(0) if filled == 0 => return Err(PongError::StreamClosed),
                Ok(0) => {
                    return Err(PongError::ShortRead {
                        expected: n,
                        received: filled,
                    })
                }
                Ok(read) => filled += read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(PongError::Receive(e)),
            }
        }
        Ok(buf)
    }
}

/// Write half wrapping any [`AsyncWrite`].
#[derive(Debug)]
pub struct StreamWriter<W> {
    inner: W,
    closed: bool,
}

impl<W> StreamWriter<W> {
    /// Wrap a raw writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Returns `true` once [`close`](TransportWriter::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl<W> TransportWriter for StreamWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, bytes: &[u8]) -> Result<(), PongError> {
        if self.closed {
            return Err(PongError::TransportClosed);
        }
        self.inner.write_all(bytes).await.map_err(PongError::Send)?;
        self.inner.flush().await.map_err(PongError::Send)
    }

    async fn close(&mut self) -> Result<(), PongError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.shutdown().await.map_err(PongError::Send)
    }
}

/// A [`Transport`] over any bidirectional tokio stream, such as
/// [`tokio::io::DuplexStream`] for in-process testing.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
}

impl<S> StreamTransport<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = StreamReader<ReadHalf<S>>;
    type Writer = StreamWriter<WriteHalf<S>>;

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        let (read, write) = tokio::io::split(self.stream);
        (StreamReader::new(read), StreamWriter::new(write))
    }
}

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

    #[tokio::test]
    async fn read_exact_reassembles_fragmented_input() {
        let mock = tokio_test::io::Builder::new()
            .read(&[1, 0])
            .read(&[0, 0])
            .read(&[2, 7, 9])
            .build();
        let mut reader = StreamReader::new(mock);

        assert_eq!(reader.read_exact(5).await.unwrap(), vec![1, 0, 0, 0, 2]);
        assert_eq!(reader.read_exact(2).await.unwrap(), vec![7, 9]);
    }

    #[tokio::test]
    async fn read_exact_reports_clean_eof() {
        let mock = tokio_test::io::Builder::new().build();
        let mut reader = StreamReader::new(mock);
        assert!(matches!(
            reader.read_exact(5).await,
            Err(PongError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn read_exact_reports_short_read() {
        let mock = tokio_test::io::Builder::new().read(&[1, 2, 3]).build();
        let mut reader = StreamReader::new(mock);
        match reader.read_exact(18).await {
            Err(PongError::ShortRead { expected, received }) => {
                assert_eq!(expected, 18);
                assert_eq!(received, 3);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_exact_zero_bytes_does_not_touch_stream() {
        let mock = tokio_test::io::Builder::new().build();
        let mut reader = StreamReader::new(mock);
        assert!(reader.read_exact(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_error_maps_to_receive() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut reader = StreamReader::new(mock);
        assert!(matches!(
            reader.read_exact(5).await,
            Err(PongError::Receive(_))
        ));
    }

    #[tokio::test]
    async fn writer_sends_whole_buffer() {
        let mock = tokio_test::io::Builder::new()
            .write(&[3, 0, 0, 0, 2, 1, 1])
            .build();
        let mut writer = StreamWriter::new(mock);
        writer.send(&[3, 0, 0, 0, 2, 1, 1]).await.unwrap();
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let (client, _server) = tokio::io::duplex(64);
        let (_reader, mut writer) = StreamTransport::new(client).into_split();
        writer.close().await.unwrap();
        writer.close().await.unwrap();
        assert!(writer.is_closed());
        assert!(matches!(
            writer.send(&[1]).await,
            Err(PongError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn duplex_round_trip() {
        let (client, server) = tokio::io::duplex(64);
        let (mut client_reader, mut client_writer) = StreamTransport::new(client).into_split();
        let (mut server_reader, mut server_writer) = StreamTransport::new(server).into_split();

        client_writer.send(&[4, 0, 0, 0, 2, 1, 1]).await.unwrap();
        assert_eq!(
            server_reader.read_exact(7).await.unwrap(),
            vec![4, 0, 0, 0, 2, 1, 1]
        );

        server_writer.send(&[2, 0, 0, 0, 1, 2]).await.unwrap();
        server_writer.close().await.unwrap();
        assert_eq!(
            client_reader.read_exact(6).await.unwrap(),
            vec![2, 0, 0, 0, 1, 2]
        );
        assert!(matches!(
            client_reader.read_exact(5).await,
            Err(PongError::StreamClosed)
        ));
    }
}
