//! TCP transport implementation using `tokio::net`.
//!
//! This module provides [`TcpTransport`], the plain, unauthenticated,
//! unencrypted stream connection the pong server speaks.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-tcp` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), pong_net_client::PongError> {
//! use pong_net_client::{TcpTransport, Transport, TransportReader};
//!
//! let transport = TcpTransport::connect("127.0.0.1", 9090).await?;
//! let (mut reader, _writer) = transport.into_split();
//! let header = reader.read_exact(5).await?;
//! # Ok(())
//! # }
//! ```

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::PongError;
use crate::transport::Transport;
use crate::transports::stream::{StreamReader, StreamWriter};

/// A [`Transport`] backed by a single outbound TCP connection.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Open a connection to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`PongError::Connection`] carrying the underlying I/O cause if
    /// the address cannot be resolved or the connection is refused.
    pub async fn connect(host: &str, port: u16) -> Result<Self, PongError> {
        let addr = format!("{host}:{port}");
        tracing::debug!(addr = %addr, "connecting to pong server");

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| PongError::Connection {
                addr: addr.clone(),
                source,
            })?;

        // Frames are tiny and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!("could not disable Nagle's algorithm: {e}");
        }

        tracing::info!(addr = %addr, "TCP connection established");
        Ok(Self { stream })
    }

    /// Open a connection, failing with [`PongError::Timeout`] if it is not
    /// established within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PongError::Timeout`] if the deadline elapses, or any error
    /// that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(
        host: &str,
        port: u16,
        timeout: std::time::Duration,
    ) -> Result<Self, PongError> {
        tokio::time::timeout(timeout, Self::connect(host, port))
            .await
            .map_err(|_| PongError::Timeout)?
    }

    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Transport for TcpTransport {
    type Reader = StreamReader<OwnedReadHalf>;
    type Writer = StreamWriter<OwnedWriteHalf>;

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        let (read, write) = self.stream.into_split();
        (StreamReader::new(read), StreamWriter::new(write))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-tcp")]
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
    use crate::transport::{TransportReader, TransportWriter};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn tcp_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<TcpTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_refused_port() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = TcpTransport::connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, PongError::Connection { .. }));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // Non-routable TEST-NET-1 address. Hosts without a route fail fast
        // instead, which is also acceptable.
        let result = TcpTransport::connect_with_timeout(
            "192.0.2.1",
            9090,
            std::time::Duration::from_millis(50),
        )
        .await;
        assert!(matches!(
            result,
            Err(PongError::Timeout | PongError::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn frames_cross_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[2, 0, 0, 0, 1, 1]).await.unwrap();
            let mut buf = [0u8; 7];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let transport = TcpTransport::connect("127.0.0.1", port).await.unwrap();
        let (mut reader, mut writer) = transport.into_split();

        assert_eq!(reader.read_exact(5).await.unwrap(), vec![2, 0, 0, 0, 1]);
        assert_eq!(reader.read_exact(1).await.unwrap(), vec![1]);
        writer.send(&[4, 0, 0, 0, 2, 1, 1]).await.unwrap();

        assert_eq!(server.await.unwrap(), [4, 0, 0, 0, 2, 1, 1]);
        writer.close().await.unwrap();
    }
}
