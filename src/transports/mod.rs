//! Transport implementations for the pong wire protocol.
//!
//! | Feature         | Transport        |
//! |-----------------|------------------|
//! | `transport-tcp` | [`TcpTransport`] |
//!
//! [`StreamTransport`], [`StreamReader`] and [`StreamWriter`] work over any
//! tokio byte stream and are always available; the TCP transport is built
//! on them.
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), pong_net_client::PongError> {
//! use pong_net_client::{TcpTransport, Transport, TransportReader, TransportWriter};
//!
//! let transport = TcpTransport::connect("127.0.0.1", 9090).await?;
//! let (mut reader, mut writer) = transport.into_split();
//! writer.send(&[4, 0, 0, 0, 2, 1, 1]).await?;
//! let header = reader.read_exact(5).await?;
//! writer.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod stream;

#[cfg(feature = "transport-tcp")]
pub mod tcp;

pub use stream::{StreamReader, StreamTransport, StreamWriter};

#[cfg(feature = "transport-tcp")]
pub use tcp::TcpTransport;
