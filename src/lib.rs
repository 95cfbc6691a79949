//! # Pong Net Client
//!
//! Network client core for a two-player real-time pong game.
//!
//! The crate keeps a persistent stream connection to a game server, exchanges
//! small binary frames (player identity, readiness, movement intent and
//! authoritative game state) and exposes the latest known state to whatever
//! presentation layer draws the game.
//!
//! ## Features
//!
//! - **Frame codec**: pure encode/decode of the 5-byte header protocol in [`protocol`]
//! - **Transport-agnostic**: implement [`Transport`] for any split byte stream
//! - **TCP built-in**: default `transport-tcp` feature provides [`TcpTransport`]
//! - **Race-free state**: [`StateStore`] publishes whole updates atomically
//! - **Event-driven**: receive typed [`PongEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # async fn example() {
//! use pong_net_client::{Direction, PongClient, PongClientConfig};
//!
//! let (client, _events) = PongClient::connect(PongClientConfig::from_env()).await;
//! client.toggle_ready().await.ok();
//! client.send_move(Direction::Up).await.ok();
//! let state = client.state();
//! println!("score {} - {}", state.last_snapshot.score1, state.last_snapshot.score2);
//! # }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod presentation;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{PongClient, PongClientConfig};
pub use error::PongError;
pub use event::PongEvent;
pub use presentation::{run_presentation, Intent, Presentation};
pub use protocol::{ClientMessage, Direction, GameSnapshot, ServerMessage};
pub use state::{ClientState, StateStore};
pub use transport::{Transport, TransportReader, TransportWriter};
pub use transports::{StreamReader, StreamTransport, StreamWriter};

#[cfg(feature = "transport-tcp")]
pub use transports::TcpTransport;
