//! Events emitted by the receive loop.
//!
//! Events mirror the state transitions applied to the
//! [`StateStore`](crate::state::StateStore). Consumers that only render the
//! latest state can drop the receiver and poll the store instead; an
//! undrained channel only loses events, it never stalls the receive loop.

use crate::protocol::{GameSnapshot, PlayerId};

/// A notification from the background receive loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PongEvent {
    /// The receive loop started on a connected transport.
    Connected,
    /// The server assigned this client an identity.
    PlayerAssigned {
        /// Assigned identity (1 or 2).
        player_id: PlayerId,
    },
    /// The server reported a player's readiness.
    ReadinessChanged {
        /// Player the flag belongs to.
        player_id: PlayerId,
        /// New readiness.
        ready: bool,
    },
    /// Both players are ready. Emitted at most once per session.
    GameStarted,
    /// A new authoritative snapshot was applied.
    GameState(GameSnapshot),
    /// A non-fatal problem was recorded, such as an incomplete frame.
    Diagnostic(String),
    /// The session ended. Always the last event on the channel, if delivered.
    Disconnected {
        /// Why the session ended, if known.
        reason: Option<String>,
    },
}
