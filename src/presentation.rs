//! Seam between the network core and whatever draws the game.
//!
//! A [`Presentation`] renders [`ClientState`] and turns user input into
//! [`Intent`]s. [`run_presentation`] drives it at the client's tick interval
//! until an [`Intent::Quit`] arrives or the client stops running.

use tracing::{debug, warn};

use crate::client::PongClient;
use crate::error::PongError;
use crate::protocol::Direction;
use crate::state::ClientState;

/// A user action, independent of how it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Move the local paddle.
    Move(Direction),
    /// Flip the local readiness flag.
    ToggleReady,
    /// Leave the session.
    Quit,
}

/// A drawing surface plus an input source.
pub trait Presentation: Send {
    /// Draw the latest state. Called once per tick.
    fn render(&mut self, state: &ClientState);

    /// Next pending intent, if any. Must not block.
    fn poll_input(&mut self) -> Option<Intent>;
}

/// Render, poll, dispatch and sleep until the client stops running.
///
/// Command errors are logged and otherwise ignored: commands issued before a
/// player identity is assigned, or after the connection dropped, are no-ops.
/// The final state is rendered once more before returning.
pub async fn run_presentation<P: Presentation + ?Sized>(client: &PongClient, presentation: &mut P) {
    let tick = client.tick_interval();
    while client.is_running() {
        presentation.render(&client.state());

        while let Some(intent) = presentation.poll_input() {
            match client.apply(intent).await {
                Ok(()) => {}
                Err(e @ (PongError::NotConnected | PongError::PlayerNotAssigned)) => {
                    debug!(?intent, "intent ignored: {e}");
                }
                Err(e) => warn!(?intent, "intent failed: {e}"),
            }
            if !client.is_running() {
                break;
            }
        }

        tokio::time::sleep(tick).await;
    }
    presentation.render(&client.state());
    debug!("presentation loop exited");
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
    use crate::client::PongClientConfig;
    use crate::protocol::ServerMessage;
    use crate::transports::StreamTransport;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct Scripted {
        intents: VecDeque<Intent>,
        frames: Vec<ClientState>,
    }

    impl Presentation for Scripted {
        fn render(&mut self, state: &ClientState) {
            self.frames.push(state.clone());
        }

        fn poll_input(&mut self) -> Option<Intent> {
            self.intents.pop_front()
        }
    }

    #[tokio::test]
    async fn quit_intent_ends_loop() {
        let (local, _remote) = tokio::io::duplex(64);
        let config = PongClientConfig::default().with_tick_interval(Duration::from_millis(1));
        let (mut client, _events) = PongClient::start(StreamTransport::new(local), config);

        let mut ui = Scripted {
            intents: VecDeque::from(vec![Intent::ToggleReady, Intent::Quit]),
            ..Scripted::default()
        };
        run_presentation(&client, &mut ui).await;

        assert!(!client.is_running());
        assert!(ui.frames.len() >= 2);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn intents_reach_the_wire() {
        let (local, mut remote) = tokio::io::duplex(256);
        let config = PongClientConfig::default().with_tick_interval(Duration::from_millis(1));
        let (mut client, mut events) = PongClient::start(StreamTransport::new(local), config);

        remote
            .write_all(&ServerMessage::PlayerJoin { player_id: 1 }.encode())
            .await
            .unwrap();
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // PlayerAssigned

        let mut ui = Scripted {
            intents: VecDeque::from(vec![
                Intent::Move(Direction::Up),
                Intent::ToggleReady,
                Intent::Quit,
            ]),
            ..Scripted::default()
        };
        run_presentation(&client, &mut ui).await;

        let mut buf = [0u8; 14];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [3, 0, 0, 0, 2, 1, 0xFF, 4, 0, 0, 0, 2, 1, 1]);
        assert!(ui.frames.last().unwrap().player1_ready);
        client.shutdown().await;
    }
}
