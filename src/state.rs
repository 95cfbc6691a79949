//! Shared client state.
//!
//! [`StateStore`] is the single place the receive loop and the command side
//! write to and the presentation side reads from. It is published through a
//! [`tokio::sync::watch`] channel: every mutation runs under the channel's
//! lock and becomes visible as one unit, so a reader can never pair `ball_x`
//! from one snapshot with `ball_y` from the next.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{GameSnapshot, PlayerId};

/// Diagnostic shown before anything has happened.
const INITIAL_DIAGNOSTIC: &str = "initializing...";

/// Everything the client knows about the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    /// Assigned identity: `0` until the server sends `PLAYER_JOIN`, then 1 or 2.
    pub player_id: PlayerId,
    /// Player 1's readiness.
    pub player1_ready: bool,
    /// Player 2's readiness.
    pub player2_ready: bool,
    /// Set once both players have been ready; never cleared.
    pub game_started: bool,
    /// Whether the stream is believed to be open.
    pub connected: bool,
    /// Latest authoritative snapshot.
    pub last_snapshot: GameSnapshot,
    /// Human-readable status line for the presentation layer.
    pub diagnostic_message: String,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            player_id: 0,
            player1_ready: false,
            player2_ready: false,
            game_started: false,
            connected: false,
            last_snapshot: GameSnapshot::default(),
            diagnostic_message: INITIAL_DIAGNOSTIC.to_string(),
        }
    }
}

impl ClientState {
    /// Returns `true` once the server has assigned an identity.
    pub fn is_assigned(&self) -> bool {
        self.player_id != 0
    }

    /// Readiness of `player`, or `None` for identities other than 1 and 2.
    pub fn is_ready(&self, player: PlayerId) -> Option<bool> {
        match player {
            1 => Some(self.player1_ready),
            2 => Some(self.player2_ready),
            _ => None,
        }
    }

    /// Readiness of the local player, if assigned.
    pub fn own_ready(&self) -> Option<bool> {
        self.is_ready(self.player_id)
    }

    /// Returns `true` when both readiness flags are set.
    pub fn both_ready(&self) -> bool {
        self.player1_ready && self.player2_ready
    }

    /// Serialize to JSON for web front-ends.
    ///
    /// # Errors
    ///
    /// Returns [`PongError::Serialization`](crate::PongError::Serialization)
    /// if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn readiness_mut(&mut self, player: PlayerId) -> Option<&mut bool> {
        match player {
            1 => Some(&mut self.player1_ready),
            2 => Some(&mut self.player2_ready),
            _ => None,
        }
    }

    /// Latch `game_started` if both players are ready. Returns `true` on the
    /// false → true transition only.
    fn latch_started(&mut self) -> bool {
        if !self.game_started && self.both_ready() {
            self.game_started = true;
            return true;
        }
        false
    }
}

/// Cloneable handle to the shared [`ClientState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<ClientState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create a store holding [`ClientState::default`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ClientState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> ClientState {
        self.tx.borrow().clone()
    }

    /// Run `f` against the current state without cloning it.
    ///
    /// Writers are blocked while `f` runs, so keep it short.
    pub fn read<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// A receiver that is notified after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.tx.subscribe()
    }

    /// Record a successful connection.
    pub fn mark_connected(&self, diagnostic: impl Into<String>) {
        let diagnostic = diagnostic.into();
        self.tx.send_modify(|s| {
            s.connected = true;
            s.diagnostic_message = diagnostic;
        });
    }

    /// Record the end of the session. Terminal: nothing reconnects.
    pub fn mark_disconnected(&self, diagnostic: impl Into<String>) {
        let diagnostic = diagnostic.into();
        info!(reason = %diagnostic, "state: disconnected");
        self.tx.send_modify(|s| {
            s.connected = false;
            s.diagnostic_message = diagnostic;
        });
    }

    /// Replace the status line.
    pub fn set_diagnostic(&self, diagnostic: impl Into<String>) {
        let diagnostic = diagnostic.into();
        self.tx.send_modify(|s| s.diagnostic_message = diagnostic);
    }

    /// Store a server-assigned identity.
    ///
    /// Only 1 and 2 are accepted; anything else, including 0, is ignored so
    /// an assigned identity is never reset. A later valid assignment
    /// overwrites the earlier one. Returns whether the value was stored.
    pub fn assign_player(&self, player_id: PlayerId) -> bool {
        if !matches!(player_id, 1 | 2) {
            warn!(player_id, "ignoring invalid player assignment");
            return false;
        }
        self.tx.send_modify(|s| {
            if s.is_assigned() && s.player_id != player_id {
                warn!(
                    previous = s.player_id,
                    player_id, "server reassigned player identity"
                );
            }
            s.player_id = player_id;
            s.diagnostic_message = format!("you are player {player_id}");
        });
        debug!(player_id, "state: player assigned");
        true
    }

    /// Set a readiness flag by identity, last writer wins.
    ///
    /// Returns `None` if `player` is not 1 or 2 (nothing changes), otherwise
    /// `Some(started)` where `started` is `true` if this call latched
    /// `game_started`.
    pub fn set_ready(
        &self,
        player: PlayerId,
        ready: bool,
        diagnostic: impl Into<String>,
    ) -> Option<bool> {
        let diagnostic = diagnostic.into();
        let mut outcome = None;
        self.tx.send_if_modified(|s| {
            let Some(flag) = s.readiness_mut(player) else {
                return false;
            };
            *flag = ready;
            s.diagnostic_message = diagnostic;
            outcome = Some(s.latch_started());
            true
        });
        match outcome {
            Some(started) => {
                debug!(player, ready, "state: readiness changed");
                if started {
                    info!("state: game started");
                }
            }
            None => debug!(player, "ignoring readiness for unknown player"),
        }
        outcome
    }

    /// Set a readiness flag ahead of server confirmation without latching
    /// `game_started`. Returns the previous flag, or `None` if `player` is
    /// not 1 or 2.
    ///
    /// Pair with [`commit_ready`](Self::commit_ready) once the frame is out,
    /// or [`revert_ready`](Self::revert_ready) if it could not be sent.
    pub fn stage_ready(
        &self,
        player: PlayerId,
        ready: bool,
        diagnostic: impl Into<String>,
    ) -> Option<bool> {
        let diagnostic = diagnostic.into();
        let mut previous = None;
        self.tx.send_if_modified(|s| {
            let Some(flag) = s.readiness_mut(player) else {
                return false;
            };
            previous = Some(std::mem::replace(flag, ready));
            s.diagnostic_message = diagnostic;
            true
        });
        previous
    }

    /// Latch `game_started` after a staged readiness change went out.
    /// Returns `true` if this call latched it.
    pub fn commit_ready(&self) -> bool {
        let mut started = false;
        self.tx.send_if_modified(|s| {
            started = s.latch_started();
            started
        });
        if started {
            info!("state: game started");
        }
        started
    }

    /// Undo a staged readiness change, unless something else (a server
    /// echo) has written the flag since. Returns whether the flag was restored.
    pub fn revert_ready(&self, player: PlayerId, staged: bool, previous: bool) -> bool {
        self.tx.send_if_modified(|s| match s.readiness_mut(player) {
            Some(flag) if *flag == staged && staged != previous => {
                *flag = previous;
                true
            }
            _ => false,
        })
    }

    /// Replace the snapshot wholesale. Returns `true` if this call latched
    /// `game_started`.
    pub fn apply_snapshot(&self, snapshot: GameSnapshot) -> bool {
        let mut started = false;
        self.tx.send_modify(|s| {
            s.last_snapshot = snapshot;
            started = s.latch_started();
        });
        if started {
            info!("state: game started");
        }
        started
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

    #[test]
    fn defaults_are_neutral() {
        let state = ClientState::default();
        assert_eq!(state.player_id, 0);
        assert!(!state.connected);
        assert!(!state.game_started);
        assert_eq!(state.last_snapshot, GameSnapshot::default());
        assert_eq!(state.own_ready(), None);
    }

    #[test]
    fn invalid_assignments_are_ignored() {
        let store = StateStore::new();
        assert!(store.assign_player(1));
        assert!(!store.assign_player(0));
        assert!(!store.assign_player(3));
        assert_eq!(store.snapshot().player_id, 1);
        assert_eq!(store.snapshot().diagnostic_message, "you are player 1");
    }

    #[test]
    fn later_join_overwrites() {
        let store = StateStore::new();
        store.assign_player(1);
        store.assign_player(2);
        assert_eq!(store.snapshot().player_id, 2);
    }

    #[test]
    fn started_latches_on_second_ready() {
        let store = StateStore::new();
        assert_eq!(store.set_ready(1, true, "p1"), Some(false));
        assert!(!store.snapshot().game_started);
        assert_eq!(store.set_ready(2, true, "p2"), Some(true));
        assert!(store.snapshot().game_started);
    }

    #[test]
    fn started_never_resets() {
        let store = StateStore::new();
        store.set_ready(1, true, "");
        store.set_ready(2, true, "");
        store.set_ready(1, false, "");
        store.set_ready(2, false, "");
        store.apply_snapshot(GameSnapshot::default());
        let state = store.snapshot();
        assert!(state.game_started);
        assert!(!state.player1_ready);
    }

    #[test]
    fn staged_ready_latches_only_on_commit() {
        let store = StateStore::new();
        store.set_ready(2, true, "");
        assert_eq!(store.stage_ready(1, true, "you are ready"), Some(false));
        let state = store.snapshot();
        assert!(state.player1_ready);
        assert!(!state.game_started);
        assert!(store.commit_ready());
        assert!(store.snapshot().game_started);
    }

    #[test]
    fn revert_restores_untouched_flag() {
        let store = StateStore::new();
        let previous = store.stage_ready(1, true, "").unwrap();
        assert!(store.revert_ready(1, true, previous));
        assert!(!store.snapshot().player1_ready);
    }

    #[test]
    fn revert_keeps_a_later_write() {
        let store = StateStore::new();
        store.set_ready(1, true, "");
        let previous = store.stage_ready(1, false, "").unwrap();
        // An echo lands before the revert and disagrees with the staged value.
        store.set_ready(1, true, "player 1 is ready");
        assert!(!store.revert_ready(1, false, previous));
        assert!(store.snapshot().player1_ready);
    }

    #[test]
    fn unknown_player_ready_changes_nothing() {
        let store = StateStore::new();
        let before = store.snapshot();
        assert_eq!(store.set_ready(7, true, "ignored"), None);
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn snapshot_latches_when_both_ready() {
        let store = StateStore::new();
        let snapshot = GameSnapshot {
            ball_x: 1.0,
            ..GameSnapshot::default()
        };
        assert!(!store.apply_snapshot(snapshot));
        assert_eq!(store.snapshot().last_snapshot, snapshot);
    }

    #[tokio::test]
    async fn subscribers_see_whole_updates() {
        let store = StateStore::new();
        let mut rx = store.subscribe();
        let snapshot = GameSnapshot {
            paddle1_y: 1.0,
            paddle2_y: 2.0,
            ball_x: 3.0,
            ball_y: 4.0,
            score1: 5,
            score2: 6,
        };
        store.apply_snapshot(snapshot);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().last_snapshot, snapshot);
    }

    #[test]
    fn state_serializes_to_json() {
        let store = StateStore::new();
        store.assign_player(2);
        let json = store.snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["player_id"], 2);
        assert_eq!(value["last_snapshot"]["ball_x"], 400.0);
    }
}
