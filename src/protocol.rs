//! Binary frame codec for the pong wire protocol.
//!
//! Every frame is a fixed 5-byte header followed by a type-specific payload:
//!
//! ```text
//! [type: u8][length: u32 big-endian][payload: length bytes]
//! ```
//!
//! | Type | Name           | Direction        | Payload                                          |
//! |------|----------------|------------------|--------------------------------------------------|
//! | 1    | `GAME_STATE`   | server → client  | 4 × f32 BE (paddle1_y, paddle2_y, ball_x, ball_y), 2 × u8 scores |
//! | 2    | `PLAYER_JOIN`  | server → client  | u8 player id                                     |
//! | 3    | `PLAYER_MOVE`  | client → server  | u8 player id, i8 direction                       |
//! | 4    | `PLAYER_READY` | both             | u8 player id, u8 ready flag                      |
//!
//! Everything here is pure: functions take byte slices and return typed
//! values or a [`DecodeError`]. No I/O happens in this module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 5;

/// Payload size of a `GAME_STATE` frame.
pub const GAME_STATE_LEN: usize = 18;

/// Payload size of a `PLAYER_JOIN` frame.
pub const PLAYER_JOIN_LEN: usize = 1;

/// Payload size of a `PLAYER_MOVE` frame.
pub const PLAYER_MOVE_LEN: usize = 2;

/// Payload size of a `PLAYER_READY` frame.
pub const PLAYER_READY_LEN: usize = 2;

/// Player identity on the wire. `0` means "not assigned"; servers hand out `1` or `2`.
pub type PlayerId = u8;

// ── Errors ──────────────────────────────────────────────────────────

/// Reasons a byte buffer could not be decoded into a typed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer than [`HEADER_LEN`] bytes were supplied for a header.
    #[error("frame header needs {HEADER_LEN} bytes, got {actual}")]
    TruncatedHeader {
        /// Bytes actually supplied.
        actual: usize,
    },

    /// The payload is shorter than its message type requires.
    #[error("{kind:?} payload needs {expected} bytes, got {actual}")]
    TruncatedPayload {
        /// Message type being decoded.
        kind: MessageType,
        /// Minimum payload length for this type.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// The header carried a type byte outside the known set.
    #[error("unknown message type {0}")]
    UnknownType(u8),

    /// A `PLAYER_MOVE` direction byte was not -1, 0 or 1.
    #[error("invalid move direction {0}")]
    InvalidDirection(i8),
}

// ── Message type ────────────────────────────────────────────────────

/// The message type carried in byte 0 of every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Authoritative game snapshot.
    GameState = 1,
    /// Player identity assignment.
    PlayerJoin = 2,
    /// Paddle movement intent.
    PlayerMove = 3,
    /// Per-player readiness flag.
    PlayerReady = 4,
}

impl MessageType {
    /// Minimum payload length accepted for this type.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::GameState => GAME_STATE_LEN,
            Self::PlayerJoin => PLAYER_JOIN_LEN,
            Self::PlayerMove => PLAYER_MOVE_LEN,
            Self::PlayerReady => PLAYER_READY_LEN,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::GameState),
            2 => Ok(Self::PlayerJoin),
            3 => Ok(Self::PlayerMove),
            4 => Ok(Self::PlayerReady),
            other => Err(DecodeError::UnknownType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        kind as u8
    }
}

// ── Header and frame ────────────────────────────────────────────────

/// The decoded 5-byte frame header.
///
/// The type byte is kept raw so that frames of unknown type can still be
/// skipped by reading `length` payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw message type byte.
    pub kind: u8,
    /// Payload length in bytes.
    pub length: u32,
}

impl FrameHeader {
    /// Decode a header from the first [`HEADER_LEN`] bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header: &[u8; HEADER_LEN] = bytes
            .first_chunk()
            .ok_or(DecodeError::TruncatedHeader {
                actual: bytes.len(),
            })?;
        let [kind, l0, l1, l2, l3] = *header;
        Ok(Self {
            kind,
            length: u32::from_be_bytes([l0, l1, l2, l3]),
        })
    }

    /// Encode the header in network byte order.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let [l0, l1, l2, l3] = self.length.to_be_bytes();
        [self.kind, l0, l1, l2, l3]
    }

    /// Interpret the type byte.
    pub fn message_type(&self) -> Result<MessageType, DecodeError> {
        MessageType::try_from(self.kind)
    }
}

/// One complete header + payload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw message type byte.
    pub kind: u8,
    /// Payload bytes; the header length is derived from this.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame of the given type.
    pub fn new(kind: MessageType, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Header describing this frame.
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            kind: self.kind,
            // Frames built by this crate carry at most GAME_STATE_LEN bytes.
            length: u32::try_from(self.payload.len()).unwrap_or(u32::MAX),
        }
    }

    /// Encode the canonical header immediately followed by the payload,
    /// ready for a single write.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header().encode());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

// ── Payload types ───────────────────────────────────────────────────

/// Authoritative game state carried by a `GAME_STATE` frame.
///
/// Snapshots are replaced wholesale on every update; there is no partial merge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Vertical position of player 1's paddle.
    pub paddle1_y: f32,
    /// Vertical position of player 2's paddle.
    pub paddle2_y: f32,
    /// Horizontal ball position.
    pub ball_x: f32,
    /// Vertical ball position.
    pub ball_y: f32,
    /// Player 1's score.
    pub score1: u8,
    /// Player 2's score.
    pub score2: u8,
}

impl Default for GameSnapshot {
    /// Neutral layout shown before the first server update: paddles centred
    /// on an 800×600 field, ball in the middle, scores at zero.
    fn default() -> Self {
        Self {
            paddle1_y: 250.0,
            paddle2_y: 250.0,
            ball_x: 400.0,
            ball_y: 300.0,
            score1: 0,
            score2: 0,
        }
    }
}

impl GameSnapshot {
    /// Decode a `GAME_STATE` payload. Trailing bytes past [`GAME_STATE_LEN`] are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let truncated = DecodeError::TruncatedPayload {
            kind: MessageType::GameState,
            expected: GAME_STATE_LEN,
            actual: payload.len(),
        };
        let bytes: &[u8; GAME_STATE_LEN] = payload.first_chunk().ok_or(truncated)?;
        let [floats @ .., score1, score2] = *bytes;
        let mut values = [0f32; 4];
        for (value, chunk) in values.iter_mut().zip(floats.chunks_exact(4)) {
            let mut word = [0u8; 4];
            word.copy_from_slice(chunk);
            *value = f32::from_be_bytes(word);
        }
        let [paddle1_y, paddle2_y, ball_x, ball_y] = values;
        Ok(Self {
            paddle1_y,
            paddle2_y,
            ball_x,
            ball_y,
            score1,
            score2,
        })
    }

    /// Encode as a `GAME_STATE` payload.
    pub fn encode(&self) -> [u8; GAME_STATE_LEN] {
        let mut out = [0u8; GAME_STATE_LEN];
        let floats = [self.paddle1_y, self.paddle2_y, self.ball_x, self.ball_y];
        for (slot, value) in out.chunks_exact_mut(4).zip(floats) {
            slot.copy_from_slice(&value.to_be_bytes());
        }
        if let [.., s1, s2] = &mut out {
            *s1 = self.score1;
            *s2 = self.score2;
        }
        out
    }
}

/// Paddle movement intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Direction {
    /// Move towards the top of the field.
    Up = -1,
    /// Stop moving.
    Stop = 0,
    /// Move towards the bottom of the field.
    Down = 1,
}

impl Direction {
    /// Wire representation.
    pub const fn as_i8(self) -> i8 {
        self as i8
    }
}

impl TryFrom<i8> for Direction {
    type Error = DecodeError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Up),
            0 => Ok(Self::Stop),
            1 => Ok(Self::Down),
            other => Err(DecodeError::InvalidDirection(other)),
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// A decoded frame as seen by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full game snapshot.
    GameState(GameSnapshot),
    /// The server assigned this client a player identity.
    PlayerJoin {
        /// Assigned identity, normally 1 or 2.
        player_id: PlayerId,
    },
    /// A player's readiness changed.
    PlayerReady {
        /// Player the flag belongs to.
        player_id: PlayerId,
        /// `true` only when the wire byte is exactly 1.
        ready: bool,
    },
    /// A movement frame. Servers never send these to clients; it is decoded
    /// so the stream stays aligned and then ignored.
    PlayerMove {
        /// Player that moved.
        player_id: PlayerId,
        /// Raw direction byte.
        direction: i8,
    },
}

impl ServerMessage {
    /// Decode a payload according to the header's type byte.
    pub fn decode(kind: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        let kind = MessageType::try_from(kind)?;
        match kind {
            MessageType::GameState => GameSnapshot::decode(payload).map(Self::GameState),
            MessageType::PlayerJoin => {
                let [player_id] = *fixed::<PLAYER_JOIN_LEN>(kind, payload)?;
                Ok(Self::PlayerJoin { player_id })
            }
            MessageType::PlayerReady => {
                let [player_id, flag] = *fixed::<PLAYER_READY_LEN>(kind, payload)?;
                Ok(Self::PlayerReady {
                    player_id,
                    ready: flag == 1,
                })
            }
            MessageType::PlayerMove => {
                let [player_id, direction] = *fixed::<PLAYER_MOVE_LEN>(kind, payload)?;
                Ok(Self::PlayerMove {
                    player_id,
                    direction: i8::from_be_bytes([direction]),
                })
            }
        }
    }

    /// Message type of this variant.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::GameState(_) => MessageType::GameState,
            Self::PlayerJoin { .. } => MessageType::PlayerJoin,
            Self::PlayerReady { .. } => MessageType::PlayerReady,
            Self::PlayerMove { .. } => MessageType::PlayerMove,
        }
    }

    /// Encode as a complete frame. Used by server-side harnesses and tests.
    pub fn encode(&self) -> Vec<u8> {
        let payload = match self {
            Self::GameState(snapshot) => snapshot.encode().to_vec(),
            Self::PlayerJoin { player_id } => vec![*player_id],
            Self::PlayerReady { player_id, ready } => vec![*player_id, u8::from(*ready)],
            Self::PlayerMove {
                player_id,
                direction,
            } => vec![*player_id, *direction as u8],
        };
        Frame::new(self.message_type(), payload).encode()
    }
}

/// A message the client sends to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    /// Paddle movement intent.
    PlayerMove {
        /// Sender's identity.
        player_id: PlayerId,
        /// Requested direction.
        direction: Direction,
    },
    /// Readiness toggle.
    PlayerReady {
        /// Sender's identity.
        player_id: PlayerId,
        /// New readiness.
        ready: bool,
    },
}

impl ClientMessage {
    /// Message type of this variant.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::PlayerMove { .. } => MessageType::PlayerMove,
            Self::PlayerReady { .. } => MessageType::PlayerReady,
        }
    }

    /// Build the frame for this message.
    pub fn to_frame(&self) -> Frame {
        let payload = match *self {
            Self::PlayerMove {
                player_id,
                direction,
            } => vec![player_id, direction.as_i8() as u8],
            Self::PlayerReady { player_id, ready } => vec![player_id, u8::from(ready)],
        };
        Frame::new(self.message_type(), payload)
    }

    /// Encode as a complete frame: header followed by payload.
    pub fn encode(&self) -> Vec<u8> {
        self.to_frame().encode()
    }

    /// Decode a client frame. Used by server-side harnesses and tests.
    pub fn decode(kind: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        let kind = MessageType::try_from(kind)?;
        match kind {
            MessageType::PlayerMove => {
                let [player_id, direction] = *fixed::<PLAYER_MOVE_LEN>(kind, payload)?;
                Ok(Self::PlayerMove {
                    player_id,
                    direction: Direction::try_from(i8::from_be_bytes([direction]))?,
                })
            }
            MessageType::PlayerReady => {
                let [player_id, flag] = *fixed::<PLAYER_READY_LEN>(kind, payload)?;
                Ok(Self::PlayerReady {
                    player_id,
                    ready: flag == 1,
                })
            }
            other => Err(DecodeError::UnknownType(other.into())),
        }
    }
}

/// Borrow the first `N` bytes of `payload`, or report truncation for `kind`.
fn fixed<const N: usize>(kind: MessageType, payload: &[u8]) -> Result<&[u8; N], DecodeError> {
    payload.first_chunk().ok_or(DecodeError::TruncatedPayload {
        kind,
        expected: N,
        actual: payload.len(),
    })
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
    fn header_is_big_endian() {
        let header = FrameHeader {
            kind: 1,
            length: 0x0102_0304,
        };
        assert_eq!(header.encode(), [1, 1, 2, 3, 4]);
        assert_eq!(FrameHeader::decode(&[4, 0, 0, 0, 2]).unwrap().length, 2);
    }

    #[test]
    fn header_rejects_short_input() {
        let err = FrameHeader::decode(&[1, 0, 0]).unwrap_err();
        assert_eq!(err, DecodeError::TruncatedHeader { actual: 3 });
    }

    #[test]
    fn game_state_layout_matches_wire_format() {
        let snapshot = GameSnapshot {
            paddle1_y: 1.0,
            paddle2_y: -2.0,
            ball_x: 0.5,
            ball_y: 0.0,
            score1: 7,
            score2: 255,
        };
        let bytes = snapshot.encode();
        assert_eq!(&bytes[0..4], &[0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(&bytes[4..8], &[0xC0, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[0x3F, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
        assert_eq!(bytes[16], 7);
        assert_eq!(bytes[17], 255);
        assert_eq!(GameSnapshot::decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn game_state_ignores_trailing_bytes() {
        let mut bytes = GameSnapshot::default().encode().to_vec();
        bytes.extend_from_slice(&[9, 9, 9]);
        assert_eq!(GameSnapshot::decode(&bytes).unwrap(), GameSnapshot::default());
    }

    #[test]
    fn game_state_rejects_17_bytes() {
        let err = ServerMessage::decode(1, &[0u8; 17]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TruncatedPayload {
                kind: MessageType::GameState,
                expected: 18,
                actual: 17,
            }
        );
    }

    #[test]
    fn ready_flag_is_exactly_one() {
        for (flag, expected) in [(0u8, false), (1, true), (2, false), (255, false)] {
            let msg = ServerMessage::decode(4, &[2, flag]).unwrap();
            assert_eq!(
                msg,
                ServerMessage::PlayerReady {
                    player_id: 2,
                    ready: expected
                }
            );
        }
    }

    #[test]
    fn move_encodes_signed_direction() {
        let bytes = ClientMessage::PlayerMove {
            player_id: 1,
            direction: Direction::Up,
        }
        .encode();
        assert_eq!(bytes, vec![3, 0, 0, 0, 2, 1, 0xFF]);
    }

    #[test]
    fn ready_encodes_flag_byte() {
        let bytes = ClientMessage::PlayerReady {
            player_id: 2,
            ready: true,
        }
        .encode();
        assert_eq!(bytes, vec![4, 0, 0, 0, 2, 2, 1]);
    }

    #[test]
    fn unknown_type_is_reported() {
        assert_eq!(
            ServerMessage::decode(9, &[]).unwrap_err(),
            DecodeError::UnknownType(9)
        );
    }

    #[test]
    fn client_decode_rejects_bad_direction() {
        assert_eq!(
            ClientMessage::decode(3, &[1, 5]).unwrap_err(),
            DecodeError::InvalidDirection(5)
        );
    }

    #[test]
    fn server_move_is_decoded() {
        let msg = ServerMessage::decode(3, &[2, 0xFF]).unwrap();
        assert_eq!(
            msg,
            ServerMessage::PlayerMove {
                player_id: 2,
                direction: -1
            }
        );
    }
}
