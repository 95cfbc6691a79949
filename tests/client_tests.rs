#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for `PongClient` against an in-process fake server.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use pong_net_client::protocol::{ClientMessage, FrameHeader, GameSnapshot, ServerMessage};
use pong_net_client::{Direction, PongClient, PongClientConfig, PongError, PongEvent};

// ── End-to-end scenarios ────────────────────────────────────────────

#[tokio::test]
async fn join_assigns_player_one() {
    let (mut client, mut events, mut server) = connect_pair();
    assert_eq!(next_event(&mut events).await, PongEvent::Connected);

    server.send(join(1)).await;
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::PlayerAssigned { player_id: 1 }
    );

    let state = client.state();
    assert_eq!(state.player_id, 1);
    assert_eq!(state.diagnostic_message, "you are player 1");
    client.shutdown().await;
}

#[tokio::test]
async fn game_starts_only_after_both_ready() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    server.send(ready(1, true)).await;
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::ReadinessChanged {
            player_id: 1,
            ready: true
        }
    );
    let state = client.state();
    assert!(state.player1_ready);
    assert!(!state.game_started, "one ready player must not start the game");
    assert_eq!(state.diagnostic_message, "player 1 is ready");

    server.send(ready(2, true)).await;
    let _ = next_event(&mut events).await; // ReadinessChanged 2
    assert_eq!(next_event(&mut events).await, PongEvent::GameStarted);
    assert!(client.state().game_started);
    client.shutdown().await;
}

#[tokio::test]
async fn game_state_decodes_exactly() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    let expected = GameSnapshot {
        paddle1_y: 12.5,
        paddle2_y: 300.0,
        ball_x: 400.0,
        ball_y: 300.0,
        score1: 3,
        score2: 1,
    };
    server.send(ServerMessage::GameState(expected)).await;

    assert_eq!(
        next_event(&mut events).await,
        PongEvent::GameState(expected)
    );
    assert_eq!(client.state().last_snapshot, expected);
    client.shutdown().await;
}

#[tokio::test]
async fn peer_close_disconnects_and_ends_loop() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    server.send(join(2)).await;
    let _ = next_event(&mut events).await; // PlayerAssigned

    server.hang_up();

    assert_eq!(
        next_event(&mut events).await,
        PongEvent::Disconnected {
            reason: Some("connection closed by server".into())
        }
    );
    let state = client.state();
    assert!(!state.connected);
    assert_eq!(state.diagnostic_message, "connection closed by server");
    // Disconnected is the last event.
    assert!(events.recv().await.is_none());
    client.shutdown().await;
}

// ── Protocol edge cases ─────────────────────────────────────────────

#[tokio::test]
async fn short_payload_is_skipped_without_losing_alignment() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    let before = client.state();

    // GAME_STATE declaring a 4-byte payload: too short for a snapshot.
    let header = FrameHeader {
        kind: 1,
        length: 4,
    };
    server.write_raw(&header.encode()).await;
    server.write_raw(&[0xDE, 0xAD, 0xBE, 0xEF]).await;
    server.send(join(1)).await;

    assert_eq!(
        next_event(&mut events).await,
        PongEvent::PlayerAssigned { player_id: 1 }
    );
    let state = client.state();
    assert_eq!(state.last_snapshot, before.last_snapshot);
    assert!(state.connected);
    client.shutdown().await;
}

#[tokio::test]
async fn trailing_game_state_bytes_are_consumed() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    let snap = snapshot(4, 2);
    let mut payload = snap.encode().to_vec();
    payload.extend_from_slice(&[0xAA, 0xBB]);
    let header = FrameHeader {
        kind: 1,
        length: payload.len() as u32,
    };
    server.write_raw(&header.encode()).await;
    server.write_raw(&payload).await;
    server.send(join(2)).await;

    assert_eq!(next_event(&mut events).await, PongEvent::GameState(snap));
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::PlayerAssigned { player_id: 2 }
    );
    client.shutdown().await;
}

#[tokio::test]
async fn frame_split_across_writes_is_reassembled() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    let bytes = ServerMessage::GameState(snapshot(9, 8)).encode();
    let (first, rest) = bytes.split_at(3);
    server.write_raw(first).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.write_raw(rest).await;

    assert_eq!(
        next_event(&mut events).await,
        PongEvent::GameState(snapshot(9, 8))
    );
    client.shutdown().await;
}

#[tokio::test]
async fn unknown_type_is_skipped() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    server.write_raw(&[0x2A, 0, 0, 0, 2, 0x01, 0x02]).await;
    server.send(join(1)).await;

    assert_eq!(
        next_event(&mut events).await,
        PongEvent::PlayerAssigned { player_id: 1 }
    );
    client.shutdown().await;
}

#[tokio::test]
async fn invalid_join_is_ignored() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    server.send(join(1)).await;
    let _ = next_event(&mut events).await; // PlayerAssigned
    server.send(join(0)).await;
    server.send(join(5)).await;
    server.send(ready(2, true)).await;

    // Only the readiness event follows; invalid joins emit nothing.
    assert!(matches!(
        next_event(&mut events).await,
        PongEvent::ReadinessChanged { player_id: 2, .. }
    ));
    assert_eq!(client.player_id(), Some(1));
    client.shutdown().await;
}

#[tokio::test]
async fn ready_flag_other_than_one_is_not_ready() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    server.write_raw(&[4, 0, 0, 0, 2, 1, 2]).await;
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::ReadinessChanged {
            player_id: 1,
            ready: false
        }
    );
    assert_eq!(client.state().diagnostic_message, "player 1 is not ready");
    client.shutdown().await;
}

#[tokio::test]
async fn oversized_length_ends_session() {
    let config = test_config().with_max_payload_len(1024);
    let (mut client, mut events, mut server) = connect_pair_with(config);
    let _ = next_event(&mut events).await; // Connected

    server.write_raw(&[1, 0, 1, 0, 0]).await;
    match next_event(&mut events).await {
        PongEvent::Disconnected { reason } => {
            assert!(reason.unwrap().starts_with("receive error"));
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert!(!client.is_connected());
    client.shutdown().await;
}

#[tokio::test]
async fn truncated_payload_at_eof_records_diagnostic() {
    let mut bytes = ServerMessage::GameState(snapshot(1, 1)).encode();
    bytes.truncate(10);
    let (transport, _sent, _closed) = MockTransport::new(bytes, true, false);
    let (mut client, mut events) = PongClient::start(transport, test_config());

    let _ = next_event(&mut events).await; // Connected
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::Diagnostic("incomplete message received".into())
    );
    assert!(matches!(
        next_event(&mut events).await,
        PongEvent::Disconnected { .. }
    ));
    assert_eq!(client.state().last_snapshot, GameSnapshot::default());
    client.shutdown().await;
}

// ── Game start latch ────────────────────────────────────────────────

#[tokio::test]
async fn game_started_is_monotonic() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    server.send(ready(1, true)).await;
    server.send(ready(2, true)).await;
    wait_for(&mut events, |e| *e == PongEvent::GameStarted).await;

    server.send(ready(1, false)).await;
    server.send(ready(2, false)).await;
    server.send(ServerMessage::GameState(snapshot(0, 0))).await;
    wait_for(&mut events, |e| matches!(e, PongEvent::GameState(_))).await;

    let state = client.state();
    assert!(state.game_started);
    assert!(!state.player1_ready && !state.player2_ready);
    client.shutdown().await;
}

#[tokio::test]
async fn game_state_after_ready_does_not_restart() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    server.send(ready(1, true)).await;
    server.send(ready(2, true)).await;
    server.send(ServerMessage::GameState(snapshot(0, 0))).await;
    server.send(ServerMessage::GameState(snapshot(1, 0))).await;

    let mut started = 0;
    loop {
        match next_event(&mut events).await {
            PongEvent::GameStarted => started += 1,
            PongEvent::GameState(s) if s.score1 == 1 => break,
            _ => {}
        }
    }
    assert_eq!(started, 1);
    client.shutdown().await;
}

// ── Command dispatcher ──────────────────────────────────────────────

#[tokio::test]
async fn commands_before_join_send_nothing() {
    let (transport, sent, _closed) = MockTransport::new(Vec::new(), false, false);
    let (mut client, mut events) = PongClient::start(transport, test_config());
    let _ = next_event(&mut events).await; // Connected
    let before = client.state();

    assert!(matches!(
        client.send_move(Direction::Up).await,
        Err(PongError::PlayerNotAssigned)
    ));
    assert!(matches!(
        client.send_ready(true).await,
        Err(PongError::PlayerNotAssigned)
    ));
    assert!(matches!(
        client.toggle_ready().await,
        Err(PongError::PlayerNotAssigned)
    ));

    assert!(sent.lock().unwrap().is_empty());
    assert_eq!(client.state(), before);
    client.shutdown().await;
}

#[tokio::test]
async fn commands_after_disconnect_send_nothing() {
    let bytes = join(1).encode();
    let (transport, sent, _closed) = MockTransport::new(bytes, true, false);
    let (mut client, mut events) = PongClient::start(transport, test_config());
    wait_for(&mut events, |e| matches!(e, PongEvent::Disconnected { .. })).await;
    let before = client.state();
    assert_eq!(before.player_id, 1);

    assert!(matches!(
        client.send_move(Direction::Down).await,
        Err(PongError::NotConnected)
    ));
    assert!(matches!(
        client.send_ready(true).await,
        Err(PongError::NotConnected)
    ));

    assert!(sent.lock().unwrap().is_empty());
    assert_eq!(client.state(), before);
    client.shutdown().await;
}

#[tokio::test]
async fn move_frames_reach_server() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    server.send(join(2)).await;
    let _ = next_event(&mut events).await; // PlayerAssigned

    for direction in [Direction::Up, Direction::Stop, Direction::Down] {
        client.send_move(direction).await.unwrap();
        assert_eq!(
            server.recv().await,
            ClientMessage::PlayerMove {
                player_id: 2,
                direction
            }
        );
    }
    client.shutdown().await;
}

#[tokio::test]
async fn ready_is_applied_before_server_echo() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    server.send(join(1)).await;
    let _ = next_event(&mut events).await; // PlayerAssigned

    client.send_ready(true).await.unwrap();
    let state = client.state();
    assert!(state.player1_ready);
    assert_eq!(state.diagnostic_message, "you are ready");

    assert_eq!(
        server.recv().await,
        ClientMessage::PlayerReady {
            player_id: 1,
            ready: true
        }
    );

    // The server is authoritative and may disagree.
    server.send(ready(1, false)).await;
    wait_for(&mut events, |e| {
        matches!(e, PongEvent::ReadinessChanged { player_id: 1, .. })
    })
    .await;
    assert!(!client.state().player1_ready);
    client.shutdown().await;
}

#[tokio::test]
async fn toggle_ready_round_trip() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    server.send(join(2)).await;
    let _ = next_event(&mut events).await; // PlayerAssigned

    client.toggle_ready().await.unwrap();
    client.toggle_ready().await.unwrap();

    assert_eq!(
        server.recv().await,
        ClientMessage::PlayerReady {
            player_id: 2,
            ready: true
        }
    );
    assert_eq!(
        server.recv().await,
        ClientMessage::PlayerReady {
            player_id: 2,
            ready: false
        }
    );
    assert!(!client.state().player2_ready);
    client.shutdown().await;
}

#[tokio::test]
async fn send_failure_does_not_disconnect() {
    let (transport, _sent, _closed) = MockTransport::new(join(1).encode(), false, true);
    let (mut client, mut events) = PongClient::start(transport, test_config());
    wait_for(&mut events, |e| {
        matches!(e, PongEvent::PlayerAssigned { .. })
    })
    .await;

    let err = client.send_move(Direction::Up).await.unwrap_err();
    assert!(matches!(err, PongError::Send(_)));
    let state = client.state();
    assert!(state.connected);
    assert!(state.diagnostic_message.starts_with("move send error: "));
    client.shutdown().await;
}

#[tokio::test]
async fn sends_while_receive_is_pending() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    server.send(join(1)).await;
    let _ = next_event(&mut events).await; // PlayerAssigned

    // The receive loop is parked in a header read; sends must still go out
    // and the loop must still see the next frame afterwards.
    for _ in 0..10 {
        client.send_move(Direction::Down).await.unwrap();
    }
    for _ in 0..10 {
        assert!(matches!(
            server.recv().await,
            ClientMessage::PlayerMove { .. }
        ));
    }
    server.send(ServerMessage::GameState(snapshot(2, 3))).await;
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::GameState(snapshot(2, 3))
    );
    client.shutdown().await;
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_closes_writer() {
    let (transport, _sent, closed) = MockTransport::new(Vec::new(), false, false);
    let config = PongClientConfig::default().with_shutdown_timeout(Duration::from_millis(50));
    let (mut client, mut events) = PongClient::start(transport, config);
    let _ = next_event(&mut events).await; // Connected

    client.shutdown().await;
    assert!(closed.load(Ordering::Relaxed));
    assert!(!client.is_running());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn shutdown_with_real_stream_ends_loop() {
    let (mut client, mut events, _server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected

    client.shutdown().await;
    assert!(!client.is_connected());
    assert_eq!(client.state().diagnostic_message, "client shut down");
}

#[tokio::test]
async fn subscribers_observe_changes() {
    let (mut client, mut events, mut server) = connect_pair();
    let _ = next_event(&mut events).await; // Connected
    let mut rx = client.subscribe();

    server.send(join(2)).await;
    tokio::time::timeout(EVENT_TIMEOUT, rx.wait_for(|s| s.player_id == 2))
        .await
        .unwrap()
        .unwrap();
    client.shutdown().await;
}

#[tokio::test]
async fn full_event_channel_drops_but_state_keeps_up() {
    let config = test_config().with_event_channel_capacity(1);
    let (mut client, mut events, mut server) = connect_pair_with(config);

    // Connected fills the channel; everything after it is dropped.
    for score in 0..5 {
        server.send(ServerMessage::GameState(snapshot(score, 0))).await;
    }
    let mut rx = client.subscribe();
    tokio::time::timeout(EVENT_TIMEOUT, rx.wait_for(|s| s.last_snapshot.score1 == 4))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(next_event(&mut events).await, PongEvent::Connected);
    client.shutdown().await;
}

#[tokio::test]
async fn loop_exits_after_peer_close_with_undrained_channel() {
    // A long shutdown timeout, so a parked loop would show up as a slow shutdown.
    let config = test_config()
        .with_event_channel_capacity(1)
        .with_shutdown_timeout(Duration::from_secs(5));
    let (mut client, mut events, mut server) = connect_pair_with(config);

    for score in 0..3 {
        server.send(ServerMessage::GameState(snapshot(score, 0))).await;
    }
    server.hang_up();

    let mut rx = client.subscribe();
    tokio::time::timeout(EVENT_TIMEOUT, rx.wait_for(|s| !s.connected))
        .await
        .unwrap()
        .unwrap();

    let started = std::time::Instant::now();
    client.shutdown().await;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "receive loop stayed parked on the full channel"
    );

    // Disconnected was dropped; the loop still released its sender.
    assert_eq!(next_event(&mut events).await, PongEvent::Connected);
    assert!(events.recv().await.is_none());
}

#[cfg(feature = "transport-tcp")]
#[tokio::test]
async fn connect_failure_yields_offline_client() {
    // Bind then drop to find a port with nothing listening.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = PongClientConfig::new("127.0.0.1", port);
    let (client, mut events) = PongClient::connect(config).await;

    match next_event(&mut events).await {
        PongEvent::Disconnected { reason } => {
            assert!(reason.unwrap().starts_with("connection error: "));
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
    let state = client.state();
    assert!(!state.connected);
    assert!(state.diagnostic_message.starts_with("connection error: "));
    assert!(matches!(
        client.send_move(Direction::Up).await,
        Err(PongError::NotConnected)
    ));
}

#[cfg(feature = "transport-tcp")]
#[tokio::test]
async fn connect_over_tcp() {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(&join(1).encode()).await.unwrap();
        socket
    });

    let config = PongClientConfig::new("127.0.0.1", port)
        .with_shutdown_timeout(Duration::from_millis(100));
    let (mut client, mut events) = PongClient::connect(config).await;
    assert_eq!(next_event(&mut events).await, PongEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        PongEvent::PlayerAssigned { player_id: 1 }
    );
    assert_eq!(client.state().diagnostic_message, "you are player 1");
    let _socket = server.await.unwrap();
    client.shutdown().await;
}
