//! # Loopback Example
//!
//! Runs a complete pong session without a network:
//!
//! 1. Spawn a scripted server on one end of an in-memory duplex stream
//! 2. Start a `PongClient` on the other end
//! 3. Mark ourselves ready once the server assigns an identity
//! 4. Watch the game start and a few snapshots arrive
//! 5. Observe the disconnect when the server hangs up
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback
//!
//! # Show frame-level logs:
//! RUST_LOG=pong_net_client=debug cargo run --example loopback
//! ```

use std::time::Duration;

use pong_net_client::protocol::{ClientMessage, FrameHeader, GameSnapshot, HEADER_LEN};
use pong_net_client::{
    Direction, PongClient, PongClientConfig, PongEvent, ServerMessage, StreamTransport,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Number of snapshots the scripted server sends before hanging up.
const RALLY_FRAMES: u8 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Wiring ──────────────────────────────────────────────────────
    let (client_end, server_end) = tokio::io::duplex(1024);
    let server = tokio::spawn(scripted_server(server_end));

    let (mut client, mut event_rx) =
        PongClient::start(StreamTransport::new(client_end), PongClientConfig::default());

    // ── Event loop ──────────────────────────────────────────────────
    while let Some(event) = event_rx.recv().await {
        match event {
            PongEvent::Connected => tracing::info!("connected to loopback server"),
            PongEvent::PlayerAssigned { player_id } => {
                tracing::info!("assigned player {player_id}, getting ready");
                client.toggle_ready().await?;
            }
            PongEvent::ReadinessChanged { player_id, ready } => {
                tracing::info!("player {player_id} ready={ready}");
            }
            PongEvent::GameStarted => {
                tracing::info!("game started");
                client.send_move(Direction::Up).await?;
            }
            PongEvent::GameState(snapshot) => {
                tracing::info!(
                    "ball ({:.1}, {:.1})  score {} - {}",
                    snapshot.ball_x,
                    snapshot.ball_y,
                    snapshot.score1,
                    snapshot.score2
                );
            }
            PongEvent::Diagnostic(message) => tracing::warn!("{message}"),
            PongEvent::Disconnected { reason } => {
                tracing::info!("disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                break;
            }
        }
    }

    client.shutdown().await;
    server.await??;

    let state = client.state();
    tracing::info!("final state: {}", state.to_json()?);
    Ok(())
}

/// A two-player server that plays both roles: it assigns the client slot 1,
/// readies the absent player 2 itself, and moves the ball a little.
async fn scripted_server(mut stream: DuplexStream) -> std::io::Result<()> {
    stream
        .write_all(&ServerMessage::PlayerJoin { player_id: 1 }.encode())
        .await?;

    // Wait for the client to ready up and echo it back.
    loop {
        match read_client_frame(&mut stream).await? {
            ClientMessage::PlayerReady { player_id, ready } => {
                stream
                    .write_all(&ServerMessage::PlayerReady { player_id, ready }.encode())
                    .await?;
                if ready {
                    break;
                }
            }
            ClientMessage::PlayerMove { .. } => {}
        }
    }
    stream
        .write_all(
            &ServerMessage::PlayerReady {
                player_id: 2,
                ready: true,
            }
            .encode(),
        )
        .await?;

    let mut snapshot = GameSnapshot::default();
    for tick in 0..RALLY_FRAMES {
        snapshot.ball_x += 12.0;
        snapshot.ball_y -= 4.5;
        if tick == RALLY_FRAMES - 1 {
            snapshot.score1 += 1;
        }
        stream
            .write_all(&ServerMessage::GameState(snapshot).encode())
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tracing::info!("loopback server hanging up");
    Ok(())
}

async fn read_client_frame(stream: &mut DuplexStream) -> std::io::Result<ClientMessage> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let header = FrameHeader::decode(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut payload = vec![0u8; header.length as usize];
    stream.read_exact(&mut payload).await?;
    ClientMessage::decode(header.kind, &payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
