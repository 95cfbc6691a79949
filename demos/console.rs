//! # Console Example
//!
//! A line-oriented text client for a real pong server:
//!
//! 1. Connect over TCP to `PONG_HOST:PONG_PORT` (default `127.0.0.1:9090`)
//! 2. Read commands from stdin, one per line
//! 3. Print the state whenever it changes
//!
//! Commands: `w` up, `s` down, `x` stop, `r` toggle ready, `q` quit.
//!
//! ## Running
//!
//! ```sh
//! PONG_HOST=10.0.0.5 PONG_PORT=9090 cargo run --example console
//! ```

use pong_net_client::{
    run_presentation, ClientState, Direction, Intent, PongClient, PongClientConfig, PongEvent,
    Presentation,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Prints a one-line summary of the state each time it changes.
struct TextPresentation {
    input: mpsc::Receiver<Intent>,
    last: Option<ClientState>,
}

impl Presentation for TextPresentation {
    fn render(&mut self, state: &ClientState) {
        if self.last.as_ref() == Some(state) {
            return;
        }
        let s = &state.last_snapshot;
        tracing::info!(
            "[{}] p1 {:5.1} | p2 {:5.1} | ball ({:5.1}, {:5.1}) | {} - {} | ready {}/{}{}",
            state.diagnostic_message,
            s.paddle1_y,
            s.paddle2_y,
            s.ball_x,
            s.ball_y,
            s.score1,
            s.score2,
            state.player1_ready,
            state.player2_ready,
            if state.game_started { " | playing" } else { "" },
        );
        self.last = Some(state.clone());
    }

    fn poll_input(&mut self) -> Option<Intent> {
        self.input.try_recv().ok()
    }
}

fn parse_intent(line: &str) -> Option<Intent> {
    match line.trim() {
        "w" => Some(Intent::Move(Direction::Up)),
        "s" => Some(Intent::Move(Direction::Down)),
        "x" => Some(Intent::Move(Direction::Stop)),
        "r" => Some(Intent::ToggleReady),
        "q" => Some(Intent::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Input ───────────────────────────────────────────────────────
    let (intent_tx, intent_rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_intent(&line) {
                Some(intent) => {
                    if intent_tx.send(intent).await.is_err() {
                        break;
                    }
                }
                None => tracing::warn!("unknown command {line:?}; use w/s/x/r/q"),
            }
        }
        // EOF on stdin means quit.
        let _ = intent_tx.send(Intent::Quit).await;
    });

    // ── Connect ─────────────────────────────────────────────────────
    let config = PongClientConfig::from_env();
    tracing::info!("connecting to {}", config.addr());
    let (mut client, mut event_rx) = PongClient::connect(config).await;

    // The presentation polls the store; events only feed the log.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PongEvent::Diagnostic(message) => tracing::warn!("{message}"),
                PongEvent::GameStarted => tracing::info!("game started"),
                PongEvent::Disconnected { reason } => {
                    tracing::info!("disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                }
                _ => {}
            }
        }
    });

    // ── Main loop ───────────────────────────────────────────────────
    let mut ui = TextPresentation {
        input: intent_rx,
        last: None,
    };
    tokio::select! {
        () = run_presentation(&client, &mut ui) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down");
        }
    }

    client.shutdown().await;
    Ok(())
}
