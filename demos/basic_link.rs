//! Basic link to a Neuro SDK style command server.
//!
//! Demonstrates:
//! - Resolving the endpoint from `NEURO_SDK_WS_URL` or a launch URL
//! - Queued and immediate sends
//! - Dispatching inbound commands
//! - Watching connection events across reconnects
//!
//! Usage:
//!   NEURO_SDK_WS_URL=ws://localhost:8000 cargo run --example basic_link
//!   cargo run --example basic_link -- --launch "http://localhost:8080/?WebSocketURL=ws://localhost:8000"
//!   cargo run --example basic_link -- --debug

// ============================================================================
// Imports
// ============================================================================

use neuro_sdk_link::{ConnectionEvent, ConnectionManager, OutgoingMessage, Result};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    launch: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            launch: args
                .iter()
                .position(|a| a == "--launch")
                .and_then(|i| args.get(i + 1).cloned()),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "neuro_sdk_link=trace"
    } else {
        "neuro_sdk_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Neuro SDK link ===\n");

    let mut builder = ConnectionManager::builder()
        .game("Demo Game")
        .dispatcher(|command: &str, data: Option<Value>| {
            println!("[Inbound] {command} {}", data.unwrap_or(Value::Null));
        });
    if let Some(location) = args.launch {
        builder = builder.launch_location(location);
    }
    let manager = builder.start()?;

    // Queued: delivered once open, retried until it goes through
    manager.send(OutgoingMessage::new("startup"));
    manager.send(OutgoingMessage::with_data(
        "context",
        json!({ "message": "The demo has started.", "silent": true }),
    ));

    let mut events = manager.subscribe();
    println!("Press Ctrl+C to exit...\n");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ConnectionEvent::Connected) => {
                    println!("[Event] connected");
                    // Immediate: only worth sending right now
                    if let Err(e) = manager
                        .send_immediate(OutgoingMessage::with_data(
                            "context",
                            json!({ "message": "Link is up.", "silent": true }),
                        ))
                        .await
                    {
                        println!("[Event] immediate send failed: {e}");
                    }
                }
                Ok(ConnectionEvent::Error(message)) => println!("[Event] error: {message}"),
                Ok(ConnectionEvent::Disconnected(code)) => println!("[Event] disconnected ({code})"),
                Err(e) => println!("[Event] {e}"),
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    manager.stop();
    println!("\nStopped with {} message(s) still queued", manager.pending_count());
    Ok(())
}
