//! Roomcall CLI Application

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use roomcall_core::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Signaling relay host
    #[arg(long, env = "ROOMCALL_SIGNAL_HOST", default_value = "localhost")]
    signal_host: String,

    /// Signaling relay port
    #[arg(long, env = "ROOMCALL_SIGNAL_PORT", default_value_t = 9000)]
    signal_port: u16,

    /// Signaling relay mount path
    #[arg(long, env = "ROOMCALL_SIGNAL_PATH", default_value = "/myapp")]
    signal_path: String,

    /// Connect to the relay over TLS
    #[arg(long, env = "ROOMCALL_SIGNAL_SECURE")]
    signal_secure: bool,

    /// Print session snapshots as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a room and print where it lives
    Room,

    /// Resolve a path to a view
    Route {
        /// Path such as /room/<id>
        path: String,
    },

    /// Run a two-party call over an in-process relay
    Demo {
        /// Capture audio only
        #[arg(long)]
        audio_only: bool,
    },
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            signaling: SignalingConfig {
                host: self.signal_host.clone(),
                port: self.signal_port,
                path: self.signal_path.clone(),
                secure: self.signal_secure,
            },
            ..SessionConfig::default()
        }
    }
}

/// Navigator for a terminal: the "page" is stdout
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate_to(&self, path: &str) {
        println!("➡️  {path}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomcall=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.session_config();

    match cli.command {
        Commands::Room => handle_room(&config),
        Commands::Route { ref path } => handle_route(path),
        Commands::Demo { audio_only } => {
            let config = if audio_only {
                SessionConfig {
                    constraints: MediaConstraints::audio_only(),
                    ..config
                }
            } else {
                config
            };
            handle_demo(config, cli.json).await
        }
    }
}

fn handle_room(config: &SessionConfig) -> Result<()> {
    let mut router = RoomRouter::new(PrintNavigator);
    let room = router.activate();
    println!("🏠 Room {room}");
    println!("   Relay: {}", config.signaling.url());
    Ok(())
}

fn handle_route(path: &str) -> Result<()> {
    match Route::parse(path) {
        Route::Landing => println!("landing: creates a room and redirects"),
        Route::Room(room) => println!("room {room}"),
        Route::NotFound => bail!("404 Not Found: {path}"),
    }
    Ok(())
}

type DemoSession = CallSession<LoopbackSignaling, SyntheticCapture, TracingView>;

fn demo_session(relay: &LoopbackRelay, config: &SessionConfig) -> DemoSession {
    CallSession::new(
        Arc::new(relay.client(config.event_capacity)),
        Arc::new(SyntheticCapture::new()),
        Arc::new(TracingView),
        config.clone(),
    )
}

fn report(label: &str, session: &DemoSession, json: bool) -> Result<()> {
    let snap = session.snapshot();
    if json {
        println!("{}", serde_json::to_string(&serde_json::json!({ "session": label, "state": snap }))?);
    } else {
        let state = session.state();
        println!(
            "   {label}: {} (id {}, peer {})",
            snap.phase,
            short_label(state.local_identity()),
            short_label(state.remote_peer()),
        );
    }
    Ok(())
}

/// Short id shown next to a feed, `-` when there is none
fn short_label<I: PeerIdentity>(identity: Option<&I>) -> String {
    identity.map_or_else(|| "-".to_string(), I::short)
}

async fn handle_demo(config: SessionConfig, json: bool) -> Result<()> {
    println!("📞 Two-party demo over an in-process relay");
    let relay = LoopbackRelay::new();
    let mut alice = demo_session(&relay, &config);
    let mut bob = demo_session(&relay, &config);

    alice.activate().await;
    bob.activate().await;
    report("alice", &alice, json)?;
    report("bob", &bob, json)?;
    tracing::debug!(relay = ?relay, "Both sessions registered");

    let Some(target) = bob.snapshot().local_identity else {
        bail!("bob did not register");
    };
    alice.dial(&target).await?;
    report("alice", &alice, json)?;

    bob.process_pending().await;
    alice.process_pending().await;
    println!("✅ Media flowing");
    report("alice", &alice, json)?;
    report("bob", &bob, json)?;

    alice.hang_up().await;
    alice.process_pending().await;
    bob.process_pending().await;
    println!("📴 Call ended");
    report("alice", &alice, json)?;
    report("bob", &bob, json)?;

    alice.teardown().await;
    bob.teardown().await;
    report("alice", &alice, json)?;
    report("bob", &bob, json)?;
    Ok(())
}
