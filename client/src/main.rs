use clap::Parser;
use client::arena::materialize_session;
use client::dispatch::Dispatcher;
use client::game::{SessionState, SnapshotHistory, StateSink};
use client::input::InputManager;
use client::leaderboard::rank;
use client::network::{gateway, ConnectionState, GatewayConfig, GatewayHandle, WsConnector};
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::{ClientMessage, DEFAULT_ENDPOINT, RECONNECT_DELAY_MS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Websocket endpoint of the game server
    #[arg(short = 's', long, default_value = DEFAULT_ENDPOINT)]
    server: String,

    /// Display name to register with
    #[arg(short = 'n', long)]
    name: String,

    /// Delay before reconnecting after the connection drops
    #[arg(long, default_value_t = RECONNECT_DELAY_MS)]
    reconnect_delay_ms: u64,

    /// Abandon a connection attempt that has not opened after this long
    #[arg(long)]
    connect_timeout_ms: Option<u64>,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Snake".to_owned(),
        window_width: 1000,
        window_height: 700,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Client failed: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: arrows/WASD to turn, R to reconnect, X to disconnect, Esc to quit");

    let config = GatewayConfig {
        endpoint: args.server.clone(),
        reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
        connect_timeout: args.connect_timeout_ms.map(Duration::from_millis),
    };

    let (sink, mut state_rx) = StateSink::new();
    let (handle, task) = gateway(config, WsConnector, Dispatcher::with_session_handlers(&sink));

    // macroquad owns the main thread, so the network side gets its own runtime
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let network_thread = std::thread::spawn(move || runtime.block_on(task.run()));

    handle.start();
    render_loop(&handle, &args.name, &mut state_rx).await;

    handle.shutdown();
    if network_thread.join().is_err() {
        warn!("Network thread panicked during shutdown");
    }

    Ok(())
}

async fn render_loop(
    handle: &GatewayHandle,
    name: &str,
    state_rx: &mut tokio::sync::watch::Receiver<SessionState>,
) {
    let mut status_rx = handle.subscribe_state();
    let mut input = InputManager::new();
    let renderer = Renderer::new();
    let mut history = SnapshotHistory::new();

    loop {
        // Built once per snapshot and reused for every frame until the next
        let current = history.current();
        let grid = match materialize_session(current) {
            Ok(grid) => grid,
            Err(e) => {
                warn!("Discarding snapshot: {}", e);
                history.rollback();
                continue;
            }
        };
        let standings = rank(&current.players);

        let next = loop {
            // Every new connection gets a new identity, so register again
            if status_rx.has_changed().unwrap_or(false) {
                let status = *status_rx.borrow_and_update();
                if status == ConnectionState::Open {
                    info!("Registering as {}", name);
                    handle.send(ClientMessage::register(name));
                    input.reset();
                }
            }

            if state_rx.has_changed().unwrap_or(false) {
                break Some(state_rx.borrow_and_update().clone());
            }

            let controls = input.update();
            if controls.quit {
                break None;
            }
            if let Some(direction) = controls.turn {
                handle.send(ClientMessage::turn(direction));
            }
            if controls.reconnect {
                handle.start();
            }
            if controls.disconnect {
                handle.stop();
            }

            let status = handle.state();
            match &grid {
                Some(grid) => {
                    renderer.render(grid, &standings, current.local_id.as_deref(), status)
                }
                None => renderer.render_waiting(status),
            }

            next_frame().await;
        };

        match next {
            Some(snapshot) => history.advance(snapshot),
            None => break,
        }
    }
}
