//! # Snake Client Library
//!
//! Client-side implementation of the multiplayer grid snake game. The server
//! is authoritative for all game rules; the client keeps a persistent
//! websocket connection, applies the snapshots the server pushes, turns them
//! into something drawable and relays the player's turns.
//!
//! ## Architecture Overview
//!
//! ### Synchronization Channel
//! A single [`network::Gateway`] owns the connection. It is driven by one
//! tokio task ([`network::GatewayTask`]) so every open, message, close and
//! error callback for a connection runs sequentially. When the connection
//! drops without being asked to, the gateway waits a fixed delay and tries
//! again; an explicit stop suppresses that one restart.
//!
//! ### Snapshot State
//! Inbound messages are decoded into [`shared::ServerMessage`] and offered to
//! every handler in the [`dispatch::Dispatcher`]. The built-in handlers write
//! arena size, identity, roster and food into a [`game::StateSink`]; the view
//! layer reads the latest snapshot from the matching `watch` receiver.
//!
//! ### Materialization
//! Each frame the sparse snapshot is turned into a dense tile grid
//! ([`arena::materialize`]) and a score-ordered leaderboard
//! ([`leaderboard::rank`]). Both are pure functions of the snapshot.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! - Connection state machine and reconnect timer
//! - Websocket transport over `tokio-tungstenite`
//! - Cloneable handle exposing start/stop/send/feed
//!
//! ### Dispatch Module (`dispatch`)
//! - Ordered handler registry
//! - Register and Turn handlers feeding the session state
//!
//! ### Game Module (`game`)
//! - Session snapshot (arena, identity, roster, food)
//! - Watch-channel sink for publishing it
//!
//! ### Arena and Leaderboard Modules (`arena`, `leaderboard`)
//! - Dense tile grid with overlap resolution
//! - Stable score ranking
//!
//! ### Input and Rendering Modules (`input`, `rendering`)
//! - Keyboard to turn commands
//! - macroquad drawing of grid, leaderboard and connection status
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::dispatch::Dispatcher;
//! use client::game::StateSink;
//! use client::network::{gateway, GatewayConfig, WsConnector};
//! use shared::{ClientMessage, Direction};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sink, mut state_rx) = StateSink::new();
//!     let dispatcher = Dispatcher::with_session_handlers(&sink);
//!     let config = GatewayConfig::new("ws://127.0.0.1:43210");
//!
//!     let (handle, task) = gateway(config, WsConnector, dispatcher);
//!     tokio::spawn(task.run());
//!     handle.start();
//!
//!     // Dropped unless the connection is open
//!     handle.send(ClientMessage::register("alice"));
//!     handle.send(ClientMessage::turn(Direction::Up));
//!
//!     while state_rx.changed().await.is_ok() {
//!         let state = state_rx.borrow_and_update().clone();
//!         if let Ok(Some(grid)) = client::arena::materialize_session(&state) {
//!             println!("{} tiles occupied", grid.occupied());
//!         }
//!     }
//! }
//! ```

pub mod arena;
pub mod dispatch;
pub mod game;
pub mod input;
pub mod leaderboard;
pub mod network;
pub mod rendering;
