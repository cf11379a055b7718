//! Integration tests for the client synchronization channel
//!
//! These tests run the real websocket transport against a scripted server
//! bound to a local port.

use client::arena::{materialize_session, Tile};
use client::dispatch::Dispatcher;
use client::game::{SessionState, StateSink};
use client::leaderboard::rank;
use client::network::{gateway, ConnectionState, GatewayConfig, GatewayHandle, WsConnector};
use futures_util::{SinkExt, StreamExt};
use shared::{
    encode_server_message, Colour, Player, Point, RegisterPayload, ServerMessage, Snake,
    TurnPayload, FOOD_COLOUR,
};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const WAIT: Duration = Duration::from_secs(5);

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(WAIT, listener.accept())
        .await
        .expect("Client never connected")
        .unwrap();
    accept_async(stream).await.expect("Websocket handshake failed")
}

async fn push(ws: &mut WebSocketStream<TcpStream>, message: &ServerMessage) {
    let text = encode_server_message(message).unwrap();
    ws.send(Message::Text(text)).await.unwrap();
}

/// Reads frames until the client goes away
async fn drain(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(frame)) = ws.next().await {
        if frame.is_close() {
            break;
        }
    }
}

async fn wait_for<T>(rx: &mut watch::Receiver<T>, predicate: impl Fn(&T) -> bool) {
    timeout(WAIT, async {
        loop {
            if predicate(&rx.borrow_and_update()) {
                return;
            }
            rx.changed().await.expect("Sender dropped");
        }
    })
    .await
    .expect("Timed out waiting for state");
}

fn register(uuid: &str) -> ServerMessage {
    ServerMessage::Register(RegisterPayload {
        field_width: 3,
        field_height: 2,
        uuid: Some(uuid.to_string()),
    })
}

fn start_client(
    url: String,
    reconnect_delay: Duration,
) -> (GatewayHandle, watch::Receiver<SessionState>) {
    let config = GatewayConfig {
        endpoint: url,
        reconnect_delay,
        connect_timeout: None,
    };
    let (sink, state_rx) = StateSink::new();
    let (handle, task) = gateway(config, WsConnector, Dispatcher::with_session_handlers(&sink));
    tokio::spawn(task.run());
    handle.start();
    (handle, state_rx)
}

/// END-TO-END SNAPSHOT TESTS
mod snapshot_tests {
    use super::*;

    /// Register, send a name, receive a broadcast, and materialize it
    #[tokio::test]
    async fn snapshot_materializes_into_grid() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            push(&mut ws, &register("p1")).await;

            let command = ws.next().await.unwrap().unwrap();

            let red = Colour::new(255, 0, 0);
            let turn = ServerMessage::Turn(TurnPayload {
                players: vec![Player::new(
                    "p1",
                    "alice",
                    Snake::new(vec![Point::new(0, 0), Point::new(1, 0)], red),
                    1,
                )],
                food: vec![Point::new(2, 1)],
            });
            push(&mut ws, &turn).await;
            drain(&mut ws).await;

            command.into_text().unwrap()
        });

        let (handle, mut state_rx) = start_client(url, Duration::from_millis(100));
        let mut status_rx = handle.subscribe_state();
        wait_for(&mut status_rx, |status| *status == ConnectionState::Open).await;
        wait_for(&mut state_rx, |state| state.is_registered()).await;

        handle.send(shared::ClientMessage::register("alice"));
        wait_for(&mut state_rx, |state| !state.players.is_empty()).await;

        let state = state_rx.borrow().clone();
        assert_eq!(state.local_player().map(|p| p.name.as_str()), Some("alice"));

        let grid = materialize_session(&state).unwrap().unwrap();
        let red = Some(Tile {
            colour: Colour::new(255, 0, 0),
            owner: Some("p1"),
        });
        let green = Some(Tile {
            colour: FOOD_COLOUR,
            owner: None,
        });
        assert_eq!(grid.rows()[0], vec![red, red, None]);
        assert_eq!(grid.rows()[1], vec![None, None, green]);

        let standings = rank(&state.players);
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].id, "p1");

        handle.shutdown();
        let command = timeout(WAIT, server).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&command).unwrap();
        assert_eq!(value, serde_json::json!({"Register": {"name": "alice"}}));
    }

    /// A malformed frame is dropped without taking the connection down
    #[tokio::test]
    async fn malformed_frame_is_isolated() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            ws.send(Message::Text("{\"Register\": 42".to_string()))
                .await
                .unwrap();
            ws.send(Message::Text("{\"Spectate\": {}}".to_string()))
                .await
                .unwrap();
            push(&mut ws, &register("after-garbage")).await;
            drain(&mut ws).await;
        });

        let (handle, mut state_rx) = start_client(url, Duration::from_millis(100));
        wait_for(&mut state_rx, |state| state.is_registered()).await;

        assert_eq!(
            state_rx.borrow().local_id.as_deref(),
            Some("after-garbage")
        );
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.shutdown();
        timeout(WAIT, server).await.unwrap().unwrap();
    }
}

/// CONNECTION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// The client reconnects after the server drops it
    #[tokio::test]
    async fn reconnects_after_server_close() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let mut first = accept(&listener).await;
            push(&mut first, &register("first")).await;
            first.close(None).await.unwrap();
            drain(&mut first).await;

            let mut second = accept(&listener).await;
            push(&mut second, &register("second")).await;
            drain(&mut second).await;
        });

        let (handle, mut state_rx) = start_client(url, Duration::from_millis(100));

        wait_for(&mut state_rx, |state| {
            state.local_id.as_deref() == Some("second")
        })
        .await;
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.shutdown();
        timeout(WAIT, server).await.unwrap().unwrap();
    }

    /// An explicit stop closes the socket and no reconnect follows
    #[tokio::test]
    async fn stop_does_not_reconnect() {
        let (listener, url) = bind().await;
        let reconnect_delay = Duration::from_millis(100);

        let (handle, _state_rx) = start_client(url, reconnect_delay);
        let mut ws = accept(&listener).await;

        let mut status_rx = handle.subscribe_state();
        wait_for(&mut status_rx, |status| *status == ConnectionState::Open).await;

        handle.stop();
        timeout(WAIT, drain(&mut ws))
            .await
            .expect("Client never closed the socket");
        wait_for(&mut status_rx, |status| *status == ConnectionState::Closed).await;

        let second = timeout(reconnect_delay * 5, listener.accept()).await;
        assert!(second.is_err(), "Client reconnected after stop");
        assert_eq!(handle.state(), ConnectionState::Closed);

        // A fresh start is still allowed
        handle.start();
        let _ws = accept(&listener).await;
        wait_for(&mut status_rx, |status| *status == ConnectionState::Open).await;

        handle.shutdown();
    }

    /// Messages sent before the connection opens are dropped, not queued
    #[tokio::test]
    async fn send_before_open_is_dropped() {
        let (listener, url) = bind().await;

        let config = GatewayConfig {
            endpoint: url,
            reconnect_delay: Duration::from_millis(100),
            connect_timeout: None,
        };
        let (handle, task) = gateway(config, WsConnector, Dispatcher::new());
        tokio::spawn(task.run());

        handle.send(shared::ClientMessage::register("too-early"));
        handle.start();

        let mut ws = accept(&listener).await;
        let mut status_rx = handle.subscribe_state();
        wait_for(&mut status_rx, |status| *status == ConnectionState::Open).await;
        handle.send(shared::ClientMessage::register("on-time"));

        let frame = timeout(WAIT, ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame.into_text().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"Register": {"name": "on-time"}}));

        handle.shutdown();
    }
}
