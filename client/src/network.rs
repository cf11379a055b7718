//! Connection manager for the game server channel
//!
//! [`Gateway`] is the connection state machine. It owns at most one
//! transport at a time and moves through `Idle -> Connecting -> Open ->
//! Closed`, returning to `Connecting` from `Closed` when the reconnect timer
//! fires. [`GatewayTask`] drives it from a single tokio task, so callbacks for
//! one connection never overlap, and [`GatewayHandle`] is the cloneable
//! front the rest of the application talks to.
//!
//! Delivery is best effort: [`GatewayHandle::send`] drops messages while the
//! connection is not open.

use crate::dispatch::{Dispatcher, Handler};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{decode_server_message, encode_client_message, ClientMessage, CodecError};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub endpoint: String,
    /// Delay between an unrequested close and the next attempt
    pub reconnect_delay: Duration,
    /// Give up on an attempt still connecting after this long. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl GatewayConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: shared::DEFAULT_ENDPOINT.to_string(),
            reconnect_delay: Duration::from_millis(shared::RECONNECT_DELAY_MS),
            connect_timeout: None,
        }
    }
}

#[derive(Debug)]
pub enum GatewayError {
    /// An inbound frame could not be decoded; the connection stays up
    Codec(CodecError),
    /// The transport failed; the current connection is finished
    Transport(String),
    /// The attempt did not open within the configured timeout
    ConnectTimeout(Duration),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Codec(e) => write!(f, "dropped inbound message: {}", e),
            GatewayError::Transport(reason) => write!(f, "transport error: {}", reason),
            GatewayError::ConnectTimeout(after) => {
                write!(f, "connection attempt timed out after {:?}", after)
            }
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for GatewayError {
    fn from(e: CodecError) -> Self {
        GatewayError::Codec(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// A transport event tagged with the generation of the transport that
/// produced it. Events from a superseded transport are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportNotice {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Live connection owned by the gateway. Implementations report `Opened`,
/// `Message`, `Error` and finally `Closed` through the event channel they
/// were opened with; `Closed` must follow `close()`.
pub trait Transport: Send {
    fn send(&mut self, text: String);
    fn close(&mut self);
}

pub trait Connector: Send {
    type Transport: Transport;

    fn open(
        &mut self,
        endpoint: &str,
        generation: u64,
        events: mpsc::UnboundedSender<TransportNotice>,
    ) -> Self::Transport;
}

pub struct Gateway<C: Connector> {
    config: GatewayConfig,
    connector: C,
    transport: Option<C::Transport>,
    generation: u64,
    state: ConnectionState,
    // Set by stop(), consumed by the next close
    suppress_restart: bool,
    reconnect_at: Option<Instant>,
    connect_deadline: Option<Instant>,
    dispatcher: Dispatcher,
    events_tx: mpsc::UnboundedSender<TransportNotice>,
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: Connector> Gateway<C> {
    pub fn new(
        config: GatewayConfig,
        connector: C,
        dispatcher: Dispatcher,
    ) -> (Self, mpsc::UnboundedReceiver<TransportNotice>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        let gateway = Self {
            config,
            connector,
            transport: None,
            generation: 0,
            state: ConnectionState::Idle,
            suppress_restart: false,
            reconnect_at: None,
            connect_deadline: None,
            dispatcher,
            events_tx,
            state_tx,
        };
        (gateway, events_rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Earliest instant at which [`Gateway::poll_timers`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.reconnect_at, self.connect_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Opens a transport unless one is already connecting or open.
    /// Returns whether an attempt was started.
    pub fn start(&mut self, now: Instant) -> bool {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            debug!("Gateway already {:?}, ignoring start", self.state);
            return false;
        }

        self.reconnect_at = None;
        self.generation += 1;
        info!(
            "Connecting to {} (attempt {})",
            self.config.endpoint, self.generation
        );

        let transport = self.connector.open(
            &self.config.endpoint,
            self.generation,
            self.events_tx.clone(),
        );
        self.transport = Some(transport);
        self.connect_deadline = self.config.connect_timeout.map(|timeout| now + timeout);
        self.set_state(ConnectionState::Connecting);
        true
    }

    /// Closes the live transport without scheduling a reconnect, or cancels
    /// a pending reconnect. Returns whether anything was stopped.
    pub fn stop(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                info!("Stopping gateway");
                self.suppress_restart = true;
                if let Some(transport) = self.transport.as_mut() {
                    transport.close();
                }
                true
            }
            ConnectionState::Closed if self.reconnect_at.is_some() => {
                info!("Cancelling pending reconnect");
                self.reconnect_at = None;
                true
            }
            _ => {
                debug!("Gateway not started, ignoring stop");
                false
            }
        }
    }

    /// Sends `message` if the connection is open; otherwise drops it.
    /// Returns whether the message was handed to the transport.
    pub fn send(&mut self, message: &ClientMessage) -> bool {
        if self.state != ConnectionState::Open {
            debug!("Not connected, dropping {:?}", message);
            return false;
        }

        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        match encode_client_message(message) {
            Ok(text) => {
                transport.send(text);
                true
            }
            Err(e) => {
                error!("Failed to encode {:?}: {}", message, e);
                false
            }
        }
    }

    /// Registers a handler; it sees messages received from now on.
    pub fn feed(&mut self, handler: Box<dyn Handler>) {
        self.dispatcher.feed_boxed(handler);
    }

    pub fn handle_notice(
        &mut self,
        notice: TransportNotice,
        now: Instant,
    ) -> Result<(), GatewayError> {
        if notice.generation != self.generation {
            debug!(
                "Ignoring {:?} from stale transport {}",
                notice.event, notice.generation
            );
            return Ok(());
        }

        match notice.event {
            TransportEvent::Opened => {
                self.on_open();
                Ok(())
            }
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Closed => {
                self.on_close(now);
                Ok(())
            }
            TransportEvent::Error(reason) => Err(self.on_error(GatewayError::Transport(reason))),
        }
    }

    /// Fires due timers: the reconnect attempt and the connect timeout.
    pub fn poll_timers(&mut self, now: Instant) -> Result<(), GatewayError> {
        if let Some(deadline) = self.connect_deadline {
            if deadline <= now && self.state == ConnectionState::Connecting {
                self.connect_deadline = None;
                let timeout = self.config.connect_timeout.unwrap_or_default();
                return Err(self.on_error(GatewayError::ConnectTimeout(timeout)));
            }
        }

        if let Some(at) = self.reconnect_at {
            if at <= now {
                info!("Reconnecting");
                self.start(now);
            }
        }

        Ok(())
    }

    /// Closes everything for good; used when the owning task exits.
    pub fn shutdown(&mut self) {
        self.reconnect_at = None;
        self.stop();
    }

    fn on_open(&mut self) {
        self.connect_deadline = None;
        self.set_state(ConnectionState::Open);
        info!("Gateway ready");
    }

    fn on_message(&mut self, text: &str) -> Result<(), GatewayError> {
        let message = decode_server_message(text)?;
        self.dispatcher.dispatch(&message);
        Ok(())
    }

    fn on_close(&mut self, now: Instant) {
        self.transport = None;
        self.connect_deadline = None;
        self.set_state(ConnectionState::Closed);

        if self.suppress_restart {
            self.suppress_restart = false;
            info!("Gateway closed on request");
            return;
        }

        if self.reconnect_at.is_none() {
            info!(
                "Gateway closed, reconnecting in {:?}",
                self.config.reconnect_delay
            );
            self.reconnect_at = Some(now + self.config.reconnect_delay);
        }
    }

    /// Ends the current attempt. Recovery happens through the close that
    /// the transport reports afterwards.
    fn on_error(&mut self, error: GatewayError) -> GatewayError {
        warn!("Connection attempt {} failed: {}", self.generation, error);
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
        error
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

enum Command {
    Start,
    Stop,
    Send(ClientMessage),
    Feed(Box<dyn Handler>),
    Shutdown,
}

/// Cloneable front for a running [`GatewayTask`]. Every clone addresses the
/// same gateway, so the application can hand it out freely without ever
/// creating a second connection.
#[derive(Clone)]
pub struct GatewayHandle {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl GatewayHandle {
    pub fn start(&self) {
        self.command(Command::Start);
    }

    pub fn stop(&self) {
        self.command(Command::Stop);
    }

    pub fn send(&self, message: ClientMessage) {
        self.command(Command::Send(message));
    }

    pub fn feed<H>(&self, handler: H)
    where
        H: Handler + 'static,
    {
        self.command(Command::Feed(Box::new(handler)));
    }

    /// Stops the gateway and ends its task.
    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Gateway task has exited, command dropped");
        }
    }
}

/// Event loop owning a [`Gateway`]. Run it with [`GatewayTask::run`].
pub struct GatewayTask<C: Connector> {
    gateway: Gateway<C>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<TransportNotice>,
}

/// Builds the gateway for `config` and returns its handle and task.
pub fn gateway<C: Connector>(
    config: GatewayConfig,
    connector: C,
    dispatcher: Dispatcher,
) -> (GatewayHandle, GatewayTask<C>) {
    let (gateway, events) = Gateway::new(config, connector, dispatcher);
    let (commands_tx, commands) = mpsc::unbounded_channel();

    let handle = GatewayHandle {
        commands: commands_tx,
        state_rx: gateway.subscribe_state(),
    };
    let task = GatewayTask {
        gateway,
        commands,
        events,
    };
    (handle, task)
}

impl<C: Connector> GatewayTask<C> {
    /// Processes commands, transport events and timers until shut down or
    /// until every handle is dropped.
    pub async fn run(mut self) {
        loop {
            let deadline = self.gateway.next_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Start) => {
                        self.gateway.start(Instant::now());
                    }
                    Some(Command::Stop) => {
                        self.gateway.stop();
                    }
                    Some(Command::Send(message)) => {
                        self.gateway.send(&message);
                    }
                    Some(Command::Feed(handler)) => self.gateway.feed(handler),
                    Some(Command::Shutdown) | None => {
                        self.gateway.shutdown();
                        break;
                    }
                },

                Some(notice) = self.events.recv() => {
                    match self.gateway.handle_notice(notice, Instant::now()) {
                        Ok(()) => {}
                        Err(e @ GatewayError::Codec(_)) => warn!("{}", e),
                        Err(e) => error!("{}", e),
                    }
                },

                _ = wait_until(deadline) => {
                    if let Err(e) = self.gateway.poll_timers(Instant::now()) {
                        error!("{}", e);
                    }
                },
            }
        }

        debug!("Gateway task exited");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

enum WsCommand {
    Text(String),
    Close,
}

/// Opens websocket transports with `tokio-tungstenite`. Must be used from
/// within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

pub struct WsTransport {
    outbound: mpsc::UnboundedSender<WsCommand>,
}

impl Transport for WsTransport {
    fn send(&mut self, text: String) {
        let _ = self.outbound.send(WsCommand::Text(text));
    }

    fn close(&mut self) {
        let _ = self.outbound.send(WsCommand::Close);
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(
        &mut self,
        endpoint: &str,
        generation: u64,
        events: mpsc::UnboundedSender<TransportNotice>,
    ) -> WsTransport {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(
            endpoint.to_string(),
            generation,
            outbound_rx,
            events,
        ));
        WsTransport {
            outbound: outbound_tx,
        }
    }
}

async fn run_socket(
    endpoint: String,
    generation: u64,
    mut outbound: mpsc::UnboundedReceiver<WsCommand>,
    events: mpsc::UnboundedSender<TransportNotice>,
) {
    let notify = |event: TransportEvent| {
        let _ = events.send(TransportNotice { generation, event });
    };

    let connecting = connect_async(endpoint.as_str());
    tokio::pin!(connecting);

    let stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    notify(TransportEvent::Error(e.to_string()));
                    notify(TransportEvent::Closed);
                    return;
                }
            },
            command = outbound.recv() => match command {
                // Nothing is sent before the socket opens
                Some(WsCommand::Text(_)) => continue,
                Some(WsCommand::Close) | None => {
                    notify(TransportEvent::Closed);
                    return;
                }
            },
        }
    };

    notify(TransportEvent::Opened);
    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(WsCommand::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        notify(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(WsCommand::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => notify(TransportEvent::Message(text)),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    notify(TransportEvent::Error(e.to_string()));
                    break;
                }
            },
        }
    }

    notify(TransportEvent::Closed);
}
