//! Reconnecting WebSocket event channel.
//!
//! Provides:
//! - Connection lifecycle driven by [`ReconnectMachine`]
//! - Inbound JSON envelope dispatch to a [`ChannelHandler`]
//! - Best-effort outbound send (dropped while not connected)
//! - Deterministic teardown that cancels any pending reconnect
//!
//! One tokio task per channel owns the socket, the retry timer and the
//! state machine. The [`EventChannel`] handle talks to it through a command
//! queue and observes state through a `watch` channel.

mod machine;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::protocol::{Envelope, ProtocolError};

pub use machine::{Action, ChannelState, Input, ReconnectMachine, ReconnectPolicy};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectFuture = Pin<Box<dyn Future<Output = Result<WsStream, tungstenite::Error>> + Send>>;

/// Channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("Channel is not connected")]
    NotConnected,
    #[error("Channel task has stopped")]
    Closed,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Collaboration endpoint. `None` keeps the channel disconnected.
    pub url: Option<String>,
    pub policy: ReconnectPolicy,
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            policy: ReconnectPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Receives channel notifications. Runs on the channel task.
pub trait ChannelHandler: Send + 'static {
    /// A well-formed inbound envelope arrived.
    fn on_message(&mut self, envelope: Envelope);

    fn on_open(&mut self) {}

    fn on_close(&mut self) {}

    fn on_error(&mut self, _error: &ChannelError) {}

    /// The connection was lost and no reconnect will follow.
    fn on_give_up(&mut self) {}
}

/// Notifications forwarded by the `mpsc` handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Closed,
    Error(String),
    GaveUp,
    Message(Envelope),
}

impl ChannelHandler for mpsc::UnboundedSender<ChannelEvent> {
    fn on_message(&mut self, envelope: Envelope) {
        let _ = self.send(ChannelEvent::Message(envelope));
    }

    fn on_open(&mut self) {
        let _ = self.send(ChannelEvent::Opened);
    }

    fn on_close(&mut self) {
        let _ = self.send(ChannelEvent::Closed);
    }

    fn on_error(&mut self, error: &ChannelError) {
        let _ = self.send(ChannelEvent::Error(error.to_string()));
    }

    fn on_give_up(&mut self) {
        let _ = self.send(ChannelEvent::GaveUp);
    }
}

/// Handler that only cares about inbound messages.
pub struct MessageFn<F>(pub F);

impl<F> ChannelHandler for MessageFn<F>
where
    F: FnMut(Envelope) + Send + 'static,
{
    fn on_message(&mut self, envelope: Envelope) {
        (self.0)(envelope)
    }
}

/// Channel statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub connect_attempts: u64,
    pub messages_sent: u64,
    /// Frames that decoded into an envelope.
    pub messages_received: u64,
    pub messages_dropped: u64,
    /// Frames that failed to decode.
    pub malformed_dropped: u64,
}

/// Lock-free counters shared between the handle and the task.
#[derive(Default)]
struct AtomicChannelStats {
    connect_attempts: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    messages_dropped: AtomicU64,
    malformed_dropped: AtomicU64,
}

impl AtomicChannelStats {
    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
        }
    }
}

enum Command {
    Send(String),
    Disconnect,
}

/// Handle to a running event channel.
///
/// Dropping the handle tears the channel down.
pub struct EventChannel {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ChannelState>,
    stats: Arc<AtomicChannelStats>,
    task: Option<JoinHandle<()>>,
}

impl EventChannel {
    /// Start the channel task and begin connecting if an address is set.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<H: ChannelHandler>(config: ChannelConfig, handler: H) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let stats = Arc::new(AtomicChannelStats::default());

        let driver = Driver {
            url: config.url,
            machine: ReconnectMachine::new(config.policy),
            handler,
            socket: None,
            connecting: None,
            retry: None,
            state_tx,
            stats: stats.clone(),
            last_error: None,
        };
        let task = tokio::spawn(driver.run(cmd_rx));

        Self {
            commands: cmd_tx,
            state_rx,
            stats,
            task: Some(task),
        }
    }

    /// Send an envelope if the channel is connected.
    ///
    /// Nothing is queued: while not connected the envelope is dropped and
    /// `NotConnected` is returned.
    pub fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        let state = self.state();
        if state != ChannelState::Connected {
            self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!("Dropping outbound '{}' message: channel is {state:?}", envelope.kind);
            return Err(ChannelError::NotConnected);
        }
        let text = envelope.encode()?;
        self.commands
            .send(Command::Send(text))
            .map_err(|_| ChannelError::Closed)
    }

    /// Tear the channel down. Pending reconnects are cancelled.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Tear down and wait for the channel task to finish.
    pub async fn shutdown(mut self) {
        self.disconnect();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Channel task ended abnormally: {e}");
            }
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats.snapshot()
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Disconnect);
    }
}

/// Channel task state.
struct Driver<H> {
    url: Option<String>,
    machine: ReconnectMachine,
    handler: H,
    socket: Option<WsStream>,
    connecting: Option<ConnectFuture>,
    retry: Option<Pin<Box<Sleep>>>,
    state_tx: watch::Sender<ChannelState>,
    stats: Arc<AtomicChannelStats>,
    last_error: Option<ChannelError>,
}

impl<H: ChannelHandler> Driver<H> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        if self.url.is_some() {
            self.apply(Input::Connect).await;
        } else {
            log::info!("No collaboration address configured; channel stays disconnected");
        }

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Send(text)) => self.send_text(text).await,
                    Some(Command::Disconnect) | None => {
                        self.apply(Input::Teardown).await;
                        break;
                    }
                },
                result = poll_connect(&mut self.connecting) => {
                    self.connecting = None;
                    match result {
                        Ok(ws) => {
                            self.socket = Some(ws);
                            self.apply(Input::Opened).await;
                        }
                        Err(e) => {
                            self.last_error = Some(ChannelError::Transport(e));
                            self.apply(Input::Failed).await;
                        }
                    }
                }
                frame = next_frame(&mut self.socket) => self.on_frame(frame).await,
                () = wait_retry(&mut self.retry) => {
                    self.retry = None;
                    self.apply(Input::RetryElapsed).await;
                }
            }
        }

        log::debug!("Channel task finished");
    }

    /// Feed one input to the machine. The new state is published before
    /// any handler callback runs.
    async fn apply(&mut self, input: Input) {
        let was_active = self.machine.is_active();
        let actions = self.machine.handle(input);
        self.state_tx.send_replace(self.machine.state());
        for action in actions {
            self.execute(action).await;
        }

        let settled = !self.machine.is_active()
            && !self.machine.retry_pending()
            && !self.machine.is_torn_down();
        if was_active && settled {
            log::warn!(
                "Giving up on collaboration channel after {} connection attempts",
                self.stats.connect_attempts.load(Ordering::Relaxed)
            );
            self.handler.on_give_up();
        }
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::OpenTransport => {
                let Some(url) = self.url.clone() else {
                    return;
                };
                let n = self.stats.connect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                log::info!("Connecting to {url} (connection attempt {n})");
                let connect: ConnectFuture = Box::pin(async move {
                    tokio_tungstenite::connect_async(url).await.map(|(ws, _)| ws)
                });
                self.connecting = Some(connect);
            }
            Action::CloseTransport => {
                self.connecting = None;
                if let Some(mut ws) = self.socket.take() {
                    if let Err(e) = ws.close(None).await {
                        log::debug!("Error while closing socket: {e}");
                    }
                }
            }
            Action::ScheduleRetry { attempt, delay } => {
                log::info!(
                    "Reconnecting in {delay:?} (attempt {attempt}/{})",
                    self.machine.policy().max_attempts
                );
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Action::CancelRetry => {
                log::debug!("Cancelling scheduled reconnect");
                self.retry = None;
            }
            Action::NotifyOpen => {
                log::info!("Collaboration channel connected");
                self.handler.on_open();
            }
            Action::NotifyClose => {
                log::info!("Collaboration channel closed");
                self.handler.on_close();
            }
            Action::NotifyError => {
                if let Some(error) = self.last_error.take() {
                    log::warn!("Collaboration channel error: {error}");
                    self.handler.on_error(&error);
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => self.dispatch(text),
                Err(_) => {
                    self.stats.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Dropping non-UTF-8 binary frame ({} bytes)", bytes.len());
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                self.socket = None;
                self.apply(Input::Closed).await;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.socket = None;
                self.last_error = Some(ChannelError::Transport(e));
                self.apply(Input::Failed).await;
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        match Envelope::decode(text) {
            Ok(envelope) => {
                self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
                if envelope.kind == "error" {
                    log::warn!("Server reported an error: {}", text);
                }
                self.handler.on_message(envelope);
            }
            Err(e) => {
                self.stats.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Dropping malformed message: {e}");
            }
        }
    }

    async fn send_text(&mut self, text: String) {
        let connected = self.machine.state() == ChannelState::Connected;
        let Some(ws) = self.socket.as_mut().filter(|_| connected) else {
            self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!("Dropping outbound message: channel is {:?}", self.machine.state());
            return;
        };

        match ws.send(Message::Text(text.into())).await {
            Ok(()) => {
                self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                self.socket = None;
                self.last_error = Some(ChannelError::Transport(e));
                self.apply(Input::Failed).await;
            }
        }
    }
}

async fn poll_connect(connecting: &mut Option<ConnectFuture>) -> Result<WsStream, tungstenite::Error> {
    match connecting {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
