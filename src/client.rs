//! The channel client: one persistent WebSocket connection per session,
//! transparently recovering from transport failures.
//!
//! # Architecture
//!
//! ```text
//! ChannelClient (cloneable handle)
//!   ├── command channel ──> channel task (tokio spawn, owns the socket)
//!   │                          ├── connect / authenticate / close
//!   │                          ├── backoff timer (single handle, always
//!   │                          │   cancelled before a new one is armed)
//!   │                          └── inbound envelopes ──> SubscriptionTable
//!   └── atomics (state, metrics) readable without locking
//! ```
//!
//! The task is the only owner of the socket; handles never touch it
//! directly. Subscriber callbacks run inline on the task, so they must not
//! block for long.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{sleep, Sleep};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::envelope::Envelope;
use crate::error::{ChannelError, Result};
use crate::events::{local, wire};
use crate::reconnect::{ExponentialBackoff, ReconnectPolicy};
use crate::state::{AtomicChannelState, AtomicMetrics, ChannelMetrics, ChannelState};
use crate::subscriptions::{SubscriptionId, SubscriptionTable};

/// Close code sent on explicit disconnect
const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the transport fails without a close frame
const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when the peer sent a close frame without a status
const CLOSE_NO_STATUS: u16 = 1005;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type RetryTimer = Option<Pin<Box<Sleep>>>;

/// Control messages from handles to the channel task
#[derive(Debug)]
enum ChannelCommand {
    Connect,
    Authenticate(String),
    Disconnect,
    Reconnect,
    Send(Envelope),
}

/// Handle to the event channel
///
/// Cheap to clone; one instance (and its clones) per application session.
/// Construct it at session start and inject it into consumers. The
/// underlying task exits after the last handle is dropped, performing a
/// normal closure.
///
/// # Example
/// ```ignore
/// let client = ChannelClient::new(
///     ChannelConfig::new("https://chat.example.com").with_credential(token),
/// );
///
/// client.on(events::wire::NEW_MESSAGE, |data| {
///     println!("message: {data}");
/// });
///
/// client.join_chat("chat-42");
/// ```
#[derive(Clone)]
pub struct ChannelClient {
    command_tx: UnboundedSender<ChannelCommand>,
    state: Arc<AtomicChannelState>,
    metrics: Arc<AtomicMetrics>,
    subscriptions: Arc<SubscriptionTable>,
}

impl ChannelClient {
    /// Create the client and spawn its channel task
    ///
    /// The channel stays down until [`connect`](Self::connect) or
    /// [`authenticate`](Self::authenticate) is issued. Must be called
    /// within a Tokio runtime.
    pub fn new(mut config: ChannelConfig) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicChannelState::new(ChannelState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let subscriptions = Arc::new(SubscriptionTable::new());

        let policy = config.reconnect_policy.take().unwrap_or_else(|| {
            Box::new(ExponentialBackoff::new(
                config.base_reconnect_delay,
                config.max_reconnect_delay,
                Some(config.max_reconnect_attempts),
            ))
        });

        tokio::spawn(run_channel(
            config,
            policy,
            Arc::clone(&state),
            Arc::clone(&metrics),
            Arc::clone(&subscriptions),
            command_rx,
        ));

        Self {
            command_tx,
            state,
            metrics,
            subscriptions,
        }
    }

    /// Open the channel if it is currently disconnected
    ///
    /// Idempotent: a no-op while connecting or open. Logs and does nothing
    /// if no credential has been supplied yet.
    pub fn connect(&self) {
        self.command(ChannelCommand::Connect);
    }

    /// Store or refresh the bearer token
    ///
    /// Sends an `authenticate` envelope immediately if the channel is open;
    /// otherwise keeps the token and triggers [`connect`](Self::connect).
    pub fn authenticate(&self, token: impl Into<String>) {
        self.command(ChannelCommand::Authenticate(token.into()));
    }

    /// Close the channel intentionally
    ///
    /// Performs a normal closure (code 1000), clears every subscription and
    /// never triggers reconnection. Terminal until [`reconnect`]
    /// (Self::reconnect) or a fresh [`connect`](Self::connect).
    pub fn disconnect(&self) {
        self.command(ChannelCommand::Disconnect);
    }

    /// Manual recovery: disconnect, reset the reconnect counter, connect
    pub fn reconnect(&self) {
        self.command(ChannelCommand::Reconnect);
    }

    /// Subscribe a handler to an event type
    ///
    /// Handlers for one type fire in subscription order and receive the
    /// envelope's `data` payload only. The returned id identifies this
    /// registration for [`off`](Self::off).
    pub fn on(
        &self,
        event: &str,
        handler: impl FnMut(&Value) + Send + 'static,
    ) -> SubscriptionId {
        self.subscriptions.insert(event, handler)
    }

    /// Unsubscribe one registration; other handlers for the same event type
    /// are unaffected
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.subscriptions.remove(event, id)
    }

    /// Build and transmit an envelope
    ///
    /// Transmits only while the channel is open; otherwise the command is
    /// dropped with a logged warning. No queueing, no error to the caller —
    /// re-issue the command after reconnection if it matters.
    pub fn send(&self, kind: impl Into<String>, data: Value) {
        self.command(ChannelCommand::Send(Envelope::new(kind, data)));
    }

    /// Send a chat message payload
    pub fn send_message(&self, message: Value) {
        self.send(wire::SEND_MESSAGE, message);
    }

    /// Signal that the user started or stopped typing in a chat
    pub fn send_typing_indicator(&self, chat_id: &str, is_typing: bool) {
        self.send(
            wire::TYPING_INDICATOR,
            json!({ "chat_id": chat_id, "is_typing": is_typing }),
        );
    }

    /// Subscribe to a chat's events on the server side
    pub fn join_chat(&self, chat_id: &str) {
        self.send(wire::JOIN_CHAT, json!({ "chat_id": chat_id }));
    }

    /// Leave a chat on the server side
    pub fn leave_chat(&self, chat_id: &str) {
        self.send(wire::LEAVE_CHAT, json!({ "chat_id": chat_id }));
    }

    /// Check if the channel is open
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_open()
    }

    /// Get the current lifecycle state
    #[inline]
    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// Get a metrics snapshot
    pub fn metrics(&self) -> ChannelMetrics {
        ChannelMetrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            state: self.state.get(),
        }
    }

    fn command(&self, command: ChannelCommand) {
        if self.command_tx.send(command).is_err() {
            warn!("Channel task has exited, dropping command");
        }
    }
}

/// Result of one connection attempt
enum ConnectOutcome {
    Opened(WsStream),
    Skipped,
    Failed,
}

/// State owned by the channel task
struct ChannelTask {
    endpoint: String,
    policy: Box<dyn ReconnectPolicy>,
    state: Arc<AtomicChannelState>,
    metrics: Arc<AtomicMetrics>,
    subscriptions: Arc<SubscriptionTable>,
    credential: Option<String>,
    write: Option<WsSink>,
    reconnect_attempts: usize,
    retries_exhausted: bool,
}

/// Events produced by one iteration of the task's select loop
enum Tick {
    Command(Option<ChannelCommand>),
    Inbound(Option<std::result::Result<Message, WsError>>),
    Retry,
}

/// Main channel task loop
async fn run_channel(
    config: ChannelConfig,
    policy: Box<dyn ReconnectPolicy>,
    state: Arc<AtomicChannelState>,
    metrics: Arc<AtomicMetrics>,
    subscriptions: Arc<SubscriptionTable>,
    mut command_rx: UnboundedReceiver<ChannelCommand>,
) {
    let mut task = ChannelTask {
        endpoint: config.endpoint_url(),
        policy,
        state,
        metrics,
        subscriptions,
        credential: config.credential,
        write: None,
        reconnect_attempts: 0,
        retries_exhausted: false,
    };

    // The read half and the retry timer live outside the task struct so the
    // select loop can poll them while handlers mutate the rest.
    let mut read: Option<WsStream> = None;
    let mut timer: RetryTimer = None;

    if task.credential.is_some() {
        task.open_channel(&mut read, &mut timer).await;
    } else {
        debug!("No credential at startup, waiting for authenticate");
    }

    loop {
        let tick = tokio::select! {
            cmd = command_rx.recv() => Tick::Command(cmd),
            msg = async {
                match read.as_mut() {
                    Some(stream) => stream.next().await,
                    None => std::future::pending().await,
                }
            } => Tick::Inbound(msg),
            _ = async {
                match timer.as_mut() {
                    Some(delay) => delay.await,
                    None => std::future::pending().await,
                }
            } => Tick::Retry,
        };

        match tick {
            Tick::Command(None) => {
                // Last handle dropped: normal closure, task ends
                debug!("All handles dropped, closing channel");
                task.close_channel(&mut read, &mut timer).await;
                break;
            }
            Tick::Command(Some(command)) => {
                task.handle_command(command, &mut read, &mut timer).await;
            }
            Tick::Inbound(frame) => {
                task.handle_frame(frame, &mut read, &mut timer).await;
            }
            Tick::Retry => {
                timer = None;
                debug!(
                    "Retry timer fired (attempt {})",
                    task.reconnect_attempts
                );
                task.open_channel(&mut read, &mut timer).await;
            }
        }
    }

    debug!("Channel task exiting");
}

impl ChannelTask {
    async fn handle_command(
        &mut self,
        command: ChannelCommand,
        read: &mut Option<WsStream>,
        timer: &mut RetryTimer,
    ) {
        match command {
            ChannelCommand::Connect => {
                *timer = None;
                self.open_channel(read, timer).await;
            }
            ChannelCommand::Authenticate(token) => {
                self.credential = Some(token);
                if self.state.is_open() {
                    let envelope = self.authenticate_envelope();
                    if let Err(e) = self.transmit(&envelope).await {
                        error!("Failed to send authenticate: {}", e);
                    }
                } else if self.state.is_disconnected() {
                    *timer = None;
                    self.open_channel(read, timer).await;
                }
            }
            ChannelCommand::Disconnect => {
                self.close_channel(read, timer).await;
            }
            ChannelCommand::Reconnect => {
                self.close_channel(read, timer).await;
                self.reconnect_attempts = 0;
                self.retries_exhausted = false;
                self.open_channel(read, timer).await;
            }
            ChannelCommand::Send(envelope) => {
                if self.state.is_open() && self.write.is_some() {
                    match self.transmit(&envelope).await {
                        Ok(()) => {}
                        Err(e) => {
                            // The read half surfaces the failure and drives
                            // the reconnect, so only log here.
                            error!("Failed to send {}: {}", envelope.kind, e);
                        }
                    }
                } else {
                    warn!("Channel not open, dropping outbound {}", envelope.kind);
                }
            }
        }
    }

    /// Open the channel if disconnected and a credential is held
    ///
    /// On success: state -> Open, counter reset, local `connected` emitted,
    /// `authenticate` envelope sent. On failure: a reconnect attempt is
    /// scheduled per the backoff policy.
    async fn open_channel(&mut self, read: &mut Option<WsStream>, timer: &mut RetryTimer) {
        match self.try_open().await {
            ConnectOutcome::Opened(stream) => {
                *read = Some(stream);
                *timer = None;
                self.reconnect_attempts = 0;
                self.retries_exhausted = false;
            }
            ConnectOutcome::Skipped => {}
            ConnectOutcome::Failed => {
                *read = None;
                self.schedule_reconnect(timer);
            }
        }
    }

    async fn try_open(&mut self) -> ConnectOutcome {
        if !self.state.is_disconnected() {
            debug!("Channel already {:?}, ignoring connect", self.state.get());
            return ConnectOutcome::Skipped;
        }
        if self.credential.is_none() {
            warn!("No credential available, cannot open channel");
            return ConnectOutcome::Skipped;
        }

        self.state.set(ChannelState::Connecting);
        info!("Opening channel to {}", self.endpoint);

        match connect_async(&self.endpoint).await {
            Ok((ws_stream, _)) => {
                let (write, stream) = ws_stream.split();
                self.write = Some(write);
                self.state.set(ChannelState::Open);
                info!("Channel open");

                self.subscriptions.dispatch(local::CONNECTED, &Value::Null);

                // The server does not persist identity across transports,
                // so re-authenticate after every (re)connection.
                let envelope = self.authenticate_envelope();
                if let Err(e) = self.transmit(&envelope).await {
                    error!("Failed to send authenticate: {}", e);
                    self.write = None;
                    self.state.set(ChannelState::Disconnected);
                    return ConnectOutcome::Failed;
                }

                ConnectOutcome::Opened(stream)
            }
            Err(e) => {
                error!("Failed to connect: {}", e);
                self.write = None;
                self.state.set(ChannelState::Disconnected);
                ConnectOutcome::Failed
            }
        }
    }

    async fn handle_frame(
        &mut self,
        frame: Option<std::result::Result<Message, WsError>>,
        read: &mut Option<WsStream>,
        timer: &mut RetryTimer,
    ) {
        match frame {
            Some(Ok(Message::Text(text))) => {
                self.metrics.increment_received();
                match Envelope::parse(&text) {
                    Ok(envelope) => self.dispatch_inbound(&envelope),
                    Err(e) => warn!("Dropping malformed envelope: {}", e),
                }
            }
            Some(Ok(Message::Binary(_))) => {
                self.metrics.increment_received();
                debug!("Ignoring binary frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(f) => (u16::from(f.code), f.reason.to_string()),
                    None => (CLOSE_NO_STATUS, String::new()),
                };
                info!("Channel closed by peer: {} {}", code, reason);
                self.handle_closure(code, reason, read, timer);
            }
            Some(Err(e)) => {
                error!("Channel transport error: {}", e);
                self.handle_closure(CLOSE_ABNORMAL, e.to_string(), read, timer);
            }
            None => {
                warn!("Channel stream ended without close frame");
                self.handle_closure(CLOSE_ABNORMAL, "connection lost".to_string(), read, timer);
            }
        }
    }

    /// Route an inbound envelope to subscribers, payload only
    fn dispatch_inbound(&self, envelope: &Envelope) {
        if wire::INBOUND.contains(&envelope.kind.as_str()) {
            self.subscriptions.dispatch(&envelope.kind, &envelope.data);
        } else {
            warn!("Unknown event type: {}", envelope.kind);
        }
    }

    /// One closure handling per failure: drops both socket halves first, so
    /// an error followed by a close on the same transport cannot schedule
    /// twice.
    fn handle_closure(
        &mut self,
        code: u16,
        reason: String,
        read: &mut Option<WsStream>,
        timer: &mut RetryTimer,
    ) {
        self.write = None;
        *read = None;
        self.state.set(ChannelState::Disconnected);

        self.subscriptions.dispatch(
            local::DISCONNECTED,
            &json!({ "code": code, "reason": reason }),
        );

        if code != CLOSE_NORMAL {
            self.schedule_reconnect(timer);
        }
    }

    /// Arm the retry timer per the backoff policy, replacing any pending one
    ///
    /// Once the policy gives up, `max_reconnect_attempts_reached` is emitted
    /// and latched until an explicit reconnect resets the counter.
    fn schedule_reconnect(&mut self, timer: &mut RetryTimer) {
        if self.retries_exhausted {
            return;
        }

        match self.policy.next_delay(self.reconnect_attempts) {
            Some(delay) => {
                self.reconnect_attempts += 1;
                self.metrics.increment_reconnects();
                info!(
                    "Reconnecting in {:?} (attempt {})",
                    delay, self.reconnect_attempts
                );
                *timer = Some(Box::pin(sleep(delay)));
            }
            None => {
                warn!(
                    "Max reconnection attempts reached after {} attempts",
                    self.reconnect_attempts
                );
                self.retries_exhausted = true;
                *timer = None;
                self.subscriptions
                    .dispatch(local::MAX_RECONNECT_ATTEMPTS_REACHED, &Value::Null);
            }
        }
    }

    /// Intentional shutdown: normal close, subscriptions cleared, no retry
    async fn close_channel(&mut self, read: &mut Option<WsStream>, timer: &mut RetryTimer) {
        *timer = None;

        if let Some(mut write) = self.write.take() {
            self.state.set(ChannelState::Closing);
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "client disconnect".into(),
            };
            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                debug!("Error sending close frame: {}", e);
            }
            info!("Channel closed");
        }

        *read = None;
        self.subscriptions.clear();
        self.state.set(ChannelState::Disconnected);
    }

    fn authenticate_envelope(&self) -> Envelope {
        let token = self.credential.clone().unwrap_or_default();
        Envelope::new(wire::AUTHENTICATE, json!({ "token": token }))
    }

    async fn transmit(&mut self, envelope: &Envelope) -> Result<()> {
        let write = self
            .write
            .as_mut()
            .ok_or_else(|| ChannelError::ConnectionClosed("no transport".to_string()))?;
        let text = envelope.encode()?;
        write
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::WebSocket(e.to_string()))?;
        self.metrics.increment_sent();
        debug!("Sent {}", envelope.kind);
        Ok(())
    }
}
