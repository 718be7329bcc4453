//! Common test utilities for chatlink integration tests
//!
//! Provides a scriptable mock chat server speaking the wire-envelope
//! protocol, plus small helpers shared across test files.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chatlink::Envelope;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Notify;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Install a tracing subscriber when TEST_VERBOSE is set
#[allow(dead_code)]
pub fn init_tracing() {
    if std::env::var("TEST_VERBOSE").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Poll a condition until it holds or the timeout elapses
#[allow(dead_code)]
pub async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[allow(dead_code)]
enum ServerAction {
    SendRaw(String),
    Close(u16, String),
    Abort,
}

struct ServerState {
    received: Mutex<Vec<Envelope>>,
    connections: AtomicUsize,
    accepting: AtomicBool,
    current: Mutex<Option<UnboundedSender<ServerAction>>>,
}

/// A scriptable mock chat server for testing the channel client
///
/// Accepts sequential WebSocket connections, records every inbound
/// envelope, and can push envelopes, close with a chosen code, or drop the
/// transport without a close handshake.
pub struct MockChatServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    state: Arc<ServerState>,
}

impl MockChatServer {
    /// Create and start a new mock server on an ephemeral port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let state = Arc::new(ServerState {
            received: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            current: Mutex::new(None),
        });

        let shutdown_clone = Arc::clone(&shutdown);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                if !state_clone.accepting.load(Ordering::Acquire) {
                                    // Drop before the handshake: the client
                                    // sees a failed connection attempt.
                                    drop(stream);
                                    continue;
                                }
                                let shutdown = Arc::clone(&shutdown_clone);
                                let state = Arc::clone(&state_clone);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown,
            state,
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        state: Arc<ServerState>,
        shutdown: Arc<Notify>,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        state.connections.fetch_add(1, Ordering::Release);
        let (action_tx, mut action_rx) = unbounded_channel();
        *state.current.lock() = Some(action_tx);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(envelope) = Envelope::parse(&text) {
                                state.received.lock().push(envelope);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        _ => {}
                    }
                }
                action = action_rx.recv() => {
                    match action {
                        Some(ServerAction::SendRaw(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerAction::Close(code, reason)) => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        Some(ServerAction::Abort) | None => break,
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    }

    /// Base URL for this server; the client derives `<url>/ws` from it
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of WebSocket connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::Acquire)
    }

    /// All envelopes received across every connection
    #[allow(dead_code)]
    pub fn received(&self) -> Vec<Envelope> {
        self.state.received.lock().clone()
    }

    /// Number of received envelopes of the given type
    pub fn count_of_kind(&self, kind: &str) -> usize {
        self.state
            .received
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Last received envelope of the given type, if any
    #[allow(dead_code)]
    pub fn last_of_kind(&self, kind: &str) -> Option<Envelope> {
        self.state
            .received
            .lock()
            .iter()
            .rev()
            .find(|e| e.kind == kind)
            .cloned()
    }

    /// Push an envelope to the currently connected client
    #[allow(dead_code)]
    pub fn push(&self, kind: &str, data: Value) {
        let text = Envelope::new(kind, data).encode().unwrap();
        self.push_raw(text);
    }

    /// Push a raw text frame to the currently connected client
    #[allow(dead_code)]
    pub fn push_raw(&self, text: impl Into<String>) {
        if let Some(tx) = self.state.current.lock().as_ref() {
            let _ = tx.send(ServerAction::SendRaw(text.into()));
        }
    }

    /// Close the current connection with a close frame
    #[allow(dead_code)]
    pub fn close_current(&self, code: u16, reason: &str) {
        if let Some(tx) = self.state.current.lock().as_ref() {
            let _ = tx.send(ServerAction::Close(code, reason.to_string()));
        }
    }

    /// Drop the current connection without a close handshake
    #[allow(dead_code)]
    pub fn abort_current(&self) {
        if let Some(tx) = self.state.current.lock().as_ref() {
            let _ = tx.send(ServerAction::Abort);
        }
    }

    /// Control whether new connections complete the handshake
    #[allow(dead_code)]
    pub fn set_accepting(&self, accepting: bool) {
        self.state.accepting.store(accepting, Ordering::Release);
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
