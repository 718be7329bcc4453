//! # chatlink
//!
//! A resilient WebSocket event-channel client for chat applications.
//!
//! One `ChannelClient` per session maintains a single logical channel to the
//! chat server: it authenticates over the wire after every (re)connection,
//! recovers from transport drops with exponential backoff, and fans inbound
//! envelopes out to independent in-process subscribers so chat, presence and
//! typing features can share one physical connection.
//!
//! ## Features
//!
//! - **Actor-owned socket**: one spawned task exclusively owns the
//!   transport; handles are cheap clones communicating over a command channel
//! - **Lock-free queries**: connection state and metrics are atomics,
//!   readable from any thread
//! - **Typed event fan-out**: `on`/`off` over a type-keyed ordered handler
//!   table, removal by subscription identity
//! - **Bounded backoff reconnection**: exponential delay with a ceiling and
//!   an attempt limit, single cancellable retry timer
//! - **Fire-and-forget sends**: outbound commands while disconnected are
//!   dropped with a warning, never queued
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatlink::{ChannelClient, ChannelConfig, events};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = ChannelClient::new(
//!         ChannelConfig::new("https://chat.example.com").with_credential(token),
//!     );
//!
//!     client.on(events::wire::NEW_MESSAGE, |data| {
//!         println!("new message: {data}");
//!     });
//!     client.on(events::local::DISCONNECTED, |data| {
//!         println!("channel down: {data}");
//!     });
//!
//!     client.connect();
//!     client.join_chat("chat-42");
//!     client.send_typing_indicator("chat-42", true);
//! }
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod reconnect;
pub mod state;
pub mod subscriptions;

pub use client::ChannelClient;
pub use config::ChannelConfig;
pub use envelope::Envelope;
pub use error::{ChannelError, Result};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectPolicy};
pub use state::{AtomicChannelState, AtomicMetrics, ChannelMetrics, ChannelState};
pub use subscriptions::{SubscriptionId, SubscriptionTable};
