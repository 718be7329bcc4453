use std::time::Duration;

use crate::reconnect::ReconnectPolicy;

/// Path suffix appended to the derived channel endpoint
const CHANNEL_PATH: &str = "/ws";

/// Default maximum number of automatic reconnection attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: usize = 5;

/// Default delay before the first reconnection attempt
pub const DEFAULT_BASE_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Default ceiling on the backoff delay
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Configuration for a [`ChannelClient`](crate::ChannelClient)
///
/// Only the base URL is required; everything else has defaults matching the
/// server's expectations.
///
/// # Example
/// ```ignore
/// let config = ChannelConfig::new("https://chat.example.com")
///     .with_max_reconnect_attempts(5)
///     .with_base_reconnect_delay(Duration::from_millis(1000))
///     .with_credential(token);
/// ```
pub struct ChannelConfig {
    base_url: String,
    pub(crate) max_reconnect_attempts: usize,
    pub(crate) base_reconnect_delay: Duration,
    pub(crate) max_reconnect_delay: Duration,
    pub(crate) credential: Option<String>,
    pub(crate) reconnect_policy: Option<Box<dyn ReconnectPolicy>>,
}

impl ChannelConfig {
    /// Create a configuration pointing at the given base URL
    ///
    /// The base URL uses the HTTP scheme of the REST API; the channel
    /// endpoint is derived from it by [`endpoint_url`](Self::endpoint_url).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_reconnect_delay: DEFAULT_BASE_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            credential: None,
            reconnect_policy: None,
        }
    }

    /// Set the maximum number of automatic reconnection attempts
    pub fn with_max_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the delay before the first reconnection attempt
    pub fn with_base_reconnect_delay(mut self, delay: Duration) -> Self {
        self.base_reconnect_delay = delay;
        self
    }

    /// Set the ceiling on the exponential backoff delay
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Provide a bearer token up front
    ///
    /// With a credential stored, [`connect`](crate::ChannelClient::connect)
    /// can open the channel without a prior
    /// [`authenticate`](crate::ChannelClient::authenticate) call.
    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    /// Override the reconnection policy
    ///
    /// By default the client builds an [`ExponentialBackoff`] from the
    /// delay and attempt settings above; this replaces it wholesale, e.g.
    /// with [`NeverReconnect`] for sessions that must not recover on their
    /// own.
    ///
    /// [`ExponentialBackoff`]: crate::ExponentialBackoff
    /// [`NeverReconnect`]: crate::NeverReconnect
    pub fn with_reconnect_policy(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.reconnect_policy = Some(Box::new(policy));
        self
    }

    /// Derive the channel endpoint from the base URL
    ///
    /// Rewrites the scheme to the WebSocket protocol (`https` -> `wss`,
    /// `http` -> `ws`, bare host -> `ws://`) and appends the fixed channel
    /// path.
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let rewritten = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if base.starts_with("wss://") || base.starts_with("ws://") {
            base.to_string()
        } else {
            format!("ws://{base}")
        };
        format!("{rewritten}{CHANNEL_PATH}")
    }
}
