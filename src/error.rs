use thiserror::Error;

/// Main error type for chatlink
#[derive(Error, Debug)]
pub enum ChannelError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Envelope parsing error
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type for chatlink operations
pub type Result<T> = std::result::Result<T, ChannelError>;
