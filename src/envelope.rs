use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};

/// Wire envelope: every unit exchanged over the channel.
///
/// The client routes by `kind` and never interprets `data`; payload schemas
/// are owned by the application layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Event-type name, e.g. `new_message` or `authenticate`
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque structured payload
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Parse an inbound text frame into an envelope
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ChannelError::Parse(e.to_string()))
    }

    /// Encode the envelope for transmission
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ChannelError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_type_and_data() {
        let env = Envelope::new("new_message", json!({"chat_id": "c1", "content": "hi"}));
        let text = env.encode().unwrap();
        let parsed = Envelope::parse(&text).unwrap();
        assert_eq!(parsed.kind, "new_message");
        assert_eq!(parsed.data["content"], "hi");
    }

    #[test]
    fn wire_field_is_named_type() {
        let env = Envelope::new("join_chat", json!({"chat_id": "c1"}));
        let value: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert!(value.get("type").is_some());
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn missing_data_defaults_to_null() {
        let parsed = Envelope::parse(r#"{"type":"user_online"}"#).unwrap();
        assert_eq!(parsed.kind, "user_online");
        assert!(parsed.data.is_null());
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse(r#"{"data": 1}"#).is_err());
    }
}
