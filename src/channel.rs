use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel is not attached")]
    NotAttached,
    #[error("Channel transport failure: {0}")]
    Transport(String),
}

/// Outbound request envelope. `content` is elided from the JSON when absent
/// so that argument-less requests stay bare `{messageId, name}` objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

/// Wire wrapper for outbound traffic.
#[derive(Debug, Clone, Serialize)]
pub struct ClientEnvelope {
    #[serde(rename = "ciscoSDKClientMessage")]
    pub message: ClientMessage,
}

/// Inbound application-protocol message. A message can be a reply
/// (`reply_to_message_id` set), an unsolicited event (`name` set), or both.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerMessage {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Value,
    /// Raw engine error code; empty string means no error.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "replyToMessageId", default)]
    pub reply_to_message_id: Option<Value>,
}

impl ServerMessage {
    /// Correlation ids arrive as either JSON numbers or strings.
    pub fn reply_id(&self) -> Option<String> {
        match &self.reply_to_message_id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Channel-infrastructure control message, distinct from the application
/// protocol. Either the transport endpoint or its host went away.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelControlMessage {
    pub name: String,
}

impl ChannelControlMessage {
    pub fn is_channel_disconnect(&self) -> bool {
        self.name == "ChannelDisconnect"
    }

    pub fn is_host_disconnect(&self) -> bool {
        self.name == "HostDisconnect"
    }
}

/// Everything that can arrive on the inbound side of the channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEnvelope {
    #[serde(rename = "ciscoSDKServerMessage")]
    pub message: Option<ServerMessage>,
    #[serde(rename = "ciscoChannelServerMessage")]
    pub control: Option<ChannelControlMessage>,
}

/// Transport seam. The host environment owns the actual channel (an
/// extension port, a frame, a test double); the client only posts envelopes
/// through this trait and is fed raw inbound values by the embedder.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn post(&self, envelope: Value) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_envelope_elides_null_content() {
        let env = ClientEnvelope {
            message: ClientMessage {
                message_id: "17".into(),
                name: "getCalls".into(),
                content: None,
            },
        };
        let v = serde_json::to_value(&env).unwrap();
        assert!(v["ciscoSDKClientMessage"].get("content").is_none());
        assert_eq!(v["ciscoSDKClientMessage"]["messageId"], "17");
    }

    #[test]
    fn reply_id_accepts_number_or_string() {
        let m: ServerEnvelope = serde_json::from_value(json!({
            "ciscoSDKServerMessage": { "replyToMessageId": 42, "content": {} }
        }))
        .unwrap();
        assert_eq!(m.message.unwrap().reply_id().as_deref(), Some("42"));

        let m: ServerEnvelope = serde_json::from_value(json!({
            "ciscoSDKServerMessage": { "replyToMessageId": "0", "name": "init" }
        }))
        .unwrap();
        assert_eq!(m.message.unwrap().reply_id().as_deref(), Some("0"));
    }

    #[test]
    fn control_message_kinds() {
        let m: ServerEnvelope = serde_json::from_value(json!({
            "ciscoChannelServerMessage": { "name": "ChannelDisconnect" }
        }))
        .unwrap();
        let control = m.control.unwrap();
        assert!(control.is_channel_disconnect());
        assert!(!control.is_host_disconnect());
    }
}
