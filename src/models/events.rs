//! Real-time chat events exchanged over the WebSocket.
//!
//! Frames are JSON objects of the form `{"type": "...", "payload": {...}}`.
//! Payloads are validated while they are parsed, so a handler never sees an
//! empty or oversized message body.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Message;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageBodyError {
    #[error("message is empty")]
    Empty,
    #[error("message exceeds 2000 characters")]
    TooLong,
}

/// Trimmed, non-empty chat text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageBody(String);

impl MessageBody {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageBody {
    type Error = MessageBodyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MessageBodyError::Empty);
        }
        if trimmed.chars().count() > MAX_MESSAGE_CHARS {
            return Err(MessageBodyError::TooLong);
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<MessageBody> for String {
    fn from(body: MessageBody) -> Self {
        body.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinChat {
        chat_id: Uuid,
    },
    LeaveChat,
    Message {
        chat_id: Uuid,
        content: MessageBody,
        client_id: Uuid,
    },
    Ping,
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    Joined { chat_id: Uuid },
    Message(Message),
    Ack { client_id: Uuid, message_id: Uuid },
    Error { message: String },
    Pong,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_chat_frame_parses() {
        let chat_id = Uuid::new_v4();
        let frame = json!({"type": "joinChat", "payload": {"chat_id": chat_id}}).to_string();
        assert_eq!(ClientEvent::parse(&frame).unwrap(), ClientEvent::JoinChat { chat_id });
    }

    #[test]
    fn message_content_is_trimmed() {
        let frame = json!({
            "type": "message",
            "payload": {"chat_id": Uuid::new_v4(), "content": "  hola \n", "client_id": Uuid::new_v4()}
        })
        .to_string();
        match ClientEvent::parse(&frame).unwrap() {
            ClientEvent::Message { content, .. } => assert_eq!(content.as_str(), "hola"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn blank_or_missing_content_is_rejected() {
        let blank = json!({
            "type": "message",
            "payload": {"chat_id": Uuid::new_v4(), "content": "   ", "client_id": Uuid::new_v4()}
        });
        assert!(ClientEvent::parse(&blank.to_string()).is_err());

        let missing = json!({
            "type": "message",
            "payload": {"chat_id": Uuid::new_v4(), "client_id": Uuid::new_v4()}
        });
        assert!(ClientEvent::parse(&missing.to_string()).is_err());
    }

    #[test]
    fn oversized_content_is_rejected() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            MessageBody::try_from(long).unwrap_err(),
            MessageBodyError::TooLong
        );
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!(ClientEvent::parse(r#"{"type": "typing", "payload": {}}"#).is_err());
    }

    #[test]
    fn unit_events_have_no_payload() {
        assert_eq!(ClientEvent::parse(r#"{"type": "ping"}"#).unwrap(), ClientEvent::Ping);
        let pong = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(pong, json!({"type": "pong"}));
    }
}
