use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed frame: {reason}")]
pub struct MalformedFrameError {
    pub reason: String,
}

impl MalformedFrameError {
    fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    HeartbeatAck { reply_to: u64 },
    ChatMessage(ChatEvent),
}

/// A `message` frame as Slack sends it over the real-time socket.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "user", default)]
    pub sender_id: Option<String>,
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Ping { id: u64 },
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Classifies one inbound frame.
///
/// `Ok(None)` covers every well-formed frame the session has no use for: other event types,
/// and `message` frames with no text. Only text that is not JSON, or a known frame type whose
/// fields have the wrong shape, is reported as malformed.
pub fn classify(raw: &str) -> Result<Option<InboundEvent>, MalformedFrameError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|error| MalformedFrameError::new(format!("invalid json: {error}")))?;

    match value.get("type").and_then(Value::as_str) {
        Some("pong") => {
            let reply_to = value
                .get("reply_to")
                .and_then(Value::as_u64)
                .ok_or_else(|| MalformedFrameError::new("pong without integer reply_to"))?;
            Ok(Some(InboundEvent::HeartbeatAck { reply_to }))
        }
        Some("message") => {
            let event: ChatEvent = serde_json::from_value(value)
                .map_err(|error| MalformedFrameError::new(format!("message frame: {error}")))?;
            if event.text.is_empty() {
                return Ok(None);
            }
            Ok(Some(InboundEvent::ChatMessage(event)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, ChatEvent, InboundEvent, OutboundFrame};

    #[test]
    fn pong_frame_becomes_heartbeat_ack() {
        let event = classify(r#"{"type":"pong","reply_to":7}"#).expect("classify");
        assert_eq!(event, Some(InboundEvent::HeartbeatAck { reply_to: 7 }));
    }

    #[test]
    fn message_frame_becomes_chat_event() {
        let event =
            classify(r#"{"type":"message","text":"<@U1> hello","channel":"C1","user":"U2"}"#)
                .expect("classify");

        assert_eq!(
            event,
            Some(InboundEvent::ChatMessage(ChatEvent {
                sender_id: Some("U2".to_owned()),
                channel_id: "C1".to_owned(),
                text: "<@U1> hello".to_owned(),
                subtype: None,
            }))
        );
    }

    #[test]
    fn message_subtype_is_carried_through() {
        let event = classify(
            r#"{"type":"message","subtype":"bot_message","text":"beep","channel":"C1"}"#,
        )
        .expect("classify");

        let Some(InboundEvent::ChatMessage(chat)) = event else {
            panic!("expected chat event, got {event:?}");
        };
        assert_eq!(chat.subtype.as_deref(), Some("bot_message"));
        assert_eq!(chat.sender_id, None);
    }

    #[test]
    fn frames_without_a_known_shape_are_ignored() {
        for raw in [
            r#"{"type":"hello"}"#,
            r#"{"type":"user_typing","channel":"C1","user":"U2"}"#,
            r#"{"type":"message","channel":"C1","user":"U2"}"#,
            r#"{"type":"message","text":"","channel":"C1","user":"U2"}"#,
            r#"{"reply_to":1,"ok":true,"text":"sent"}"#,
            r#"[]"#,
        ] {
            assert_eq!(classify(raw).expect("well-formed frame"), None, "frame {raw}");
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        let error = classify("not json").expect_err("should be malformed");
        assert!(error.reason.starts_with("invalid json"));
    }

    #[test]
    fn pong_without_reply_to_is_malformed() {
        assert!(classify(r#"{"type":"pong"}"#).is_err());
        assert!(classify(r#"{"type":"pong","reply_to":"7"}"#).is_err());
    }

    #[test]
    fn message_with_wrongly_typed_fields_is_malformed() {
        assert!(classify(r#"{"type":"message","text":42,"channel":"C1"}"#).is_err());
    }

    #[test]
    fn ping_frame_encodes_id_and_type() {
        let encoded = OutboundFrame::Ping { id: 3 }.encode().expect("encode");
        let value: serde_json::Value = serde_json::from_str(&encoded).expect("valid json");

        assert_eq!(value, serde_json::json!({ "id": 3, "type": "ping" }));
    }
}
