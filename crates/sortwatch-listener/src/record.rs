//! Output records: one JSON object per socket event, one line each.
//!
//! ```text
//! {"at":"2026-03-01T08:00:00Z","event":"open"}
//! {"at":"2026-03-01T08:00:02Z","event":"message","format":"json","bytes":31,"data":{"category":"recyclable"}}
//! {"at":"2026-03-01T08:00:09Z","event":"close","code":1006,"reason":"connection lost","was_clean":false}
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sortwatch_socket::{CloseEvent, InboundMessage, SocketError};

/// A timestamped socket event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// When the listener observed the event.
    pub at: DateTime<Utc>,
    /// What happened.
    #[serde(flatten)]
    pub event: RecordedEvent,
}

impl EventRecord {
    /// Stamp `event` with the current time.
    pub fn now(event: RecordedEvent) -> Self {
        Self {
            at: Utc::now(),
            event,
        }
    }

    /// Serialize as a single newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the record cannot be encoded.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// How an inbound frame body was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    /// Text frame holding valid JSON.
    Json,
    /// Any other text frame.
    Text,
    /// Binary frame; the body is not reproduced.
    Binary,
}

/// The event part of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    /// The transport opened.
    Open,
    /// A data frame arrived.
    Message {
        /// Body interpretation.
        format: MessageFormat,
        /// Body length in bytes.
        bytes: usize,
        /// Parsed JSON or the raw text; absent for binary frames.
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// The transport closed.
    Close {
        /// `WebSocket` close code.
        code: u16,
        /// Close reason.
        reason: String,
        /// Whether a close handshake completed.
        was_clean: bool,
    },
    /// The transport reported an error.
    Error {
        /// Rendered error.
        message: String,
        /// Set when the server rejected the credentials.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        session_expired: bool,
    },
}

impl RecordedEvent {
    /// Describe an inbound frame.
    pub fn message(message: &InboundMessage) -> Self {
        let bytes = message.len();
        match message {
            InboundMessage::Text(text) => match serde_json::from_str(text) {
                Ok(value) => Self::Message {
                    format: MessageFormat::Json,
                    bytes,
                    data: Some(value),
                },
                Err(_) => Self::Message {
                    format: MessageFormat::Text,
                    bytes,
                    data: Some(serde_json::Value::String(text.clone())),
                },
            },
            InboundMessage::Binary(_) => Self::Message {
                format: MessageFormat::Binary,
                bytes,
                data: None,
            },
        }
    }

    /// Describe a closure.
    pub fn close(event: &CloseEvent) -> Self {
        Self::Close {
            code: event.code,
            reason: event.reason.clone(),
            was_clean: event.was_clean,
        }
    }

    /// Describe a transport error.
    pub fn error(error: &SocketError) -> Self {
        Self::Error {
            message: error.to_string(),
            session_expired: error.is_unauthorized(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;

    fn encode(event: RecordedEvent) -> Value {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().unwrap_or_default();
        let record = EventRecord { at, event };
        serde_json::to_value(&record).unwrap_or(Value::Null)
    }

    #[test]
    fn open_record_has_timestamp_and_tag() {
        assert_eq!(
            encode(RecordedEvent::Open),
            json!({ "at": "2026-03-01T08:00:00Z", "event": "open" })
        );
    }

    #[test]
    fn json_text_is_embedded_as_json() {
        let body = r#"{"category":"recyclable","confidence":0.93}"#;
        let event = RecordedEvent::message(&InboundMessage::Text(body.to_owned()));
        let encoded = encode(event);
        assert_eq!(encoded["format"], "json");
        assert_eq!(encoded["data"]["category"], "recyclable");
        assert_eq!(encoded["bytes"], body.len());
    }

    #[test]
    fn plain_text_is_embedded_as_string() {
        let event = RecordedEvent::message(&InboundMessage::Text("pong".to_owned()));
        let encoded = encode(event);
        assert_eq!(encoded["format"], "text");
        assert_eq!(encoded["data"], "pong");
    }

    #[test]
    fn binary_body_is_omitted() {
        let event = RecordedEvent::message(&InboundMessage::Binary(vec![0; 16]));
        let encoded = encode(event);
        assert_eq!(encoded["format"], "binary");
        assert_eq!(encoded["bytes"], 16);
        assert!(encoded.get("data").is_none());
    }

    #[test]
    fn close_record_carries_code_and_reason() {
        let event = RecordedEvent::close(&CloseEvent::abnormal("connection lost"));
        assert_eq!(
            encode(event),
            json!({
                "at": "2026-03-01T08:00:00Z",
                "event": "close",
                "code": 1006,
                "reason": "connection lost",
                "was_clean": false,
            })
        );
    }

    #[test]
    fn unauthorized_errors_are_flagged() {
        let flagged = encode(RecordedEvent::error(&SocketError::Unauthorized));
        assert_eq!(flagged["session_expired"], true);

        let plain = encode(RecordedEvent::error(&SocketError::Transport("reset".to_owned())));
        assert!(plain.get("session_expired").is_none());
        assert_eq!(plain["message"], "transport error: reset");
    }

    #[test]
    fn lines_end_with_newline() {
        let line = EventRecord::now(RecordedEvent::Open).to_line().unwrap_or_default();
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|byte| **byte == b'\n').count(), 1);
    }
}
