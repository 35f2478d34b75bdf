//! Payload types crossing the push channel.
//!
//! Outbound data is a [`Payload`] whose variant the caller picks
//! explicitly; inbound data is an [`InboundMessage`] handed to the
//! `on_message` observer exactly as the transport delivered it.

use serde::Serialize;

/// Data the caller wants to transmit.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Sent as a text frame, unmodified.
    Text(String),
    /// Sent as a text frame holding the JSON encoding of the value.
    Json(serde_json::Value),
    /// Sent as a binary frame, unmodified.
    Binary(Vec<u8>),
}

impl Payload {
    /// Build a [`Payload::Json`] from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `value` cannot be represented as JSON
    /// (for example a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::Json)
    }

    /// Encode the payload into the frame the transport will carry.
    pub fn into_frame(self) -> Outgoing {
        match self {
            Self::Text(text) => Outgoing::Text(text),
            Self::Json(value) => Outgoing::Text(value.to_string()),
            Self::Binary(bytes) => Outgoing::Binary(bytes),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// A data frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

impl InboundMessage {
    /// Length of the frame body in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the frame body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Description of a transport closure, handed to the `on_close` observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// `WebSocket` close code.
    pub code: u16,
    /// Close reason sent by the closing side, possibly empty.
    pub reason: String,
    /// Whether a close handshake completed.
    pub was_clean: bool,
}

impl CloseEvent {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// The peer closed without sending a close code.
    pub const NO_STATUS: u16 = 1005;
    /// The connection dropped without a close handshake.
    pub const ABNORMAL: u16 = 1006;

    /// A closure that completed a close handshake.
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    /// A closure without a close handshake (network loss, failed dial).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: Self::ABNORMAL,
            reason: reason.into(),
            was_clean: false,
        }
    }
}

/// A frame queued for the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Close handshake request, after which the writer stops.
    Close {
        /// Close code; the transport sends 1000 when absent.
        code: Option<u16>,
        /// Close reason; empty when absent.
        reason: Option<String>,
    },
}
