//! Observer callbacks for connection lifecycle events.
//!
//! All four observers are optional and registered through a chaining
//! builder:
//!
//! ```
//! use sortwatch_socket::{EventHandlers, InboundMessage};
//!
//! let handlers = EventHandlers::new()
//!     .on_open(|| println!("subscribed"))
//!     .on_message(|message: &InboundMessage| println!("{} bytes", message.len()))
//!     .on_close(|event| println!("closed with {}", event.code));
//! assert!(format!("{handlers:?}").contains("on_open: true"));
//! ```
//!
//! Every callback runs on the connection's driver task, one at a time, so a
//! slow observer delays the delivery of subsequent events.

use std::fmt;
use std::sync::Arc;

use crate::error::SocketError;
use crate::frame::{CloseEvent, InboundMessage};

/// Callback fired when a transport finishes opening.
pub type OnOpenCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback fired for every inbound data frame.
pub type OnMessageCallback = Arc<dyn Fn(&InboundMessage) + Send + Sync>;

/// Callback fired when the transport closes, expectedly or not.
pub type OnCloseCallback = Arc<dyn Fn(&CloseEvent) + Send + Sync>;

/// Callback fired for transport-level errors.
pub type OnErrorCallback = Arc<dyn Fn(&SocketError) + Send + Sync>;

/// The callback set of one connection.
#[derive(Clone, Default)]
pub struct EventHandlers {
    on_open: Option<OnOpenCallback>,
    on_message: Option<OnMessageCallback>,
    on_close: Option<OnCloseCallback>,
    on_error: Option<OnErrorCallback>,
}

impl EventHandlers {
    /// An empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the open observer.
    #[must_use]
    pub fn on_open(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(callback));
        self
    }

    /// Register the message observer.
    #[must_use]
    pub fn on_message(
        mut self,
        callback: impl Fn(&InboundMessage) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Arc::new(callback));
        self
    }

    /// Register the close observer.
    #[must_use]
    pub fn on_close(mut self, callback: impl Fn(&CloseEvent) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    /// Register the error observer.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&SocketError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub(crate) fn emit_open(&self) {
        if let Some(callback) = &self.on_open {
            callback();
        }
    }

    pub(crate) fn emit_message(&self, message: &InboundMessage) {
        if let Some(callback) = &self.on_message {
            callback(message);
        }
    }

    pub(crate) fn emit_close(&self, event: &CloseEvent) {
        if let Some(callback) = &self.on_close {
            callback(event);
        }
    }

    pub(crate) fn emit_error(&self, error: &SocketError) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn missing_observers_are_skipped() {
        let handlers = EventHandlers::new();
        handlers.emit_open();
        handlers.emit_message(&InboundMessage::Text("x".to_owned()));
        handlers.emit_close(&CloseEvent::abnormal("gone"));
        handlers.emit_error(&SocketError::Unauthorized);
        assert!(format!("{handlers:?}").contains("on_open: false"));
    }

    #[test]
    fn registered_observers_receive_events() {
        let closes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&closes);
        let handlers = EventHandlers::new().on_close(move |event| {
            assert_eq!(event.code, CloseEvent::ABNORMAL);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        handlers.emit_close(&CloseEvent::abnormal("gone"));
        handlers.emit_close(&CloseEvent::abnormal("gone again"));
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn debug_lists_registered_observers() {
        let handlers = EventHandlers::new().on_error(|_| {});
        let rendered = format!("{handlers:?}");
        assert!(rendered.contains("on_error: true"));
        assert!(rendered.contains("on_open: false"));
    }
}
