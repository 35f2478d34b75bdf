//! Tuning options for a [`SocketClient`](crate::SocketClient).
//!
//! Every option has a default; callers override only the ones they care
//! about:
//!
//! ```
//! use std::time::Duration;
//! use sortwatch_socket::SocketOptions;
//!
//! let options = SocketOptions::default()
//!     .with_reconnect_interval(Duration::from_millis(500))
//!     .with_max_reconnect_attempts(10);
//! assert_eq!(options.heartbeat_message, "ping");
//! ```

use std::time::Duration;

/// Default delay before each reconnection attempt.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Default cap on automatic reconnection attempts after an unexpected close.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default period between keepalive sends while the transport is open.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20_000);

/// Default keepalive payload.
pub const DEFAULT_HEARTBEAT_MESSAGE: &str = "ping";

/// Retry and keepalive settings for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Fixed delay before each reconnection attempt (no backoff).
    pub reconnect_interval: Duration,
    /// Maximum number of automatic retries between two successful opens.
    pub max_reconnect_attempts: u32,
    /// Period between heartbeat sends while open.
    pub heartbeat_interval: Duration,
    /// Text frame sent on every heartbeat tick.
    pub heartbeat_message: String,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_message: DEFAULT_HEARTBEAT_MESSAGE.to_owned(),
        }
    }
}

impl SocketOptions {
    /// Override the reconnect delay.
    #[must_use]
    pub const fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Override the reconnect attempt ceiling.
    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Override the heartbeat period.
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override the heartbeat payload.
    #[must_use]
    pub fn with_heartbeat_message(mut self, message: impl Into<String>) -> Self {
        self.heartbeat_message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_options_use_defaults() {
        let options = SocketOptions::default();
        assert_eq!(options.reconnect_interval, Duration::from_millis(3000));
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options.heartbeat_interval, Duration::from_millis(20_000));
        assert_eq!(options.heartbeat_message, "ping");
    }

    #[test]
    fn overriding_one_option_keeps_the_rest() {
        let options = SocketOptions::default().with_max_reconnect_attempts(2);
        assert_eq!(options.max_reconnect_attempts, 2);
        assert_eq!(options.reconnect_interval, DEFAULT_RECONNECT_INTERVAL);
        assert_eq!(options.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(options.heartbeat_message, DEFAULT_HEARTBEAT_MESSAGE);
    }

    #[test]
    fn heartbeat_message_accepts_owned_and_borrowed() {
        let borrowed = SocketOptions::default().with_heartbeat_message("hb");
        let owned = SocketOptions::default().with_heartbeat_message(String::from("hb"));
        assert_eq!(borrowed, owned);
    }
}
