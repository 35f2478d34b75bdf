//! Error types for the push-channel client.
//!
//! [`SocketError`] never escapes the public contract methods of
//! [`SocketClient`](crate::SocketClient). It is delivered to the caller only
//! through the `on_error` observer, which is why it is `Clone` and carries
//! rendered messages instead of the underlying transport errors.

use std::time::Duration;

/// Failures reported by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    /// The target address could not be turned into a handshake request.
    #[error("invalid socket url: {0}")]
    InvalidUrl(String),

    /// The configured authorization token is not a valid header value.
    #[error("invalid authorization header: {0}")]
    InvalidHeader(String),

    /// The server rejected the handshake with `401 Unauthorized`.
    #[error("handshake rejected: session is not authorized")]
    Unauthorized,

    /// The server answered the handshake with a non-upgrade HTTP status.
    #[error("handshake rejected with HTTP status {status}")]
    Handshake {
        /// The HTTP status code returned by the server.
        status: u16,
    },

    /// The server accepted the connection but did not finish the handshake
    /// in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O or protocol failure on an established or pending transport.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SocketError {
    /// Whether this error means the caller's credentials need refreshing.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
