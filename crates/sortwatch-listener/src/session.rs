//! Reaction to the server refusing the listener's credentials.
//!
//! The socket client keeps retrying after a `401` handshake, exactly as for
//! any other failure. What changes is that somebody has to be told the token
//! needs refreshing. That capability is passed into the error handler rather
//! than reached through a global, so tests and other front-ends can supply
//! their own.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

/// Told when the server rejects the current credentials.
pub trait SessionNotice: Send + Sync {
    /// The handshake was answered with `401 Unauthorized`.
    fn session_expired(&self);
}

/// Logs the first rejection at `warn` and later ones at `debug`.
#[derive(Debug, Default)]
pub struct LogSessionNotice {
    warned: AtomicBool,
}

impl LogSessionNotice {
    /// A notice that has not warned yet.
    pub const fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
        }
    }

    /// Whether the operator has already been warned.
    #[cfg(test)]
    pub fn has_warned(&self) -> bool {
        self.warned.load(Ordering::Relaxed)
    }
}

impl SessionNotice for LogSessionNotice {
    fn session_expired(&self) {
        if self.warned.swap(true, Ordering::Relaxed) {
            debug!("push endpoint still rejects the configured token");
        } else {
            warn!("push endpoint rejected the configured token; refresh SORTWATCH_TOKEN");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warns_once() {
        let notice = LogSessionNotice::new();
        assert!(!notice.has_warned());
        notice.session_expired();
        notice.session_expired();
        assert!(notice.has_warned());
    }
}
