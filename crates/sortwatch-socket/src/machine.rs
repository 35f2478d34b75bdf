//! The connection state machine, free of I/O.
//!
//! [`Connection`] owns the bookkeeping of one logical push subscription:
//! the live transport (if any), the reconnect-attempt counter, the
//! manually-closed flag, and whether the heartbeat and a reconnect timer are
//! armed. Every public operation and every transport or timer event is a
//! method that updates that bookkeeping and returns the ordered list of
//! [`Effect`]s a driver must carry out. The driver in [`crate::client`]
//! executes them with tokio; tests execute them by inspection.
//!
//! # States
//!
//! ```text
//!            connect()              transport opened
//!   Idle ───────────────▶ Connecting ───────────────▶ Open
//!                            │  ▲                      │
//!        unexpected close    │  │ reconnect timer      │ unexpected close
//!                            ▼  │                      ▼
//!                       PendingRetry ◀─────────────────┘
//!                            │
//!                            │ attempt ceiling reached
//!                            ▼
//!                      RetryExhausted
//!
//!   close() from any state ─────────────────────────▶ ClosedClean
//! ```
//!
//! Each transport is tagged with a generation number. Events carrying any
//! generation other than the live one are ignored, so a transport released by
//! [`Connection::close`] can never feed events back into the machine.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::SocketError;
use crate::frame::{CloseEvent, InboundMessage, Outgoing, Payload};
use crate::options::SocketOptions;

/// Observable lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Constructed, never connected.
    Idle,
    /// A transport is being dialed.
    Connecting,
    /// A transport is open; heartbeats are running.
    Open,
    /// Closed by the caller. Terminal until the next `connect()`.
    ClosedClean,
    /// Closed unexpectedly; a reconnect is scheduled.
    PendingRetry,
    /// Closed unexpectedly with no attempts left. Terminal until the next
    /// `connect()`.
    RetryExhausted,
}

impl ConnectionState {
    /// Stable lowercase name, used in logs and output records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedClean => "closed_clean",
            Self::PendingRetry => "pending_retry",
            Self::RetryExhausted => "retry_exhausted",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event to deliver to the caller's observers.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Invoke `on_open`.
    Opened,
    /// Invoke `on_message`.
    Message(InboundMessage),
    /// Invoke `on_close`.
    Closed(CloseEvent),
    /// Invoke `on_error`.
    Error(SocketError),
}

/// Work the driver must perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new transport tagged with `generation`.
    Dial {
        /// Tag for every event the new transport produces.
        generation: u64,
    },
    /// Deliver an event to the observers.
    Notify(Notification),
    /// Arm the heartbeat timer, replacing any armed one.
    StartHeartbeat {
        /// Tick period.
        every: Duration,
    },
    /// Disarm the heartbeat timer.
    StopHeartbeat,
    /// Arm the one-shot reconnect timer.
    ScheduleReconnect {
        /// Delay before [`Connection::reconnect_due`] should be called.
        after: Duration,
        /// Which attempt this timer will start (1-based).
        attempt: u32,
    },
    /// Disarm the reconnect timer.
    CancelReconnect,
    /// Write a frame to the live transport.
    Transmit(Outgoing),
    /// Ask the live transport to close, then release it.
    Shutdown {
        /// Close code requested by the caller.
        code: Option<u16>,
        /// Close reason requested by the caller.
        reason: Option<String>,
    },
    /// Drop the handle of a transport that has already closed.
    Release,
}

/// The live transport handle as the state machine sees it.
#[derive(Debug, Clone, Copy)]
struct Transport {
    generation: u64,
    open: bool,
}

/// One logical subscription to a server push endpoint.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    url: String,
    options: SocketOptions,
    state: ConnectionState,
    transport: Option<Transport>,
    last_generation: u64,
    reconnect_attempts: u32,
    manually_closed: bool,
    heartbeat_armed: bool,
    retry_pending: bool,
}

impl Connection {
    /// Create an idle connection for `url`. No transport exists yet.
    pub fn new(url: impl Into<String>, options: SocketOptions) -> Self {
        Self {
            id: Uuid::now_v7(),
            url: url.into(),
            options,
            state: ConnectionState::Idle,
            transport: None,
            last_generation: 0,
            reconnect_attempts: 0,
            manually_closed: false,
            heartbeat_armed: false,
            retry_pending: false,
        }
    }

    /// Identifier attached to every log line of this connection.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Target address.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Effective tuning options.
    pub const fn options(&self) -> &SocketOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Automatic attempts made since the last successful open.
    pub const fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Whether the heartbeat timer is armed.
    pub const fn heartbeat_armed(&self) -> bool {
        self.heartbeat_armed
    }

    /// Whether a reconnect timer is armed.
    pub const fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Generation of the live transport, if one exists.
    pub fn live_generation(&self) -> Option<u64> {
        self.transport.map(|transport| transport.generation)
    }

    /// True exactly when a transport exists and has finished opening.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some_and(|transport| transport.open)
    }

    /// Whether `generation` names the live transport.
    pub fn is_live(&self, generation: u64) -> bool {
        self.live_generation() == Some(generation)
    }

    /// Start dialing, unless a transport already exists.
    pub fn connect(&mut self) -> Vec<Effect> {
        if let Some(transport) = self.transport {
            warn!(
                connection_id = %self.id,
                generation = transport.generation,
                "transport already present, ignoring connect"
            );
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.retry_pending {
            self.retry_pending = false;
            effects.push(Effect::CancelReconnect);
        }

        self.manually_closed = false;
        self.last_generation = self.last_generation.saturating_add(1);
        let generation = self.last_generation;
        self.transport = Some(Transport {
            generation,
            open: false,
        });
        self.state = ConnectionState::Connecting;

        debug!(connection_id = %self.id, url = self.url, generation, "dialing");
        effects.push(Effect::Dial { generation });
        effects
    }

    /// Queue `payload` on the open transport, or drop it with a diagnostic.
    pub fn send(&self, payload: Payload) -> Vec<Effect> {
        if !self.is_connected() {
            error!(
                connection_id = %self.id,
                state = %self.state,
                "socket is not connected, dropping outbound message"
            );
            return Vec::new();
        }
        vec![Effect::Transmit(payload.into_frame())]
    }

    /// Close on the caller's request. Safe in every state; suppresses any
    /// automatic reconnection, including one already scheduled.
    pub fn close(&mut self, code: Option<u16>, reason: Option<String>) -> Vec<Effect> {
        self.manually_closed = true;

        let mut effects = Vec::new();
        if self.heartbeat_armed {
            self.heartbeat_armed = false;
            effects.push(Effect::StopHeartbeat);
        }
        if self.retry_pending {
            self.retry_pending = false;
            effects.push(Effect::CancelReconnect);
        }
        if let Some(transport) = self.transport.take() {
            debug!(
                connection_id = %self.id,
                generation = transport.generation,
                "closing transport on request"
            );
            let event = CloseEvent::clean(
                code.unwrap_or(CloseEvent::NORMAL),
                reason.clone().unwrap_or_default(),
            );
            effects.push(Effect::Shutdown { code, reason });
            effects.push(Effect::Notify(Notification::Closed(event)));
        }

        self.state = ConnectionState::ClosedClean;
        effects
    }

    /// The transport tagged `generation` finished opening.
    pub fn transport_opened(&mut self, generation: u64) -> Vec<Effect> {
        match self.transport.as_mut() {
            Some(transport) if transport.generation == generation && !transport.open => {
                transport.open = true;
            }
            _ => {
                debug!(connection_id = %self.id, generation, "ignoring open from stale transport");
                return Vec::new();
            }
        }

        self.state = ConnectionState::Open;
        info!(
            connection_id = %self.id,
            generation,
            previous_attempts = self.reconnect_attempts,
            "socket open"
        );

        let mut effects = vec![Effect::Notify(Notification::Opened)];
        self.reconnect_attempts = 0;
        if self.heartbeat_armed {
            effects.push(Effect::StopHeartbeat);
        }
        self.heartbeat_armed = true;
        effects.push(Effect::StartHeartbeat {
            every: self.options.heartbeat_interval,
        });
        effects
    }

    /// The transport tagged `generation` delivered a data frame.
    pub fn transport_message(&self, generation: u64, message: InboundMessage) -> Vec<Effect> {
        if !self.is_live(generation) {
            return Vec::new();
        }
        vec![Effect::Notify(Notification::Message(message))]
    }

    /// The transport tagged `generation` reported an error. Only reported;
    /// the close that follows drives any retry.
    pub fn transport_error(&self, generation: u64, error: SocketError) -> Vec<Effect> {
        if !self.is_live(generation) {
            return Vec::new();
        }
        debug!(connection_id = %self.id, generation, error = %error, "transport error");
        vec![Effect::Notify(Notification::Error(error))]
    }

    /// The transport tagged `generation` closed.
    pub fn transport_closed(&mut self, generation: u64, event: CloseEvent) -> Vec<Effect> {
        if !self.is_live(generation) {
            debug!(connection_id = %self.id, generation, "ignoring close from stale transport");
            return Vec::new();
        }

        info!(
            connection_id = %self.id,
            generation,
            code = event.code,
            reason = event.reason,
            "socket closed"
        );
        self.transport = None;

        let mut effects = vec![Effect::Notify(Notification::Closed(event)), Effect::Release];
        if self.heartbeat_armed {
            self.heartbeat_armed = false;
            effects.push(Effect::StopHeartbeat);
        }

        if self.manually_closed {
            self.state = ConnectionState::ClosedClean;
        } else {
            self.schedule_retry(&mut effects);
        }
        effects
    }

    /// The heartbeat timer ticked.
    pub fn heartbeat_due(&self) -> Vec<Effect> {
        if !self.heartbeat_armed || !self.is_connected() {
            return Vec::new();
        }
        vec![Effect::Transmit(Outgoing::Text(
            self.options.heartbeat_message.clone(),
        ))]
    }

    /// The reconnect timer fired.
    pub fn reconnect_due(&mut self) -> Vec<Effect> {
        if !self.retry_pending || self.manually_closed {
            debug!(connection_id = %self.id, "reconnect timer no longer wanted");
            return Vec::new();
        }
        self.retry_pending = false;
        info!(
            connection_id = %self.id,
            attempt = self.reconnect_attempts,
            max_attempts = self.options.max_reconnect_attempts,
            "reconnecting"
        );
        self.connect()
    }

    fn schedule_retry(&mut self, effects: &mut Vec<Effect>) {
        if self.reconnect_attempts >= self.options.max_reconnect_attempts {
            warn!(
                connection_id = %self.id,
                attempts = self.reconnect_attempts,
                "maximum reconnect attempts reached, giving up"
            );
            self.state = ConnectionState::RetryExhausted;
            return;
        }

        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.retry_pending = true;
        self.state = ConnectionState::PendingRetry;
        effects.push(Effect::ScheduleReconnect {
            after: self.options.reconnect_interval,
            attempt: self.reconnect_attempts,
        });
    }
}
