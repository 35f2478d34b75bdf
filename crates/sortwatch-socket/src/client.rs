//! Tokio driver for a [`Connection`].
//!
//! [`SocketClient`] is a cheap, cloneable handle. Constructing one spawns a
//! single driver task that owns the state machine, the live transport, the
//! heartbeat interval and the reconnect timer. Handle methods only enqueue a
//! request, so they never block and never fail; outcomes are reported through
//! the [`EventHandlers`] and the published [`ConnectionStatus`].
//!
//! Because one task executes every request, transport event, timer tick and
//! observer callback in turn, none of them ever run concurrently with each
//! other.
//!
//! The driver stops when the last handle is dropped, closing the transport
//! first. A handle captured inside one of the observers keeps the driver
//! alive, so such callers must call [`SocketClient::close`] explicitly.

use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Interval, MissedTickBehavior, Sleep};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::error::SocketError;
use crate::frame::{CloseEvent, Outgoing, Payload};
use crate::handlers::EventHandlers;
use crate::machine::{Connection, ConnectionState, Effect, Notification};
use crate::options::SocketOptions;
use crate::transport::{Connector, Incoming, TransportLink, TungsteniteConnector};

/// Snapshot of a connection, published after every event the driver
/// processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Automatic attempts made since the last successful open.
    pub reconnect_attempts: u32,
}

impl ConnectionStatus {
    fn of(connection: &Connection) -> Self {
        Self {
            state: connection.state(),
            reconnect_attempts: connection.reconnect_attempts(),
        }
    }
}

/// Requests from handles to the driver.
#[derive(Debug)]
enum Request {
    Connect,
    Send(Payload),
    Close {
        code: Option<u16>,
        reason: Option<String>,
    },
}

/// Outcome of a dial, delivered back to the driver.
struct Dialed {
    generation: u64,
    result: Result<TransportLink, SocketError>,
}

/// The transport the driver currently holds.
struct LiveLink {
    generation: u64,
    outbound: mpsc::UnboundedSender<Outgoing>,
    inbound: mpsc::UnboundedReceiver<Incoming>,
}

/// What woke the driver up.
enum Wake {
    Request(Request),
    HandlesDropped,
    Dialed(Dialed),
    Transport(u64, Incoming),
    Heartbeat,
    Reconnect,
}

/// Handle to a reconnecting push-channel subscription.
#[derive(Debug, Clone)]
pub struct SocketClient {
    id: Uuid,
    requests: mpsc::UnboundedSender<Request>,
    status: watch::Receiver<ConnectionStatus>,
}

impl SocketClient {
    /// Create an idle client for `url` using the `tokio-tungstenite`
    /// transport. Must be called from within a tokio runtime.
    pub fn new(url: impl Into<String>, handlers: EventHandlers, options: SocketOptions) -> Self {
        Self::with_connector(url, handlers, options, TungsteniteConnector::new())
    }

    /// Create an idle client for `url` that dials through `connector`.
    /// Must be called from within a tokio runtime.
    pub fn with_connector<C: Connector>(
        url: impl Into<String>,
        handlers: EventHandlers,
        options: SocketOptions,
        connector: C,
    ) -> Self {
        let connection = Connection::new(url, options);
        let id = connection.id();
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionStatus::of(&connection));
        let (dialed_tx, dialed_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            connection,
            handlers,
            connector,
            requests: requests_rx,
            dialed_tx,
            dialed_rx,
            status: status_tx,
            link: None,
            heartbeat: None,
            reconnect: None,
        };
        tokio::spawn(driver.run().instrument(info_span!("socket", connection_id = %id)));

        Self {
            id,
            requests,
            status,
        }
    }

    /// Identifier attached to every log line of this connection.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Open the transport. Ignored (with a warning) while one exists.
    pub fn connect(&self) {
        self.request(Request::Connect);
    }

    /// Transmit `payload` if the transport is open; otherwise it is dropped
    /// and an error is logged. Nothing is queued for later delivery.
    pub fn send(&self, payload: impl Into<Payload>) {
        self.request(Request::Send(payload.into()));
    }

    /// Close the transport and suppress automatic reconnection.
    pub fn close(&self, code: Option<u16>, reason: Option<String>) {
        self.request(Request::Close { code, reason });
    }

    /// Whether the transport is open, as of the last processed event.
    pub fn is_connected(&self) -> bool {
        self.status.borrow().state == ConnectionState::Open
    }

    /// Latest published status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    fn request(&self, request: Request) {
        if self.requests.send(request).is_err() {
            warn!(connection_id = %self.id, "socket driver has stopped, request dropped");
        }
    }
}

struct Driver<C> {
    connection: Connection,
    handlers: EventHandlers,
    connector: C,
    requests: mpsc::UnboundedReceiver<Request>,
    dialed_tx: mpsc::UnboundedSender<Dialed>,
    dialed_rx: mpsc::UnboundedReceiver<Dialed>,
    status: watch::Sender<ConnectionStatus>,
    link: Option<LiveLink>,
    heartbeat: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        debug!(url = self.connection.url(), "socket driver started");
        loop {
            let wake = tokio::select! {
                request = self.requests.recv() => {
                    request.map_or(Wake::HandlesDropped, Wake::Request)
                }
                Some(dialed) = self.dialed_rx.recv() => Wake::Dialed(dialed),
                (generation, event) = next_incoming(self.link.as_mut()) => {
                    Wake::Transport(generation, event)
                }
                () = next_heartbeat(self.heartbeat.as_mut()) => Wake::Heartbeat,
                () = reconnect_elapsed(self.reconnect.as_mut()) => Wake::Reconnect,
            };

            let effects = match wake {
                Wake::Request(Request::Connect) => self.connection.connect(),
                Wake::Request(Request::Send(payload)) => self.connection.send(payload),
                Wake::Request(Request::Close { code, reason }) => {
                    self.connection.close(code, reason)
                }
                Wake::HandlesDropped => {
                    let effects = self.connection.close(None, None);
                    self.execute(effects);
                    debug!("all handles dropped, socket driver stopped");
                    return;
                }
                Wake::Dialed(dialed) => self.on_dialed(dialed),
                Wake::Transport(generation, Incoming::Message(message)) => {
                    self.connection.transport_message(generation, message)
                }
                Wake::Transport(generation, Incoming::Error(error)) => {
                    self.connection.transport_error(generation, error)
                }
                Wake::Transport(generation, Incoming::Closed(event)) => {
                    self.connection.transport_closed(generation, event)
                }
                Wake::Heartbeat => self.connection.heartbeat_due(),
                Wake::Reconnect => {
                    self.reconnect = None;
                    self.connection.reconnect_due()
                }
            };
            self.execute(effects);
        }
    }

    fn on_dialed(&mut self, dialed: Dialed) -> Vec<Effect> {
        let Dialed { generation, result } = dialed;
        match result {
            Ok(TransportLink { outbound, inbound }) => {
                if !self.connection.is_live(generation) {
                    // Released while dialing; dropping the link closes it.
                    debug!(generation, "discarding transport opened after release");
                    return Vec::new();
                }
                self.link = Some(LiveLink {
                    generation,
                    outbound,
                    inbound,
                });
                self.connection.transport_opened(generation)
            }
            Err(error) => {
                let event = CloseEvent::abnormal(error.to_string());
                let mut effects = self.connection.transport_error(generation, error);
                effects.extend(self.connection.transport_closed(generation, event));
                effects
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        // Observers see the state the event produced.
        self.publish();
        for effect in effects {
            match effect {
                Effect::Dial { generation } => self.dial(generation),
                Effect::Notify(notification) => self.notify(&notification),
                Effect::StartHeartbeat { every } => self.start_heartbeat(every),
                Effect::StopHeartbeat => self.heartbeat = None,
                Effect::ScheduleReconnect { after, attempt } => {
                    debug!(attempt, delay_ms = after.as_millis(), "reconnect scheduled");
                    self.reconnect = Some(Box::pin(time::sleep(after)));
                }
                Effect::CancelReconnect => self.reconnect = None,
                Effect::Transmit(frame) => self.transmit(frame),
                Effect::Shutdown { code, reason } => {
                    if let Some(link) = self.link.take() {
                        let _ = link.outbound.send(Outgoing::Close { code, reason });
                    }
                }
                Effect::Release => self.link = None,
            }
        }
    }

    fn publish(&self) {
        let next = ConnectionStatus::of(&self.connection);
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn dial(&self, generation: u64) {
        let pending = self.connector.connect(self.connection.url());
        let dialed_tx = self.dialed_tx.clone();
        tokio::spawn(async move {
            let result = pending.await;
            let _ = dialed_tx.send(Dialed { generation, result });
        });
    }

    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::Opened => self.handlers.emit_open(),
            Notification::Message(message) => self.handlers.emit_message(message),
            Notification::Closed(event) => self.handlers.emit_close(event),
            Notification::Error(error) => self.handlers.emit_error(error),
        }
    }

    fn start_heartbeat(&mut self, every: Duration) {
        if every.is_zero() {
            warn!("zero heartbeat interval, heartbeat disabled");
            self.heartbeat = None;
            return;
        }
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick one full period from now, not immediately.
        interval.reset();
        self.heartbeat = Some(interval);
    }

    fn transmit(&self, frame: Outgoing) {
        match &self.link {
            Some(link) => {
                if link.outbound.send(frame).is_err() {
                    debug!(generation = link.generation, "transport writer gone, frame dropped");
                }
            }
            None => debug!("no transport held, frame dropped"),
        }
    }
}

async fn next_incoming(link: Option<&mut LiveLink>) -> (u64, Incoming) {
    match link {
        Some(link) => {
            let event = link.inbound.recv().await.unwrap_or_else(|| {
                Incoming::Closed(CloseEvent::abnormal("transport ended without close"))
            });
            (link.generation, event)
        }
        None => std::future::pending().await,
    }
}

async fn next_heartbeat(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn reconnect_elapsed(sleep: Option<&mut Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
