//! Reconnecting push-channel client for the sortwatch detection service.
//!
//! The detection backend pushes classification results, notifications and
//! chat replies over a single `WebSocket`. This crate keeps that
//! subscription alive:
//!
//! - **Fixed-interval retry** after any closure the caller did not request,
//!   up to a configurable number of attempts between successful opens
//! - **Heartbeat** frames on a fixed period while the transport is open
//! - **Explicit shutdown** via [`SocketClient::close`], which also cancels a
//!   reconnect that is already scheduled
//! - **Silent drop** of messages sent while disconnected (logged, never
//!   queued, never returned as an error)
//!
//! # Architecture
//!
//! ```text
//!  SocketClient ──requests──▶ driver task ──effects──▶ Connector / timers
//!   (handles)                   │    ▲
//!                               ▼    │ events
//!                           Connection (state machine, no I/O)
//! ```
//!
//! [`Connection`] is a pure state machine that turns operations and events
//! into [`Effect`]s. The driver behind [`SocketClient`] runs on one tokio
//! task and executes those effects against a [`Connector`] (by default
//! [`TungsteniteConnector`]) and tokio timers.
//!
//! # Example
//!
//! ```no_run
//! use sortwatch_socket::{EventHandlers, SocketClient, SocketOptions};
//!
//! # async fn example() {
//! let handlers = EventHandlers::new()
//!     .on_message(|message| println!("push: {message:?}"))
//!     .on_error(|error| eprintln!("socket error: {error}"));
//!
//! let client = SocketClient::new("wss://example.com/socket", handlers, SocketOptions::default());
//! client.connect();
//! client.send(serde_json::json!({ "type": "subscribe", "topic": "detections" }));
//! # }
//! ```

pub mod client;
pub mod error;
pub mod frame;
pub mod handlers;
pub mod machine;
pub mod options;
pub mod transport;

// Re-export primary types for convenience.
pub use client::{ConnectionStatus, SocketClient};
pub use error::SocketError;
pub use frame::{CloseEvent, InboundMessage, Outgoing, Payload};
pub use handlers::EventHandlers;
pub use machine::{Connection, ConnectionState, Effect, Notification};
pub use options::SocketOptions;
pub use transport::{Connector, Incoming, TransportLink, TungsteniteConnector};
