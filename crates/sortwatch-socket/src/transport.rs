//! The transport seam and its `tokio-tungstenite` implementation.
//!
//! A [`Connector`] dials a target address and, once the transport is open,
//! hands back a [`TransportLink`]: a pair of channels standing in for the
//! duplex socket. The driver writes [`Outgoing`] frames into one and reads
//! [`Incoming`] events from the other. Dropping the outbound sender closes
//! the transport.
//!
//! A link always ends its inbound stream with exactly one
//! [`Incoming::Closed`], optionally preceded by an [`Incoming::Error`],
//! matching the error-then-close sequence of a browser `WebSocket`.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::error::SocketError;
use crate::frame::{CloseEvent, InboundMessage, Outgoing};

/// An event produced by a live transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A data frame arrived.
    Message(InboundMessage),
    /// The transport failed; a [`Incoming::Closed`] follows.
    Error(SocketError),
    /// The transport closed. Always the last event.
    Closed(CloseEvent),
}

/// The live duplex handle of an open transport.
#[derive(Debug)]
pub struct TransportLink {
    /// Frames to write. Dropping it closes the transport.
    pub outbound: mpsc::UnboundedSender<Outgoing>,
    /// Events read from the transport.
    pub inbound: mpsc::UnboundedReceiver<Incoming>,
}

/// Opens transports to a target address.
///
/// The returned future resolves once the transport is open, or with the
/// reason it could not be opened.
pub trait Connector: Send + Sync + 'static {
    /// Dial `url`.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<TransportLink, SocketError>>;
}

/// Default deadline for the TCP connect plus the upgrade handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    authorization: Option<String>,
    connect_timeout: Duration,
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl TungsteniteConnector {
    /// A connector that sends no credentials and waits up to
    /// [`DEFAULT_CONNECT_TIMEOUT`] for the handshake.
    pub const fn new() -> Self {
        Self {
            authorization: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Give up on a handshake that has not completed within `timeout`.
    /// The attempt then fails with [`SocketError::Timeout`].
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Send `token` verbatim as the `Authorization` header of every
    /// handshake.
    #[must_use]
    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(token.into());
        self
    }
}

impl Connector for TungsteniteConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<TransportLink, SocketError>> {
        let url = url.to_owned();
        let authorization = self.authorization.clone();
        let timeout = self.connect_timeout;
        async move { dial(&url, authorization.as_deref(), timeout).await }.boxed()
    }
}

async fn dial(
    url: &str,
    authorization: Option<&str>,
    timeout: Duration,
) -> Result<TransportLink, SocketError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| SocketError::InvalidUrl(e.to_string()))?;
    if let Some(token) = authorization {
        let value = HeaderValue::from_str(token)
            .map_err(|e| SocketError::InvalidHeader(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let handshake = tokio_tungstenite::connect_async(request);
    let (socket, _response) = tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_elapsed| SocketError::Timeout(timeout))?
        .map_err(handshake_error)?;
    debug!(url, "websocket handshake complete");

    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outgoing>();
    let (inbound_tx, inbound) = mpsc::unbounded_channel::<Incoming>();

    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let (message, last) = match frame {
                Outgoing::Text(text) => (Message::Text(text.into()), false),
                Outgoing::Binary(bytes) => (Message::Binary(bytes.into()), false),
                Outgoing::Close { code, reason } => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code.unwrap_or(CloseEvent::NORMAL)),
                        reason: reason.unwrap_or_default().into(),
                    };
                    (Message::Close(Some(frame)), true)
                }
            };
            if let Err(e) = sink.send(message).await {
                debug!(error = %e, "websocket write failed");
                return;
            }
            if last {
                return;
            }
        }
        // Handle dropped without an explicit close request.
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        let mut close = None;
        while let Some(item) = stream.next().await {
            let event = match item {
                Ok(Message::Text(text)) => Incoming::Message(InboundMessage::Text(text.to_string())),
                Ok(Message::Binary(bytes)) => Incoming::Message(InboundMessage::Binary(bytes.to_vec())),
                Ok(Message::Close(frame)) => {
                    close = Some(frame.map_or_else(
                        || CloseEvent::clean(CloseEvent::NO_STATUS, ""),
                        |frame| CloseEvent::clean(u16::from(frame.code), frame.reason.to_string()),
                    ));
                    continue;
                }
                Ok(_) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                Err(e) => {
                    let _ = inbound_tx.send(Incoming::Error(SocketError::Transport(e.to_string())));
                    break;
                }
            };
            if inbound_tx.send(event).is_err() {
                return;
            }
        }
        let event = close.unwrap_or_else(|| CloseEvent::abnormal("connection lost"));
        let _ = inbound_tx.send(Incoming::Closed(event));
    });

    Ok(TransportLink { outbound, inbound })
}

/// Classify a failed handshake.
fn handshake_error(error: WsError) -> SocketError {
    match error {
        WsError::Http(response) if response.status() == StatusCode::UNAUTHORIZED => {
            SocketError::Unauthorized
        }
        WsError::Http(response) => SocketError::Handshake {
            status: response.status().as_u16(),
        },
        WsError::Url(e) => SocketError::InvalidUrl(e.to_string()),
        other => SocketError::Transport(other.to_string()),
    }
}
