//! Operator tool that tails the sortwatch push channel.
//!
//! The listener keeps one reconnecting socket open to the classification
//! push endpoint and prints every socket event to stdout as a JSON line.
//! Lines typed on stdin are forwarded to the server.
//!
//! # Architecture
//!
//! ```text
//! stdin --> input --> SocketClient --> push endpoint
//!                          |
//!                     EventHandlers --> records channel --> stdout (JSON lines)
//!                          |
//!                    SessionNotice (on 401)
//! ```
//!
//! Logs go to stderr so stdout stays machine-readable.

mod config;
mod error;
mod input;
mod record;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sortwatch_socket::{EventHandlers, SocketClient, TungsteniteConnector};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ListenerConfig, LogFormat, LoggingConfig};
use crate::error::ListenerError;
use crate::record::{EventRecord, RecordedEvent};
use crate::session::{LogSessionNotice, SessionNotice};

/// How long to wait for the final close record after Ctrl-C.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Application entry point.
///
/// Loads configuration, initializes logging, connects, and prints records
/// until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration is unusable or stdout cannot be written.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("SORTWATCH_CONFIG")
        .map_or_else(|_| PathBuf::from("sortwatch.yaml"), PathBuf::from);
    let config = ListenerConfig::load(&config_path)?;

    init_logging(&config.logging);
    info!(
        config = %config_path.display(),
        url = config.endpoint.url,
        authorized = config.endpoint.auth_token.is_some(),
        "sortwatch-listener starting"
    );

    run(config).await?;

    info!("sortwatch-listener stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Route socket events into the records channel.
fn record_handlers(
    records: mpsc::UnboundedSender<EventRecord>,
    notice: Arc<dyn SessionNotice>,
) -> EventHandlers {
    let on_open = records.clone();
    let on_message = records.clone();
    let on_close = records.clone();
    let on_error = records;

    EventHandlers::new()
        .on_open(move || {
            let _ = on_open.send(EventRecord::now(RecordedEvent::Open));
        })
        .on_message(move |message| {
            let _ = on_message.send(EventRecord::now(RecordedEvent::message(message)));
        })
        .on_close(move |event| {
            let _ = on_close.send(EventRecord::now(RecordedEvent::close(event)));
        })
        .on_error(move |err| {
            if err.is_unauthorized() {
                notice.session_expired();
            }
            let _ = on_error.send(EventRecord::now(RecordedEvent::error(err)));
        })
}

async fn run(config: ListenerConfig) -> Result<(), ListenerError> {
    let (records_tx, mut records_rx) = mpsc::unbounded_channel();
    let notice: Arc<dyn SessionNotice> = Arc::new(LogSessionNotice::new());
    let handlers = record_handlers(records_tx, notice);

    let connector = TungsteniteConnector::new()
        .with_connect_timeout(Duration::from_millis(config.endpoint.connect_timeout_ms));
    let connector = match &config.endpoint.auth_token {
        Some(token) => connector.with_authorization(token.clone()),
        None => connector,
    };
    let client = SocketClient::with_connector(
        config.endpoint.url,
        handlers,
        config.socket.to_options(),
        connector,
    );
    client.connect();

    let input = tokio::spawn(input::forward_lines(
        BufReader::new(tokio::io::stdin()),
        client.clone(),
    ));

    let mut stdout = tokio::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    error!(error = %e, "failed to listen for Ctrl-C; shutting down");
                }
                info!("shutdown requested");
                break;
            }
            record = records_rx.recv() => {
                let Some(record) = record else { break };
                stdout.write_all(&record.to_line()?).await?;
                stdout.flush().await?;
            }
        }
    }

    client.close(Some(1000), Some("listener shutdown".to_owned()));
    input.abort();
    drop(client);

    // The channel closes once the driver has released the handlers.
    while let Ok(Some(record)) = tokio::time::timeout(DRAIN_TIMEOUT, records_rx.recv()).await {
        stdout.write_all(&record.to_line()?).await?;
    }
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sortwatch_socket::{
        CloseEvent, ConnectionState, Connector, SocketError, SocketOptions, TransportLink,
    };

    use super::*;

    #[derive(Default)]
    struct CountingNotice {
        expired: AtomicUsize,
    }

    impl SessionNotice for CountingNotice {
        fn session_expired(&self) {
            self.expired.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Fails every dial with the same error.
    struct Refusing(SocketError);

    impl Connector for Refusing {
        fn connect(
            &self,
            _url: &str,
        ) -> Pin<Box<dyn Future<Output = Result<TransportLink, SocketError>> + Send>> {
            let error = self.0.clone();
            Box::pin(async move { Err(error) })
        }
    }

    /// Dial once through a refusing connector and collect the two records
    /// the failure produces.
    async fn refused_with(
        error: SocketError,
        notice: Arc<CountingNotice>,
    ) -> Vec<RecordedEvent> {
        let (records_tx, mut records_rx) = mpsc::unbounded_channel();
        let handlers = record_handlers(records_tx, notice);
        let client = SocketClient::with_connector(
            "ws://sortwatch.test/ws",
            handlers,
            SocketOptions::default().with_max_reconnect_attempts(0),
            Refusing(error),
        );
        client.connect();

        let mut events = Vec::new();
        for _ in 0..2 {
            let record = tokio::time::timeout(Duration::from_secs(5), records_rx.recv())
                .await
                .unwrap()
                .unwrap();
            events.push(record.event);
        }
        assert_eq!(client.status().state, ConnectionState::RetryExhausted);
        events
    }

    #[tokio::test]
    async fn unauthorized_dial_notifies_session_and_flags_record() {
        let notice = Arc::new(CountingNotice::default());
        let events = refused_with(SocketError::Unauthorized, Arc::clone(&notice)).await;

        assert_eq!(notice.expired.load(Ordering::SeqCst), 1);
        assert_eq!(
            events,
            vec![
                RecordedEvent::Error {
                    message: SocketError::Unauthorized.to_string(),
                    session_expired: true,
                },
                RecordedEvent::Close {
                    code: CloseEvent::ABNORMAL,
                    reason: SocketError::Unauthorized.to_string(),
                    was_clean: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn other_errors_leave_the_session_alone() {
        let notice = Arc::new(CountingNotice::default());
        let error = SocketError::Transport("connection refused".to_owned());
        let events = refused_with(error.clone(), Arc::clone(&notice)).await;

        assert_eq!(notice.expired.load(Ordering::SeqCst), 0);
        assert_eq!(
            events.first(),
            Some(&RecordedEvent::Error {
                message: error.to_string(),
                session_expired: false,
            })
        );
        assert!(matches!(events.get(1), Some(RecordedEvent::Close { .. })));
    }
}
