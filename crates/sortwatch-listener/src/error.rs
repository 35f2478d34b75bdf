//! Error types for the listener binary.

use crate::config::ConfigError;

/// Top-level error for the listener.
///
/// Socket failures never appear here: they are reported as output records
/// and retried by the client.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Writing records to stdout failed.
    #[error("output error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("record serialization error: {source}")]
    Json {
        /// The underlying serializer error.
        #[from]
        source: serde_json::Error,
    },
}
