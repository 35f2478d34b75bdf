//! Configuration loading for the listener.
//!
//! Configuration lives in a YAML file (`sortwatch.yaml` unless
//! `SORTWATCH_CONFIG` names another). Every field has a default, so a
//! missing file, an empty file and a partial file are all valid. A few
//! environment variables override the file:
//!
//! - `SORTWATCH_WS_URL` overrides `endpoint.url`
//! - `SORTWATCH_TOKEN` overrides `endpoint.auth_token`
//! - `SORTWATCH_LOG` overrides `logging.level`

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use sortwatch_socket::SocketOptions;
use sortwatch_socket::options::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_MESSAGE, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_INTERVAL,
};
use sortwatch_socket::transport::DEFAULT_CONNECT_TIMEOUT;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level listener configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    /// Where to connect and with which credentials.
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Retry and keepalive tuning.
    #[serde(default)]
    pub socket: SocketConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ListenerConfig {
    /// Load from `path`, falling back to defaults when the file does not
    /// exist, then apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::parse(&contents)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SORTWATCH_WS_URL") {
            self.endpoint.url = url;
        }
        if let Some(token) = lookup("SORTWATCH_TOKEN") {
            self.endpoint.auth_token = Some(token).filter(|token| !token.is_empty());
        }
        if let Some(level) = lookup("SORTWATCH_LOG") {
            self.logging.level = level;
        }
    }

    /// Reject values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.url.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint.url is empty".to_owned()));
        }
        if self.endpoint.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "endpoint.connect_timeout_ms must be positive".to_owned(),
            ));
        }
        if self.socket.reconnect_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "socket.reconnect_interval_ms must be positive".to_owned(),
            ));
        }
        if self.socket.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "socket.heartbeat_interval_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Push endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    /// `ws://` or `wss://` address of the push endpoint.
    #[serde(default = "default_url")]
    pub url: String,

    /// Value sent verbatim as the `Authorization` header, if any.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Deadline for each connection handshake.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            auth_token: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Socket tuning, in the units operators write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SocketConfig {
    /// Delay before each reconnection attempt.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Cap on automatic retries after an unexpected closure.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Period between heartbeat sends while connected.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Heartbeat payload.
    #[serde(default = "default_heartbeat_message")]
    pub heartbeat_message: String,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_message: default_heartbeat_message(),
        }
    }
}

impl SocketConfig {
    /// Convert to the client's tuning options.
    pub fn to_options(&self) -> SocketOptions {
        SocketOptions::default()
            .with_reconnect_interval(Duration::from_millis(self.reconnect_interval_ms))
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_interval_ms))
            .with_heartbeat_message(self.heartbeat_message.clone())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_url() -> String {
    "ws://localhost:8080/ws".to_owned()
}

fn default_connect_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_CONNECT_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

fn default_reconnect_interval_ms() -> u64 {
    u64::try_from(DEFAULT_RECONNECT_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

const fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_heartbeat_interval_ms() -> u64 {
    u64::try_from(DEFAULT_HEARTBEAT_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

fn default_heartbeat_message() -> String {
    DEFAULT_HEARTBEAT_MESSAGE.to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_client_defaults() {
        let config = ListenerConfig::default();
        assert_eq!(config.socket.to_options(), SocketOptions::default());
        assert_eq!(config.endpoint.auth_token, None);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
endpoint:
  url: "wss://sort.example.com/api/ws"
  auth_token: "Bearer abc"
  connect_timeout_ms: 2500

socket:
  reconnect_interval_ms: 1500
  max_reconnect_attempts: 8
  heartbeat_interval_ms: 10000
  heartbeat_message: '{"type":"ping"}'

logging:
  level: "debug"
  format: "json"
"#;

        let config = ListenerConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.endpoint.url, "wss://sort.example.com/api/ws");
        assert_eq!(config.endpoint.auth_token.as_deref(), Some("Bearer abc"));
        assert_eq!(config.endpoint.connect_timeout_ms, 2500);
        assert_eq!(config.socket.max_reconnect_attempts, 8);
        assert_eq!(config.logging.format, LogFormat::Json);

        let options = config.socket.to_options();
        assert_eq!(options.reconnect_interval, Duration::from_millis(1500));
        assert_eq!(options.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(options.heartbeat_message, r#"{"type":"ping"}"#);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = ListenerConfig::parse("socket:\n  max_reconnect_attempts: 1\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.socket.max_reconnect_attempts, 1);
        assert_eq!(config.socket.reconnect_interval_ms, 3000);
        assert_eq!(config.socket.heartbeat_interval_ms, 20_000);
        assert_eq!(config.endpoint, EndpointConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = ListenerConfig::parse("");
        assert!(matches!(config, Ok(ref parsed) if *parsed == ListenerConfig::default()));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let config = ListenerConfig::parse("socket: [unclosed");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = ListenerConfig::default();
        config.apply_overrides(|name| match name {
            "SORTWATCH_WS_URL" => Some("ws://10.0.0.5:9000/ws".to_owned()),
            "SORTWATCH_TOKEN" => Some("Bearer fresh".to_owned()),
            _ => None,
        });

        assert_eq!(config.endpoint.url, "ws://10.0.0.5:9000/ws");
        assert_eq!(config.endpoint.auth_token.as_deref(), Some("Bearer fresh"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn empty_token_override_clears_the_token() {
        let mut config = ListenerConfig::default();
        config.endpoint.auth_token = Some("Bearer stale".to_owned());
        config.apply_overrides(|name| (name == "SORTWATCH_TOKEN").then(String::new));
        assert_eq!(config.endpoint.auth_token, None);
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let mut config = ListenerConfig::default();
        config.socket.heartbeat_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ListenerConfig::default();
        config.socket.reconnect_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ListenerConfig::default();
        config.endpoint.connect_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_means_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("does-not-exist.yaml");
        let config = ListenerConfig::load(&path);
        assert!(config.is_ok(), "unexpected error: {config:?}");
    }
}
