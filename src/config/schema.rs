//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::num::NonZeroU32;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 32 MiB, the memory bound for buffered bodies and multipart forms.
pub const DEFAULT_MAX_MEMORY: u64 = 32 << 20;

/// Root configuration for a jsonhttp server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, transport timeout).
    pub listener: ListenerConfig,

    /// Retry budget and transient-failure settings.
    pub dispatch: DispatchConfig,

    /// Request body limits.
    pub limits: LimitsConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Configuration with the given address and retry budget, defaults elsewhere.
    pub fn new(bind_address: impl Into<String>, max_tries: i64) -> Self {
        let mut config = Self::default();
        config.listener.bind_address = bind_address.into();
        config.dispatch.max_tries = max_tries;
        config
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address: `host:port`, `ip:port`, or `:port` for every interface.
    pub bind_address: String,

    /// Transport-level request timeout. The dispatch loop imposes none of its own.
    pub request_timeout_secs: Option<u64>,
}

impl ListenerConfig {
    /// The address handed to the socket layer; a bare `:port` binds `0.0.0.0`.
    pub fn socket_address(&self) -> String {
        match self.bind_address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.bind_address.clone(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum handler invocations per request while transient failures keep occurring.
    ///
    /// Signed so that a negative value in a config file reaches validation
    /// instead of failing as a parse error.
    pub max_tries: i64,

    /// SQLSTATE codes that a `SqlStateClassifier` built from this config treats as transient.
    pub transient_sqlstates: Vec<String>,
}

impl DispatchConfig {
    /// The retry budget, or `None` when it is not a positive `u32`.
    pub fn max_tries(&self) -> Option<NonZeroU32> {
        u32::try_from(self.max_tries).ok().and_then(NonZeroU32::new)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            transient_sqlstates: vec!["40001".to_string(), "55P03".to_string()],
        }
    }
}

/// Request body limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a buffered JSON request body.
    pub body_limit_bytes: usize,

    /// Maximum size of a multipart form body.
    pub multipart_max_memory_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            body_limit_bytes: DEFAULT_MAX_MEMORY as usize,
            multipart_max_memory_bytes: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set (e.g. "info" or "jsonhttp=debug").
    pub level: String,

    /// Line format.
    pub format: LogFormat,

    /// Directory for daily-rotated log files. Logs go to stdout when unset.
    pub directory: Option<PathBuf>,

    /// File name prefix for rotated log files; empty for date-only names.
    pub file_prefix: String,

    /// File name suffix for rotated log files.
    pub file_suffix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
            directory: None,
            file_prefix: String::new(),
            file_suffix: "log".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("[dispatch]\nmax_tries = 5\n").unwrap();
        assert_eq!(config.dispatch.max_tries, 5);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.limits.multipart_max_memory_bytes, 32 * 1024 * 1024);
        assert_eq!(config.dispatch.transient_sqlstates, vec!["40001", "55P03"]);
        assert_eq!(config.logging.format, LogFormat::Plain);
    }

    #[test]
    fn test_socket_address_expands_bare_port() {
        let mut listener = ListenerConfig::default();
        listener.bind_address = ":8080".to_string();
        assert_eq!(listener.socket_address(), "0.0.0.0:8080");

        listener.bind_address = "localhost:8080".to_string();
        assert_eq!(listener.socket_address(), "localhost:8080");
    }

    #[test]
    fn test_max_tries_conversion() {
        let mut dispatch = DispatchConfig::default();
        assert_eq!(dispatch.max_tries().map(NonZeroU32::get), Some(3));

        dispatch.max_tries = 0;
        assert!(dispatch.max_tries().is_none());

        dispatch.max_tries = -2;
        assert!(dispatch.max_tries().is_none());
    }
}
