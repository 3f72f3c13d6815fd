//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retry budget > 0, limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener is bound; a failure here is fatal at startup

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check every semantic constraint of `config`.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.dispatch.max_tries().is_none() {
        errors.push(ValidationError::new(
            "dispatch.max_tries",
            format!("must be positive, got {}", config.dispatch.max_tries),
        ));
    }

    if !is_listen_address(&config.listener.socket_address()) {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("expected host:port, got {:?}", config.listener.bind_address),
        ));
    }

    if config.listener.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be positive when set",
        ));
    }

    if config.limits.body_limit_bytes == 0 {
        errors.push(ValidationError::new("limits.body_limit_bytes", "must be positive"));
    }

    if config.limits.multipart_max_memory_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.multipart_max_memory_bytes",
            "must be positive",
        ));
    }

    if let Err(e) = EnvFilter::try_new(&config.logging.level) {
        errors.push(ValidationError::new("logging.level", e.to_string()));
    }

    if config.logging.directory.is_some()
        && config.logging.file_prefix.is_empty()
        && config.logging.file_suffix.is_empty()
    {
        errors.push(ValidationError::new(
            "logging.file_suffix",
            "file_prefix and file_suffix must not both be empty when logging.directory is set",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `ip:port`, `[v6]:port` or `hostname:port`. Host names are not resolved here.
fn is_listen_address(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_non_positive_max_tries_rejected() {
        for max_tries in [0, -1] {
            let config = ServerConfig::new("127.0.0.1:0", max_tries);
            let errors = validate_config(&config).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field, "dispatch.max_tries");
        }
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ServerConfig::new("not-an-address", 0);
        config.limits.body_limit_bytes = 0;
        config.listener.request_timeout_secs = Some(0);

        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "dispatch.max_tries",
                "listener.bind_address",
                "listener.request_timeout_secs",
                "limits.body_limit_bytes",
            ]
        );
    }

    #[test]
    fn test_accepts_host_and_bare_port_addresses() {
        for address in [":8080", "localhost:8080", "127.0.0.1:0", "[::1]:8080", "api.internal:80"] {
            let config = ServerConfig::new(address, 3);
            assert_eq!(validate_config(&config), Ok(()), "{address}");
        }
        for address in ["8080", ":", "localhost:", "localhost:http", "::1:8080", ":70000"] {
            let config = ServerConfig::new(address, 3);
            assert!(validate_config(&config).is_err(), "{address}");
        }
    }

    #[test]
    fn test_rolling_file_needs_a_name() {
        let mut config = ServerConfig::default();
        config.logging.directory = Some("/var/log/jsonhttp".into());
        assert!(validate_config(&config).is_ok());

        config.logging.file_suffix.clear();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "logging.file_suffix");
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
