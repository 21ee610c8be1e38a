//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and ports
//! - Validate the log level
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TapConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::TapConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
    #[error("output.udpjson_port: port 0 is not a valid datagram target")]
    ZeroDatagramPort,
    #[error("observability.log_level: unknown level '{0}'")]
    UnknownLogLevel(String),
}

/// Check a parsed configuration, collecting every error found.
pub fn validate_config(config: &TapConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.output.udpjson_host.is_some() && config.output.udpjson_port == 0 {
        errors.push(ValidationError::ZeroDatagramPort);
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
