//! Structured logging.
//!
//! `RUST_LOG` takes precedence over the configured level. JSON output is
//! meant for production, pretty output for development.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Install the global tracing subscriber.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("http_tap={},tower_http=info", config.log_level)));

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
}
