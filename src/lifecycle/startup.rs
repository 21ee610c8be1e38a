//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Open the publisher's sinks
//! - Bind the listener and serve until shutdown
//! - Close the publisher on every exit path (via `SinkGuard`)
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when sinks are open)

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::TapConfig;
use crate::lifecycle::shutdown::SinkGuard;
use crate::http::TapServer;
use crate::observability::metrics;
use crate::output::{PublishError, Publisher};
use crate::transaction::Interceptor;

/// Error type for startup and serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid metrics address: {0}")]
    MetricsAddress(#[from] AddrParseError),
    #[error("Failed to start metrics exporter: {0}")]
    Metrics(#[from] BuildError),
    #[error("Failed to open publisher: {0}")]
    Publisher(#[from] PublishError),
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bring the tap up and serve until `shutdown` fires.
pub async fn run(
    config: TapConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let sinks = SinkGuard::new(Arc::new(Publisher::new(config.output.publisher_config())?));

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let server = TapServer::new(Interceptor::new(sinks.publisher()));
    let result = server.run(listener, shutdown).await;

    drop(sinks);
    result.map_err(StartupError::Serve)
}
