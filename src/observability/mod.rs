//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Operator-facing failures (dropped datagrams, failed appends) surface here,
//!   never through the wrapped handler's result
//! - Metrics are cheap when no exporter is installed

pub mod logging;
pub mod metrics;
