//! Transaction output subsystem.
//!
//! # Data Flow
//! ```text
//! TransactionRecord
//!     → publisher.rs (serialize once to JSON)
//!         → sink.rs DatagramSink (one UDP datagram, errors swallowed)
//!         → sink.rs FileSink (one line appended, errors returned)
//! ```
//!
//! # Design Decisions
//! - Sinks are opened at construction and released by `close` or `Drop`
//! - Publishing after close fails with `PublishError::Closed`
//! - No buffering, batching or retries

pub mod publisher;
pub mod sink;

pub use publisher::{
    DatagramTarget, Publish, PublishError, Publisher, PublisherConfig, DEFAULT_UDPJSON_PORT,
};
pub use sink::{DatagramSink, FileSink};
