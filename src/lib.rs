//! HTTP transaction tap.
//!
//! Wraps request handlers, turns every request/response pair into a
//! `TransactionRecord` and publishes it as JSON over UDP and/or to an
//! append-only file.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod output;
pub mod transaction;

pub use config::TapConfig;
pub use http::{tap, TapServer, TapState};
pub use output::{Publish, PublishError, Publisher, PublisherConfig};
pub use transaction::{Interceptor, RequestMeta, StartResponse, TransactionRecord};
