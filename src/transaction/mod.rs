//! Transaction capture subsystem.
//!
//! # Data Flow
//! ```text
//! RequestMeta
//!     → interceptor.rs (seed record, run handler once, time it)
//!         handler calls start_response(status, headers)
//!         → ResponseCapture stores the signal, forwards it downstream
//!     → status_line.rs (code, phrase, high level status)
//!     → headers.rs (fold repeated names)
//!     → record.rs (TransactionRecord, immutable from here on)
//!     → output::Publish
//! ```
//!
//! # Design Decisions
//! - One record per completed handler invocation, never reused
//! - Decode failures annotate `notes` instead of failing the capture
//! - No I/O in this subsystem; sinks live behind the `Publish` trait

pub mod headers;
pub mod interceptor;
pub mod record;
pub mod status_line;

pub use headers::fold_headers;
pub use interceptor::{CapturedResponse, Interceptor, RequestMeta, ResponseCapture, StartResponse};
pub use record::{FoldedHeaders, HighLevelStatus, HttpFields, TransactionRecord};
pub use status_line::{decode_status_line, MalformedStatusLine, StatusLine};
