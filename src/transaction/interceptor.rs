//! Handler interception.
//!
//! # Responsibilities
//! - Seed a transaction record from request metadata
//! - Invoke the wrapped handler exactly once, observing its response start
//! - Time the invocation
//! - Hand the finished record to the publisher
//!
//! # Design Decisions
//! - Capture state lives in a `ResponseCapture` owned by one `handle` call
//! - Only status line decoding is recovered locally; handler errors pass through
//! - Publish failures are reported to operators, never to the handler's caller

use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;
use crate::output::Publish;
use crate::transaction::record::TransactionRecord;

/// Request metadata the record is seeded from.
///
/// Every field is optional; a field the host could not supply stays absent
/// in the emitted record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: Option<String>,
    /// Path component only, without the query string.
    pub path: Option<String>,
    /// Server-side port.
    pub port: Option<u16>,
    pub client_port: Option<u16>,
    pub client_ip: Option<String>,
}

/// The response-start signal a handler raises before producing a body.
pub trait StartResponse {
    fn start_response(&mut self, status: &str, headers: &[(String, String)]);
}

impl<F> StartResponse for F
where
    F: FnMut(&str, &[(String, String)]),
{
    fn start_response(&mut self, status: &str, headers: &[(String, String)]) {
        self(status, headers)
    }
}

/// What the handler signalled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedResponse {
    pub status_line: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// Records the response start and forwards it unchanged downstream.
pub struct ResponseCapture<'a> {
    captured: CapturedResponse,
    downstream: &'a mut dyn StartResponse,
}

impl<'a> ResponseCapture<'a> {
    pub fn new(downstream: &'a mut dyn StartResponse) -> Self {
        Self {
            captured: CapturedResponse::default(),
            downstream,
        }
    }

    pub fn into_captured(self) -> CapturedResponse {
        self.captured
    }
}

impl StartResponse for ResponseCapture<'_> {
    fn start_response(&mut self, status: &str, headers: &[(String, String)]) {
        // Last signal wins if the handler restarts its response.
        self.captured.status_line = Some(status.to_string());
        self.captured.headers = headers.to_vec();
        self.downstream.start_response(status, headers);
    }
}

/// Wraps handlers and publishes one record per completed invocation.
#[derive(Clone)]
pub struct Interceptor {
    publisher: Arc<dyn Publish>,
}

impl Interceptor {
    pub fn new(publisher: Arc<dyn Publish>) -> Self {
        Self { publisher }
    }

    /// Run `handler` once for `request`, capturing and publishing the transaction.
    ///
    /// The handler's result is returned untouched. An `Err` from the handler is
    /// propagated immediately and nothing is published for it.
    pub fn handle<T, E, H>(
        &self,
        request: &RequestMeta,
        start_response: &mut dyn StartResponse,
        handler: H,
    ) -> Result<T, E>
    where
        H: FnOnce(&RequestMeta, &mut dyn StartResponse) -> Result<T, E>,
    {
        let record = TransactionRecord::from_request(request);
        let mut capture = ResponseCapture::new(start_response);

        let started = Instant::now();
        let output = handler(request, &mut capture)?;
        let elapsed = started.elapsed();

        self.emit(record.complete(capture.into_captured(), elapsed));
        Ok(output)
    }

    /// Publish a finished record. Failures are logged and counted, not returned.
    pub fn emit(&self, record: TransactionRecord) {
        metrics::record_transaction(&record);

        if let Err(e) = self.publisher.publish(record) {
            tracing::error!(error = %e, "Failed to publish transaction");
            metrics::record_publish_failure();
        }
    }
}
