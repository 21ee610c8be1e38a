//! Transaction record emitted once per intercepted request.
//!
//! # Encoding
//! ```text
//! {"type":"http","count":1,"method":"GET","path":"/users","port":8080,
//!  "client_port":45321,"client_ip":"127.0.0.1","status":"OK",
//!  "http":{"code":200,"phrase":"OK","response_headers":{"Content-Type":"json"}},
//!  "responsetime":112,"notes":""}
//! ```
//!
//! Absent request fields and an undecodable status line are omitted from the
//! encoding rather than written as `null`.

use std::fmt;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::transaction::headers::fold_headers;
use crate::transaction::interceptor::{CapturedResponse, RequestMeta};
use crate::transaction::status_line::{decode_status_line, StatusLine};

/// Value of the `type` field.
pub const TRANSACTION_TYPE: &str = "http";

/// Coarse classification of a response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighLevelStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Client Error")]
    ClientError,
    #[serde(rename = "Server Error")]
    ServerError,
    #[serde(rename = "Error")]
    Error,
}

impl HighLevelStatus {
    /// Classify a numeric status code.
    ///
    /// Boundaries sit one below the usual HTTP class boundaries: 399 is
    /// already a client error, 499 a server error and 599 an error.
    pub fn from_code(code: u64) -> Self {
        if code < 399 {
            HighLevelStatus::Ok
        } else if code < 499 {
            HighLevelStatus::ClientError
        } else if code < 599 {
            HighLevelStatus::ServerError
        } else {
            HighLevelStatus::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HighLevelStatus::Ok => "OK",
            HighLevelStatus::ClientError => "Client Error",
            HighLevelStatus::ServerError => "Server Error",
            HighLevelStatus::Error => "Error",
        }
    }
}

impl fmt::Display for HighLevelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response headers after folding, in first-seen order.
///
/// Serialized as a JSON object whose key order follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldedHeaders {
    entries: Vec<(String, String)>,
}

impl FoldedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, comma-joining onto an existing value of the same name.
    pub fn append(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, joined)) => {
                joined.push_str(", ");
                joined.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a header by its exact (case-sensitive) name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Serialize for FoldedHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FoldedHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = FoldedHeaders;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut headers = FoldedHeaders::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.append(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeadersVisitor)
    }
}

/// The nested `http` object of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrase: Option<String>,
    #[serde(default)]
    pub response_headers: FoldedHeaders,
}

/// One captured request/response transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HighLevelStatus>,
    #[serde(default)]
    pub http: HttpFields,
    /// Elapsed handler time in whole microseconds.
    pub responsetime: u64,
    #[serde(default)]
    pub notes: String,
}

impl TransactionRecord {
    /// Seed a record from request metadata. Nothing is validated or defaulted.
    pub fn from_request(request: &RequestMeta) -> Self {
        Self {
            kind: TRANSACTION_TYPE.to_string(),
            count: 1,
            method: request.method.clone(),
            path: request.path.clone(),
            port: request.port,
            client_port: request.client_port,
            client_ip: request.client_ip.clone(),
            status: None,
            http: HttpFields::default(),
            responsetime: 0,
            notes: String::new(),
        }
    }

    /// Merge the captured response and elapsed time into the seeded record.
    ///
    /// A status line that fails to decode leaves the status fields absent and
    /// is recorded in `notes`; it never aborts the capture.
    pub fn complete(mut self, captured: CapturedResponse, elapsed: Duration) -> Self {
        match captured.status_line {
            Some(line) => match decode_status_line(&line) {
                Ok(status) => self.apply_status_line(status),
                Err(err) => {
                    tracing::debug!(error = %err, "Status line not decoded");
                    crate::observability::metrics::record_decode_failure();
                    self.add_note(format!("{}.", err));
                }
            },
            None => self.add_note("No status line was captured from the handler."),
        }

        self.http.response_headers = fold_headers(captured.headers);
        self.responsetime = elapsed_micros(elapsed);
        self
    }

    /// Set `status`, `http.code` and `http.phrase` together.
    pub fn apply_status_line(&mut self, status: StatusLine) {
        self.status = Some(status.status);
        self.http.code = Some(status.code);
        self.http.phrase = Some(status.phrase);
    }

    /// Append a diagnostic sentence to `notes`.
    pub fn add_note(&mut self, note: impl AsRef<str>) {
        if !self.notes.is_empty() {
            self.notes.push(' ');
        }
        self.notes.push_str(note.as_ref());
    }
}

/// Seconds scaled by one million, truncated toward zero.
fn elapsed_micros(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1e6) as u64
}
