//! Record publisher.
//!
//! Serializes each record once and writes it to every configured sink.
//! The datagram sink is fire-and-forget; file write failures propagate.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use thiserror::Error;

use crate::observability::metrics;
use crate::output::sink::{DatagramSink, FileSink};
use crate::transaction::TransactionRecord;

/// Port the transaction agent listens on by default.
pub const DEFAULT_UDPJSON_PORT: u16 = 9712;

/// Error type for publisher construction and publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to resolve datagram target {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to bind datagram socket: {0}")]
    Bind(#[source] io::Error),
    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize transaction: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to append transaction to {}: {source}", .path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Publisher is closed")]
    Closed,
}

/// Anything that accepts finished transaction records.
pub trait Publish: Send + Sync {
    fn publish(&self, record: TransactionRecord) -> Result<(), PublishError>;
}

/// Host and port of the datagram listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramTarget {
    pub host: String,
    pub port: u16,
}

impl DatagramTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for DatagramTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Which sinks a publisher opens. Both, either or neither may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublisherConfig {
    pub datagram_target: Option<DatagramTarget>,
    pub file_path: Option<PathBuf>,
}

/// Owns the sink set for its whole lifetime.
///
/// Shared across threads behind an `Arc`. File appends are serialized by a
/// mutex so concurrent records never interleave within a line.
#[derive(Debug)]
pub struct Publisher {
    datagram: RwLock<Option<DatagramSink>>,
    file: Mutex<Option<FileSink>>,
    closed: AtomicBool,
}

impl Publisher {
    /// Open every configured sink. Anything already opened is released if a
    /// later sink fails to open.
    pub fn new(config: PublisherConfig) -> Result<Self, PublishError> {
        let datagram = config
            .datagram_target
            .as_ref()
            .map(DatagramSink::open)
            .transpose()?;
        let file = config
            .file_path
            .as_deref()
            .map(FileSink::open)
            .transpose()?;

        tracing::info!(
            udp_target = ?datagram.as_ref().map(DatagramSink::target),
            file = ?file.as_ref().map(FileSink::path),
            "Publisher opened"
        );

        Ok(Self {
            datagram: RwLock::new(datagram),
            file: Mutex::new(file),
            closed: AtomicBool::new(false),
        })
    }

    /// Release both sinks. Calling this more than once is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let datagram = self
            .datagram
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let file = self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        drop(datagram);
        drop(file);
        tracing::debug!("Publisher closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn send_datagram(&self, payload: &[u8]) {
        let guard = self.datagram.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = guard.as_ref() {
            if let Err(e) = sink.send(payload) {
                tracing::warn!(target_addr = %sink.target(), error = %e, "Dropped transaction datagram");
                metrics::record_sink_failure("udp");
            }
        }
    }

    fn append_to_file(&self, encoded: &str) -> Result<(), PublishError> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sink) = guard.as_mut() else {
            // Closed between the entry check and here.
            return if self.is_closed() {
                Err(PublishError::Closed)
            } else {
                Ok(())
            };
        };

        let mut line = String::with_capacity(encoded.len() + 1);
        line.push_str(encoded);
        line.push('\n');

        sink.append_line(line.as_bytes()).map_err(|source| {
            metrics::record_sink_failure("file");
            PublishError::SinkWrite {
                path: sink.path().to_path_buf(),
                source,
            }
        })
    }
}

impl Publish for Publisher {
    fn publish(&self, record: TransactionRecord) -> Result<(), PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        let encoded = serde_json::to_string(&record)?;
        tracing::debug!(transaction = %encoded, "Transaction");

        self.send_datagram(encoded.as_bytes());
        self.append_to_file(&encoded)
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{RequestMeta, TransactionRecord};
    use serde_json::Value;
    use std::net::UdpSocket;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(path: &str) -> TransactionRecord {
        TransactionRecord::from_request(&RequestMeta {
            method: Some("GET".into()),
            path: Some(path.into()),
            ..RequestMeta::default()
        })
    }

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let publisher = Publisher::new(PublisherConfig {
            datagram_target: None,
            file_path: Some(path.clone()),
        })
        .unwrap();

        publisher.publish(record("/first")).unwrap();
        publisher.publish(record("/second")).unwrap();
        publisher.close();

        let objs = read_lines(&path);
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0]["path"], "/first");
        assert_eq!(objs[1]["path"], "/second");
        assert_eq!(objs[1]["count"], 1);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn test_udpjson_output() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = server.local_addr().unwrap().port();

        let publisher = Publisher::new(PublisherConfig {
            datagram_target: Some(DatagramTarget::new("127.0.0.1", port)),
            file_path: None,
        })
        .unwrap();

        publisher.publish(record("/first")).unwrap();
        publisher.publish(record("/second")).unwrap();
        drop(publisher);

        let mut objs = Vec::new();
        let mut buf = [0u8; 2048];
        for _ in 0..2 {
            let (len, _) = server.recv_from(&mut buf).unwrap();
            let decoded: TransactionRecord = serde_json::from_slice(&buf[..len]).unwrap();
            objs.push(decoded);
        }
        assert_eq!(objs[0], record("/first"));
        assert_eq!(objs[1], record("/second"));
    }

    #[test]
    fn test_unreachable_datagram_target_is_not_an_error() {
        // Bind then drop to find a port nobody listens on.
        let port = UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let publisher = Publisher::new(PublisherConfig {
            datagram_target: Some(DatagramTarget::new("127.0.0.1", port)),
            file_path: None,
        })
        .unwrap();

        for _ in 0..3 {
            assert!(publisher.publish(record("/lost")).is_ok());
        }
    }

    #[test]
    fn test_no_sinks_is_a_noop() {
        let publisher = Publisher::new(PublisherConfig::default()).unwrap();
        assert!(publisher.publish(record("/nowhere")).is_ok());
    }

    #[test]
    fn test_close_twice_and_publish_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let publisher = Publisher::new(PublisherConfig {
            datagram_target: Some(DatagramTarget::new("127.0.0.1", DEFAULT_UDPJSON_PORT)),
            file_path: Some(path.clone()),
        })
        .unwrap();

        publisher.close();
        publisher.close();
        assert!(publisher.is_closed());

        let err = publisher.publish(record("/late")).unwrap_err();
        assert!(matches!(err, PublishError::Closed));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_unresolvable_target_fails_construction() {
        let err = Publisher::new(PublisherConfig {
            datagram_target: Some(DatagramTarget::new("host.invalid", 9712)),
            file_path: None,
        })
        .unwrap_err();
        assert!(matches!(err, PublishError::Resolve { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_file_write_failure_is_returned() {
        use crate::transaction::{Interceptor, StartResponse};

        let publisher = Arc::new(
            Publisher::new(PublisherConfig {
                datagram_target: None,
                file_path: Some("/dev/full".into()),
            })
            .unwrap(),
        );

        let err = publisher.publish(record("/full")).unwrap_err();
        match err {
            PublishError::SinkWrite { path, .. } => {
                assert_eq!(path, std::path::Path::new("/dev/full"))
            }
            other => panic!("expected SinkWrite, got {:?}", other),
        }

        // The handler's result survives the failed append.
        let interceptor = Interceptor::new(publisher.clone());
        let mut downstream = |_: &str, _: &[(String, String)]| {};
        let result: Result<&str, ()> = interceptor.handle(
            &RequestMeta::default(),
            &mut downstream,
            |_, start| {
                start.start_response("200 OK", &[]);
                Ok("body")
            },
        );
        assert_eq!(result, Ok("body"));
    }

    #[test]
    fn test_concurrent_publishes_write_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let publisher = Arc::new(
            Publisher::new(PublisherConfig {
                datagram_target: None,
                file_path: Some(path.clone()),
            })
            .unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let publisher = publisher.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        publisher.publish(record(&format!("/w{}/{}", worker, i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        publisher.close();

        let objs = read_lines(&path);
        assert_eq!(objs.len(), 200);
        assert!(objs.iter().all(|obj| obj["type"] == "http"));
    }
}
