//! Sink handles owned by the publisher.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};

use crate::output::publisher::{DatagramTarget, PublishError};

/// Connectionless, unacknowledged sender for one fixed target.
#[derive(Debug)]
pub struct DatagramSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl DatagramSink {
    /// Resolve the target once and bind an ephemeral socket of the same family.
    ///
    /// The socket is non-blocking: a full send buffer drops the datagram
    /// instead of stalling the caller.
    pub fn open(target: &DatagramTarget) -> Result<Self, PublishError> {
        let resolve_err = |source| PublishError::Resolve {
            target: target.to_string(),
            source,
        };
        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(resolve_err)?
            .next()
            .ok_or_else(|| {
                resolve_err(io::Error::new(
                    io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ))
            })?;

        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).map_err(PublishError::Bind)?;
        socket.set_nonblocking(true).map_err(PublishError::Bind)?;

        Ok(Self { socket, target: addr })
    }

    /// Send `payload` as a single datagram.
    pub fn send(&self, payload: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(payload, self.target)?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("datagram truncated to {} of {} bytes", sent, payload.len()),
            ));
        }
        Ok(())
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

/// Append-only line writer.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: &Path) -> Result<Self, PublishError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| PublishError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Write one complete line. `line` must already end with a newline.
    pub fn append_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line)?;
        self.file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_datagram_sink_sends_whole_payload() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let port = server.local_addr().unwrap().port();

        let sink = DatagramSink::open(&DatagramTarget::new("127.0.0.1", port)).unwrap();
        sink.send(b"{\"a\":1}").unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"{\"a\":1}");
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "existing\n").unwrap();

        let mut sink = FileSink::open(&path).unwrap();
        sink.append_line(b"next\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nnext\n");
    }

    #[test]
    fn test_file_sink_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");

        let err = FileSink::open(&path).unwrap_err();
        assert!(matches!(err, PublishError::Open { .. }));
    }
}
