//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::time::Duration;

use http_tap::lifecycle::Shutdown;
use http_tap::{Interceptor, TapServer};
use serde_json::Value;
use tokio::net::TcpListener;

/// Read every JSON line of a sink file.
pub fn read_records(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is one JSON object"))
        .collect()
}

/// Bind a datagram listener on an ephemeral port.
pub fn udp_listener() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

/// Receive one datagram and decode it.
pub fn recv_record(socket: &UdpSocket) -> Value {
    let mut buf = vec![0u8; 65_536];
    let (len, _) = socket.recv_from(&mut buf).expect("datagram within timeout");
    serde_json::from_slice(&buf[..len]).unwrap()
}

/// Start a tapped server on an ephemeral port.
pub async fn start_tap_server(interceptor: Interceptor) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = TapServer::new(interceptor).run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}
