//! Testing utilities for BEACON nodes.
//!
//! Provides registry and resolver doubles so the node lifecycle can be
//! exercised without a running registry agent.

mod mock;

pub use mock::{MockRegistry, RegistryCall, StaticResolver};

use beacon_core::service::ServiceEndpoint;

/// Endpoint pointing at a local test server.
pub fn local_endpoint(id: &str, port: u16) -> ServiceEndpoint {
    ServiceEndpoint {
        id: id.to_string(),
        address: "127.0.0.1".to_string(),
        port,
    }
}

/// Start a peer that promises a longer body than it sends, then hangs up.
///
/// Returns the port it listens on.
pub async fn spawn_truncating_peer() -> u16 {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            // Consume the request head so closing does not reset the connection.
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while read < buf.len() && !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf[read..]).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => read += n,
                }
            }
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .await;
            let _ = socket.shutdown().await;
        }
    });

    port
}
