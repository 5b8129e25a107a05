//! Outbound HTTP seam used by the executor.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Any HTTP response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// No complete response was obtained: connect failure, DNS failure, a reset
/// or timeout while reading the body.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// `reqwest`-backed client; one connection pool for all calls.
#[derive(Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError {
                message: format!("GET {url}: {e}"),
                timed_out: e.is_timeout(),
            })?;
        let status = resp.status().as_u16();
        // The request timeout also bounds the body read.
        let body = resp.text().await.map_err(|e| TransportError {
            message: format!("GET {url}: reading body: {e}"),
            timed_out: e.is_timeout(),
        })?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one response on loopback: headers promising 100 bytes, a few
    /// bytes of body, then silence. Returns the URL.
    pub async fn stalling_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        });
        format!("http://{addr}/slow")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::stalling_server;
    use super::*;

    #[tokio::test]
    async fn test_stalled_body_is_transport_timeout() {
        let url = stalling_server().await;
        let err = ReqwestClient::new()
            .get(&url, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(err.timed_out, "{err}");
        assert!(err.message.contains("reading body"), "{err}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let err = ReqwestClient::new()
            .get("http://127.0.0.1:9/", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.message.starts_with("GET http://127.0.0.1:9/"));
    }
}
