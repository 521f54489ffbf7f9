use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::utils::UrlUtils;

/// A transport-level failure (DNS, TLS, connection reset, body read)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Status and fully-read body of one GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The single outbound seam of the fetcher
///
/// Implementations perform exactly one GET with the given headers and read
/// the whole body; retry, timeout and fallback policy live in the fetcher.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by reqwest
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with only a connection timeout; the fetcher bounds
    /// each whole attempt itself
    pub fn with_connection_timeout(connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::with_connection_timeout(Duration::from_secs(10))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            TransportError::new(UrlUtils::obfuscate_credentials(&e.to_string()))
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(format!("Failed to read response: {e}")))?;

        debug!(
            "GET {} -> {} ({} bytes)",
            UrlUtils::obfuscate_credentials(url),
            status,
            body.len()
        );

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let ok = TransportResponse { status: 204, body: Bytes::new() };
        let redirect = TransportResponse { status: 304, body: Bytes::new() };
        let blocked = TransportResponse { status: 403, body: Bytes::new() };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
        assert!(!blocked.is_success());
    }
}
