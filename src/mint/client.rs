//! Client for the external badge minting service
//!
//! The minter is slow, fallible, and not transactional with the ledger.
//! Everything behind `BadgeMinter` is treated as opaque.

use crate::account::types::BadgeTier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MintError {
    #[error("mint service rejected the request: {0}")]
    Rejected(String),
    #[error("mint service unreachable: {0}")]
    Transport(String),
    #[error("mint timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MintReceipt {
    pub transaction_hash: String,
}

#[async_trait]
pub trait BadgeMinter: Send + Sync {
    async fn mint(&self, wallet_address: &str, tier: BadgeTier) -> Result<MintReceipt, MintError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MintRequest<'a> {
    wallet_address: &'a str,
    badge_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintResponse {
    success: bool,
    transaction_hash: Option<String>,
    error: Option<String>,
}

/// HTTP minter. A hang is converted into `MintError::Timeout` so the
/// coordinator can roll back instead of waiting forever.
pub struct HttpMinter {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpMinter {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl BadgeMinter for HttpMinter {
    async fn mint(&self, wallet_address: &str, tier: BadgeTier) -> Result<MintReceipt, MintError> {
        let body = MintRequest {
            wallet_address,
            badge_type: tier.as_str().to_uppercase(),
        };
        debug!(wallet = wallet_address, badge = %tier, "calling mint service");

        // The timeout covers the full exchange: a minter that returns
        // headers and then stalls the body must not hang the coordinator.
        let exchange = async {
            let response = self
                .http
                .post(format!("{}/mint", self.endpoint))
                .json(&body)
                .send()
                .await
                .map_err(|e| MintError::Transport(e.to_string()))?;
            response
                .json::<MintResponse>()
                .await
                .map_err(|e| MintError::Transport(format!("malformed mint response: {}", e)))
        };

        let parsed = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| MintError::Timeout(self.timeout.as_secs()))??;

        if !parsed.success {
            return Err(MintError::Rejected(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        match parsed.transaction_hash {
            Some(transaction_hash) => Ok(MintReceipt { transaction_hash }),
            None => Err(MintError::Rejected(
                "mint succeeded without a transaction hash".to_string(),
            )),
        }
    }
}

/// Scripted minter used by tests and local development.
pub struct MockMinter {
    outcome: Result<MintReceipt, MintError>,
    delay: Duration,
}

impl MockMinter {
    pub fn succeeding(transaction_hash: &str) -> Self {
        Self {
            outcome: Ok(MintReceipt {
                transaction_hash: transaction_hash.to_string(),
            }),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(MintError::Rejected(reason.to_string())),
            delay: Duration::ZERO,
        }
    }

    /// Simulate a slow chain: the outcome resolves after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl BadgeMinter for MockMinter {
    async fn mint(&self, _wallet_address: &str, _tier: BadgeTier) -> Result<MintReceipt, MintError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_stalled_response_body_times_out() {
        // Server that sends headers promising a body, then goes quiet
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n")
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });

        let minter = HttpMinter::new(
            &format!("http://{}", addr),
            Duration::from_millis(100),
        );
        let err = minter.mint("0xabc", BadgeTier::Bronze).await.unwrap_err();
        assert!(matches!(err, MintError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_minter_is_transport_error() {
        // Port 1 on loopback refuses connections
        let minter = HttpMinter::new("http://127.0.0.1:1", Duration::from_secs(5));
        let err = minter.mint("0xabc", BadgeTier::Bronze).await.unwrap_err();
        assert!(matches!(err, MintError::Transport(_)));
    }
}
