//! Ledger RPC seam and its Solana implementation
//!
//! The payment flow and the recorder only need five ledger calls. They are expressed as the
//! [`LedgerRpc`] trait with a closed [`RpcError`] set so callers classify
//! failures by variant instead of inspecting messages.

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::UiTransactionEncoding;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::models::SolanaConfig;
use crate::core::error::AppError;
use super::transfer::{system_transfers, LandedTransaction};

/// Failure of a single ledger call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// No answer within the allotted time
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// Connection-level failure (DNS, TLS, refused, malformed response)
    #[error("transport error from {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The node answered and refused the request
    #[error("request rejected by {endpoint}: {message}")]
    Rejected { endpoint: String, message: String },
}

impl RpcError {
    /// Endpoint the failed request was sent to
    pub fn endpoint(&self) -> &str {
        match self {
            RpcError::Timeout { endpoint }
            | RpcError::Transport { endpoint, .. }
            | RpcError::Rejected { endpoint, .. } => endpoint,
        }
    }
}

impl From<RpcError> for AppError {
    fn from(err: RpcError) -> Self {
        let endpoint = err.endpoint().to_string();
        AppError::network(err.to_string()).with_endpoint(endpoint)
    }
}

/// Ledger view of a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Not yet at the requested commitment
    Pending,
    /// Reached the requested commitment without error
    Confirmed,
    /// Landed but failed during execution
    Failed(String),
}

/// Ledger operations used by the checkout flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// URL of the node behind this client
    fn endpoint(&self) -> String;

    /// Balance of an account in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Most recent blockhash at the configured commitment
    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError>;

    /// Submit a signed transaction
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    /// Current confirmation state of a signature
    async fn confirm_transaction(&self, signature: &Signature) -> Result<Confirmation, RpcError>;

    /// Fetch a landed transaction with its SOL transfers
    async fn get_transaction(&self, signature: &Signature) -> Result<LandedTransaction, RpcError>;
}

#[cfg(test)]
impl std::fmt::Debug for dyn LedgerRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerRpc").field("endpoint", &self.endpoint()).finish()
    }
}

/// Builds ledger clients for candidate endpoints
#[cfg_attr(test, mockall::automock)]
pub trait RpcConnector: Send + Sync {
    /// Create a client for `url`; no network traffic happens here
    fn connect(&self, url: &str) -> Arc<dyn LedgerRpc>;
}

/// Map a commitment name to its config; unknown names fall back to `confirmed`
pub fn parse_commitment(commitment: &str) -> CommitmentConfig {
    match commitment {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        "confirmed" => CommitmentConfig::confirmed(),
        other => {
            warn!("⚠️  Unknown commitment level '{}', using confirmed", other);
            CommitmentConfig::confirmed()
        }
    }
}

/// Solana JSON-RPC client for a single endpoint
pub struct SolanaRpc {
    client: SolanaRpcClient,
    url: String,
    commitment: CommitmentConfig,
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("url", &self.url)
            .field("commitment", &self.commitment)
            .finish()
    }
}

impl SolanaRpc {
    /// Create a client; the connection is established lazily on first request
    pub fn new(url: &str, commitment: CommitmentConfig, request_timeout: Duration) -> Self {
        debug!("🔗 Creating RPC client for: {}", url);

        Self {
            client: SolanaRpcClient::new_with_timeout_and_commitment(
                url.to_string(),
                request_timeout,
                commitment,
            ),
            url: url.to_string(),
            commitment,
        }
    }

    fn map_error(&self, err: ClientError) -> RpcError {
        let endpoint = self.url.clone();
        match err.kind() {
            ClientErrorKind::Reqwest(e) if e.is_timeout() => RpcError::Timeout { endpoint },
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) | ClientErrorKind::SerdeJson(_) => {
                RpcError::Transport { endpoint, message: err.to_string() }
            }
            _ => RpcError::Rejected { endpoint, message: err.to_string() },
        }
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    fn endpoint(&self) -> String {
        self.url.clone()
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        self.client
            .get_balance_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| self.map_error(e))
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
        self.client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map(|(blockhash, _last_valid_height)| blockhash)
            .map_err(|e| self.map_error(e))
    }

    #[instrument(skip(self, transaction), fields(endpoint = %self.url))]
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let signature = self.client
            .send_transaction(transaction)
            .await
            .map_err(|e| self.map_error(e))?;

        info!("📤 Transaction submitted: {}", signature);
        Ok(signature)
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn confirm_transaction(&self, signature: &Signature) -> Result<Confirmation, RpcError> {
        let status = self.client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .map_err(|e| self.map_error(e))?;

        Ok(match status {
            None => Confirmation::Pending,
            Some(Ok(())) => Confirmation::Confirmed,
            Some(Err(err)) => Confirmation::Failed(err.to_string()),
        })
    }

    #[instrument(skip(self), fields(endpoint = %self.url))]
    async fn get_transaction(&self, signature: &Signature) -> Result<LandedTransaction, RpcError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };

        let fetched = self.client
            .get_transaction_with_config(signature, config)
            .await
            .map_err(|e| self.map_error(e))?;

        let transaction = fetched.transaction.transaction.decode().ok_or_else(|| RpcError::Rejected {
            endpoint: self.url.clone(),
            message: format!("undecodable transaction {}", signature),
        })?;

        Ok(LandedTransaction {
            transfers: system_transfers(&transaction.message),
            error: fetched.transaction.meta.and_then(|meta| meta.err).map(|err| format!("{:?}", err)),
        })
    }
}

/// Connector producing [`SolanaRpc`] clients with shared settings
#[derive(Debug, Clone)]
pub struct SolanaConnector {
    commitment: CommitmentConfig,
    request_timeout: Duration,
}

impl SolanaConnector {
    pub fn new(commitment: CommitmentConfig, request_timeout: Duration) -> Self {
        Self { commitment, request_timeout }
    }

    pub fn from_config(config: &SolanaConfig) -> Self {
        Self::new(parse_commitment(&config.commitment), config.request_timeout())
    }
}

impl RpcConnector for SolanaConnector {
    fn connect(&self, url: &str) -> Arc<dyn LedgerRpc> {
        Arc::new(SolanaRpc::new(url, self.commitment, self.request_timeout))
    }
}
