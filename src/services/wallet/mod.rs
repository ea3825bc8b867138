//! Wallet provider seam
//!
//! The checkout flow never touches key material directly. It talks to a
//! [`WalletProvider`] injected at construction time, which connects, reports
//! the payer address and signs transfers after the user approves them.

pub mod keypair;

pub use keypair::{Approval, KeypairWallet};

use async_trait::async_trait;
use solana_sdk::{pubkey::Pubkey, transaction::Transaction};
use thiserror::Error;

/// Failure reported by a wallet provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    /// No provider to talk to (extension missing, keypair unreadable)
    #[error("wallet provider is not available")]
    Unavailable,

    /// The user declined the request
    #[error("request rejected by the user")]
    Rejected,

    /// Any other provider failure
    #[error("wallet error: {0}")]
    Failed(String),
}

/// Signer holding the payer's keys
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the user to connect; returns the payer address
    async fn connect(&self) -> Result<Pubkey, WalletError>;

    /// Drop the connection
    async fn disconnect(&self) -> Result<(), WalletError>;

    fn is_connected(&self) -> bool;

    /// Payer address while connected
    fn public_key(&self) -> Option<Pubkey>;

    /// Ask the user to approve and sign `transaction`
    async fn sign_transaction(&self, transaction: Transaction) -> Result<Transaction, WalletError>;
}
