//! Failure taxonomy of the payment flow
//!
//! Every collaborator error is mapped to exactly one [`FailureKind`] by the
//! constructors below. The mapping matches on error variants only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::types::lamports_to_sol;
use crate::services::recorder::RecorderError;
use crate::services::solana::{ResolveError, RpcError};
use crate::services::wallet::WalletError;

/// Closed set of reasons a payment attempt can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    WalletUnavailable,
    WalletConnectionFailed,
    UserRejected,
    InsufficientBalance,
    NoEndpointAvailable,
    BroadcastFailed,
    OnChainError,
    ConfirmationTimeout,
    RecordingFailed,
    UnknownError,
}

impl FailureKind {
    /// Stable snake_case tag, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::WalletUnavailable => "wallet_unavailable",
            FailureKind::WalletConnectionFailed => "wallet_connection_failed",
            FailureKind::UserRejected => "user_rejected",
            FailureKind::InsufficientBalance => "insufficient_balance",
            FailureKind::NoEndpointAvailable => "no_endpoint_available",
            FailureKind::BroadcastFailed => "broadcast_failed",
            FailureKind::OnChainError => "on_chain_error",
            FailureKind::ConfirmationTimeout => "confirmation_timeout",
            FailureKind::RecordingFailed => "recording_failed",
            FailureKind::UnknownError => "unknown_error",
        }
    }

    /// Whether funds may already have left the payer's wallet
    pub fn after_broadcast(&self) -> bool {
        matches!(
            self,
            FailureKind::OnChainError | FailureKind::ConfirmationTimeout | FailureKind::RecordingFailed
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::WalletUnavailable => "WalletUnavailable",
            FailureKind::WalletConnectionFailed => "WalletConnectionFailed",
            FailureKind::UserRejected => "UserRejected",
            FailureKind::InsufficientBalance => "InsufficientBalance",
            FailureKind::NoEndpointAvailable => "NoEndpointAvailable",
            FailureKind::BroadcastFailed => "BroadcastFailed",
            FailureKind::OnChainError => "OnChainError",
            FailureKind::ConfirmationTimeout => "ConfirmationTimeout",
            FailureKind::RecordingFailed => "RecordingFailed",
            FailureKind::UnknownError => "UnknownError",
        };
        f.write_str(name)
    }
}

/// A classified failure with a message fit for the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct PaymentFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Present once the transfer has been broadcast
    pub signature: Option<Signature>,
}

impl PaymentFailure {
    pub fn new<S: Into<String>>(kind: FailureKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            signature: None,
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn wallet_unavailable() -> Self {
        Self::new(
            FailureKind::WalletUnavailable,
            "No wallet provider found. Install a Solana wallet and try again.",
        )
    }

    /// Failure while connecting the wallet
    pub fn from_connect_error(err: &WalletError) -> Self {
        match err {
            WalletError::Unavailable => Self::wallet_unavailable(),
            WalletError::Rejected => Self::new(
                FailureKind::WalletConnectionFailed,
                "Wallet connection was declined",
            ),
            WalletError::Failed(reason) => Self::new(
                FailureKind::WalletConnectionFailed,
                format!("Failed to connect wallet: {}", reason),
            ),
        }
    }

    /// Balance lookup failed right after the wallet connected
    pub fn balance_unavailable(err: &RpcError) -> Self {
        Self::new(
            FailureKind::WalletConnectionFailed,
            format!("Failed to fetch wallet balance: {}", err),
        )
    }

    /// Failure while the wallet was asked to sign
    pub fn from_sign_error(err: &WalletError) -> Self {
        match err {
            WalletError::Rejected => Self::new(
                FailureKind::UserRejected,
                "Transaction was rejected in the wallet",
            ),
            WalletError::Unavailable => Self::wallet_unavailable(),
            WalletError::Failed(reason) => Self::new(
                FailureKind::UnknownError,
                format!("Wallet failed to sign the transaction: {}", reason),
            ),
        }
    }

    pub fn insufficient_balance(required_lamports: u64, balance_lamports: u64) -> Self {
        let required: Decimal = lamports_to_sol(required_lamports).normalize();
        let balance: Decimal = lamports_to_sol(balance_lamports);
        Self::new(
            FailureKind::InsufficientBalance,
            format!(
                "Insufficient balance. You need {} SOL but have {:.4} SOL.",
                required, balance
            ),
        )
    }

    pub fn no_endpoint(err: &ResolveError) -> Self {
        let ResolveError::NoEndpointAvailable { failures } = err;
        let tried: Vec<&str> = failures.iter().map(|r| r.endpoint.as_str()).collect();
        Self::new(
            FailureKind::NoEndpointAvailable,
            format!(
                "Unable to reach the Solana network ({} endpoint(s) tried: {}). Please try again later.",
                tried.len(),
                tried.join(", ")
            ),
        )
    }

    pub fn broadcast(err: &RpcError) -> Self {
        Self::new(
            FailureKind::BroadcastFailed,
            format!("Transaction could not be submitted: {}. No funds were sent.", err),
        )
    }

    pub fn on_chain(signature: Signature, reason: &str) -> Self {
        Self::new(
            FailureKind::OnChainError,
            format!("Transaction {} failed on chain: {}", signature, reason),
        )
        .with_signature(signature)
    }

    pub fn confirmation_timeout(signature: Signature, waited: Duration) -> Self {
        Self::new(
            FailureKind::ConfirmationTimeout,
            format!(
                "Transaction {} was not confirmed within {} seconds. Check it in an explorer before paying again.",
                signature,
                waited.as_secs()
            ),
        )
        .with_signature(signature)
    }

    /// The transfer is confirmed but the purchase was not recorded
    pub fn recording(signature: Signature, err: &RecorderError) -> Self {
        Self::new(
            FailureKind::RecordingFailed,
            format!(
                "Payment was sent but could not be recorded ({}). Your transaction signature is {}. \
                 Contact support with this signature to have your plan activated.",
                err, signature
            ),
        )
        .with_signature(signature)
    }

    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::new(FailureKind::UnknownError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::solana::ProbeReport;

    #[test]
    fn test_wallet_error_classification() {
        assert_eq!(PaymentFailure::from_connect_error(&WalletError::Unavailable).kind, FailureKind::WalletUnavailable);
        assert_eq!(PaymentFailure::from_connect_error(&WalletError::Rejected).kind, FailureKind::WalletConnectionFailed);
        assert_eq!(
            PaymentFailure::from_connect_error(&WalletError::Failed("locked".into())).kind,
            FailureKind::WalletConnectionFailed
        );

        assert_eq!(PaymentFailure::from_sign_error(&WalletError::Rejected).kind, FailureKind::UserRejected);
        assert_eq!(PaymentFailure::from_sign_error(&WalletError::Unavailable).kind, FailureKind::WalletUnavailable);
        assert_eq!(
            PaymentFailure::from_sign_error(&WalletError::Failed("hw".into())).kind,
            FailureKind::UnknownError
        );
    }

    #[test]
    fn test_insufficient_balance_message() {
        let failure = PaymentFailure::insufficient_balance(100_005_000, 50_000_000);
        assert_eq!(failure.kind, FailureKind::InsufficientBalance);
        assert_eq!(
            failure.message,
            "Insufficient balance. You need 0.100005 SOL but have 0.0500 SOL."
        );
        assert!(failure.signature.is_none());
    }

    #[test]
    fn test_recording_failure_carries_signature_verbatim() {
        let signature = Signature::from([3u8; 64]);
        let failure = PaymentFailure::recording(
            signature,
            &RecorderError::Rejected { status: 500, message: "Payment processing failed".into() },
        );

        assert_eq!(failure.kind, FailureKind::RecordingFailed);
        assert!(failure.message.contains(&signature.to_string()));
        assert_eq!(failure.signature, Some(signature));
    }

    #[test]
    fn test_no_endpoint_lists_attempts() {
        let failures = ["https://a.example", "https://b.example"]
            .iter()
            .map(|url| ProbeReport {
                endpoint: url.to_string(),
                latency: Duration::from_millis(5),
                error: Some(RpcError::Timeout { endpoint: url.to_string() }),
            })
            .collect();

        let failure = PaymentFailure::no_endpoint(&ResolveError::NoEndpointAvailable { failures });
        assert_eq!(failure.kind, FailureKind::NoEndpointAvailable);
        assert!(failure.message.contains("2 endpoint(s)"));
        assert!(failure.message.contains("https://b.example"));
    }

    #[test]
    fn test_after_broadcast_kinds() {
        assert!(FailureKind::RecordingFailed.after_broadcast());
        assert!(FailureKind::ConfirmationTimeout.after_broadcast());
        assert!(!FailureKind::BroadcastFailed.after_broadcast());
        assert!(!FailureKind::UserRejected.after_broadcast());
    }

    #[test]
    fn test_display() {
        let failure = PaymentFailure::unknown("boom");
        assert_eq!(failure.to_string(), "UnknownError: boom");
        assert_eq!(FailureKind::OnChainError.as_str(), "on_chain_error");
    }
}
