//! Payment intent and its status lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::fmt;

use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::{IntentId, Plan};
use super::failure::{FailureKind, PaymentFailure};

/// Where a payment attempt stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Idle,
    WalletConnecting,
    WalletConnected,
    Submitting,
    AwaitingSignature,
    Broadcasting,
    Confirming,
    Recording,
    Succeeded,
    Failed(FailureKind),
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Failed(_) | PaymentStatus::Cancelled
        )
    }

    /// Cancellation is offered up to, but not including, `Broadcasting`
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Idle
                | PaymentStatus::WalletConnecting
                | PaymentStatus::WalletConnected
                | PaymentStatus::Submitting
                | PaymentStatus::AwaitingSignature
        )
    }

    /// Whether a signature must be present in this status
    pub fn requires_signature(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Confirming | PaymentStatus::Recording | PaymentStatus::Succeeded
        )
    }

    /// Short name used in logs and metrics labels
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Idle => "idle",
            PaymentStatus::WalletConnecting => "wallet_connecting",
            PaymentStatus::WalletConnected => "wallet_connected",
            PaymentStatus::Submitting => "submitting",
            PaymentStatus::AwaitingSignature => "awaiting_signature",
            PaymentStatus::Broadcasting => "broadcasting",
            PaymentStatus::Confirming => "confirming",
            PaymentStatus::Recording => "recording",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed(_) => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Allowed edges of the lifecycle graph
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return self.is_cancellable();
        }

        match (*self, next) {
            (Idle, WalletConnecting) => true,
            (WalletConnecting, WalletConnected) | (WalletConnecting, Idle) => true,
            (WalletConnecting, Failed(kind)) => matches!(
                kind,
                FailureKind::WalletUnavailable | FailureKind::NoEndpointAvailable | FailureKind::UnknownError
            ),
            (WalletConnected, Submitting) | (WalletConnected, Idle) => true,
            (Submitting, AwaitingSignature) => true,
            (Submitting, Failed(kind)) => matches!(
                kind,
                FailureKind::InsufficientBalance | FailureKind::NoEndpointAvailable | FailureKind::UnknownError
            ),
            (AwaitingSignature, Broadcasting) => true,
            (AwaitingSignature, Failed(kind)) => matches!(
                kind,
                FailureKind::UserRejected | FailureKind::WalletUnavailable | FailureKind::UnknownError
            ),
            (Broadcasting, Confirming) => true,
            (Broadcasting, Failed(kind)) => kind == FailureKind::BroadcastFailed,
            (Confirming, Recording) => true,
            (Confirming, Failed(kind)) => matches!(
                kind,
                FailureKind::OnChainError | FailureKind::ConfirmationTimeout
            ),
            (Recording, Succeeded) => true,
            (Recording, Failed(kind)) => kind == FailureKind::RecordingFailed,
            _ => false,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Failed(kind) => write!(f, "Failed({})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One purchase attempt, from plan selection to a terminal status
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    id: IntentId,
    plan: Plan,
    created_at: DateTime<Utc>,
    status: PaymentStatus,
    payer_address: Option<Pubkey>,
    payer_balance: Option<u64>,
    signature: Option<Signature>,
    failure: Option<PaymentFailure>,
}

impl PaymentIntent {
    pub fn new(plan: Plan) -> Self {
        Self {
            id: IntentId::new(),
            plan,
            created_at: Utc::now(),
            status: PaymentStatus::Idle,
            payer_address: None,
            payer_balance: None,
            signature: None,
            failure: None,
        }
    }

    pub fn id(&self) -> IntentId {
        self.id
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn payer_address(&self) -> Option<Pubkey> {
        self.payer_address
    }

    /// Balance snapshot in lamports, taken when the wallet connected
    pub fn payer_balance(&self) -> Option<u64> {
        self.payer_balance
    }

    pub fn signature(&self) -> Option<Signature> {
        self.signature
    }

    pub fn failure(&self) -> Option<&PaymentFailure> {
        self.failure.as_ref()
    }

    pub(crate) fn advance(&mut self, next: PaymentStatus) -> AppResult<()> {
        if matches!(next, PaymentStatus::Failed(_)) {
            return Err(AppError::internal("failures must be recorded through PaymentIntent::fail"));
        }
        self.check_transition(next)?;
        if next.requires_signature() && self.signature.is_none() {
            return Err(self.misuse(format!("cannot enter {} without a signature", next)));
        }
        if next == PaymentStatus::Idle {
            self.payer_address = None;
            self.payer_balance = None;
        }
        self.status = next;
        Ok(())
    }

    pub(crate) fn fail(&mut self, failure: PaymentFailure) -> AppResult<()> {
        self.check_transition(PaymentStatus::Failed(failure.kind))?;
        self.status = PaymentStatus::Failed(failure.kind);
        self.failure = Some(failure);
        Ok(())
    }

    pub(crate) fn set_payer(&mut self, address: Pubkey, balance_lamports: u64) -> AppResult<()> {
        if self.status != PaymentStatus::WalletConnecting {
            return Err(self.misuse("payer can only be set while connecting".to_string()));
        }
        self.payer_address = Some(address);
        self.payer_balance = Some(balance_lamports);
        Ok(())
    }

    pub(crate) fn refresh_balance(&mut self, balance_lamports: u64) {
        self.payer_balance = Some(balance_lamports);
    }

    /// Store the broadcast signature; it can be set once
    pub(crate) fn set_signature(&mut self, signature: Signature) -> AppResult<()> {
        if self.signature.is_some() {
            return Err(self.misuse("transaction signature is already set".to_string()));
        }
        if self.status != PaymentStatus::Broadcasting {
            return Err(self.misuse("signature can only be stored after broadcast".to_string()));
        }
        self.signature = Some(signature);
        Ok(())
    }

    fn check_transition(&self, next: PaymentStatus) -> AppResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(self.misuse(format!("invalid transition {} -> {}", self.status, next)))
        }
    }

    fn misuse(&self, message: String) -> AppError {
        AppError::payment(message).with_intent(self.id, self.status)
    }
}
