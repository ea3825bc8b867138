//! Purchase recording
//!
//! After a transfer is confirmed the purchase is reported to the bot backend,
//! which credits trading time to the wallet. This module holds the wire types
//! shared by the HTTP client and the server, and the [`PurchaseRecorder`] seam
//! the payment flow depends on.

pub mod http;

pub use http::HttpPurchaseRecorder;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of `POST /api/process-payment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    /// Hours of trading time bought
    pub hours: u32,
    /// Amount paid in SOL
    pub sol: Decimal,
    /// Payer address
    pub wallet_address: String,
    /// Signature of the confirmed transfer
    pub transaction_hash: String,
}

/// Successful answer of the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub success: bool,
    pub message: String,
    pub transaction_hash: String,
    pub purchase_id: String,
}

/// Error answer of the recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Failure to record a purchase
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    /// Non-2xx answer
    #[error("recorder answered {status}: {message}")]
    Rejected { status: u16, message: String },

    /// No answer in time
    #[error("recorder request timed out")]
    Timeout,

    /// Connection-level failure
    #[error("recorder unreachable: {0}")]
    Transport(String),

    /// 2xx with a body that is not a receipt, or `success: false`
    #[error("unexpected recorder response: {0}")]
    InvalidResponse(String),
}

/// Sink for confirmed purchases
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurchaseRecorder: Send + Sync {
    async fn record(&self, record: &PurchaseRecord) -> Result<PurchaseReceipt, RecorderError>;
}
