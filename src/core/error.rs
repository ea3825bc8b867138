//! Application error types and error handling utilities
//!
//! This module defines the error system shared by the checkout flow, the
//! purchase recorder and the CLI. Collaborator-specific failures (wallet, RPC,
//! recorder) have their own typed errors next to their traits; `AppError` is
//! what crosses module boundaries.

use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Main application error type that encompasses all possible errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// Network and RPC communication errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        endpoint: Option<String>,
    },

    /// Solana ledger errors
    #[error("Solana error: {message}")]
    Solana {
        message: String,
        transaction_signature: Option<String>,
        #[source]
        source: Option<Box<AppError>>,
    },

    /// Wallet provider errors
    #[error("Wallet error: {message}")]
    Wallet {
        message: String,
        address: Option<String>,
    },

    /// Payment flow misuse (operation not allowed in the current status)
    #[error("Payment error: {message}")]
    Payment {
        message: String,
        intent_id: Option<String>,
        status: Option<String>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        component: Option<String>,
    },
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            endpoint: None,
        }
    }

    /// Create a new payment flow error
    pub fn payment<S: Into<String>>(message: S) -> Self {
        Self::Payment {
            message: message.into(),
            intent_id: None,
            status: None,
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            component: None,
        }
    }

    /// Wrap an error raised after `signature` reached the ledger
    pub fn after_broadcast(signature: impl ToString, source: AppError) -> Self {
        Self::Solana {
            message: format!("Payment flow error after broadcast: {}", source),
            transaction_signature: Some(signature.to_string()),
            source: Some(Box::new(source)),
        }
    }

    /// Attach the endpoint to a network error
    pub fn with_endpoint<S: Into<String>>(mut self, url: S) -> Self {
        if let Self::Network { endpoint, .. } = &mut self {
            *endpoint = Some(url.into());
        }
        self
    }

    /// Attach the payment intent and status to a payment error
    pub fn with_intent(mut self, id: impl ToString, current: impl ToString) -> Self {
        if let Self::Payment { intent_id, status, .. } = &mut self {
            *intent_id = Some(id.to_string());
            *status = Some(current.to_string());
        }
        self
    }

    /// Signature of the transaction the error happened after, if any
    pub fn transaction_signature(&self) -> Option<&str> {
        match self {
            Self::Solana { transaction_signature, .. } => transaction_signature.as_deref(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = AppError::config("Test configuration error");
        assert!(matches!(error, AppError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
        assert!(error.transaction_signature().is_none());
    }

    #[test]
    fn test_after_broadcast_keeps_signature_and_source() {
        let source = AppError::payment("status changed underneath");
        let error = AppError::after_broadcast("5VERv8NM", source);

        assert_eq!(error.transaction_signature(), Some("5VERv8NM"));
        assert!(error.to_string().contains("status changed underneath"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_endpoint_and_intent_context() {
        let error = AppError::network("probe failed").with_endpoint("https://rpc.example");
        assert!(matches!(
            error,
            AppError::Network { endpoint: Some(ref e), .. } if e == "https://rpc.example"
        ));

        let error = AppError::payment("pay refused").with_intent("abc", "idle");
        if let AppError::Payment { intent_id, status, .. } = error {
            assert_eq!(intent_id.as_deref(), Some("abc"));
            assert_eq!(status.as_deref(), Some("idle"));
        } else {
            panic!("expected a Payment error");
        }
    }

    #[test]
    fn test_anyhow_conversion_keeps_context_chain() {
        let err = anyhow::anyhow!("root cause").context("while loading");
        let app: AppError = err.into();
        assert!(app.to_string().contains("while loading"));
        assert!(app.to_string().contains("root cause"));
    }
}
