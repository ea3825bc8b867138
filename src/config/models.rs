//! Configuration data structures and models
//!
//! This module defines the complete configuration structure for the checkout
//! service: RPC endpoints, payment parameters, the purchase recorder client,
//! the recorder server and telemetry.

use serde::{Deserialize, Serialize};
use rust_decimal_macros::dec;
use std::time::Duration;

use crate::core::domain;
use crate::core::types::Plan;

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Environment configuration
    pub environment: EnvironmentConfig,

    /// Solana RPC configuration
    pub solana: SolanaConfig,

    /// Payment parameters
    pub payment: PaymentConfig,

    /// Purchase recorder client configuration
    pub recorder: RecorderConfig,

    /// Purchase recorder server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (development, staging, production)
    pub name: String,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log format (json, pretty, compact)
    pub log_format: String,

    /// Directory for rotated log files; console only when unset
    #[serde(default)]
    pub log_directory: Option<String>,
}

/// Solana RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    /// Candidate RPC endpoints, tried in order
    pub rpc_urls: Vec<String>,

    /// Commitment level (processed, confirmed, finalized)
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Liveness probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Upper bound on waiting for confirmation in milliseconds
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_ms: u64,

    /// Initial delay between confirmation polls in milliseconds
    #[serde(default = "default_confirmation_poll_interval")]
    pub confirmation_poll_interval_ms: u64,
}

/// Payment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Treasury account receiving plan payments
    pub treasury_address: String,

    /// Fee reserved on top of the plan price when checking the balance
    #[serde(default = "default_estimated_fee")]
    pub estimated_fee_lamports: u64,

    /// Re-query the balance right before building the transaction; when off
    /// the connect-time snapshot is used
    #[serde(default = "default_true")]
    pub refresh_balance_before_submit: bool,

    /// Plan catalogue
    #[serde(default = "default_plans")]
    pub plans: Vec<Plan>,
}

/// Purchase recorder client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Recording endpoint URL
    pub endpoint_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_recorder_timeout")]
    pub request_timeout_ms: u64,
}

/// Purchase recorder server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Simulated processing delay in milliseconds
    #[serde(default = "default_processing_delay")]
    pub processing_delay_ms: u64,

    /// Accept a record only for a confirmed treasury transfer of a catalogue plan
    #[serde(default)]
    pub verify_transactions: bool,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Expose Prometheus metrics
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics listener port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_commitment() -> String { "confirmed".to_string() }
fn default_probe_timeout() -> u64 { domain::DEFAULT_PROBE_TIMEOUT.as_millis() as u64 }
fn default_request_timeout() -> u64 { 10_000 }
fn default_confirmation_timeout() -> u64 { domain::DEFAULT_CONFIRMATION_TIMEOUT.as_millis() as u64 }
fn default_confirmation_poll_interval() -> u64 { domain::DEFAULT_CONFIRMATION_POLL_INTERVAL.as_millis() as u64 }
fn default_estimated_fee() -> u64 { domain::DEFAULT_ESTIMATED_FEE_LAMPORTS }
fn default_recorder_timeout() -> u64 { 15_000 }
fn default_bind_address() -> String { "0.0.0.0:3000".to_string() }
fn default_processing_delay() -> u64 { domain::DEFAULT_PROCESSING_DELAY.as_millis() as u64 }
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

/// Plan catalogue offered on the pricing page
pub fn default_plans() -> Vec<Plan> {
    vec![
        Plan {
            hours: 24,
            price_sol: dec!(0.1),
            label: "Starter Plan - 24 Hours".to_string(),
        },
        Plan {
            hours: 168,
            price_sol: dec!(0.5),
            label: "Weekly Plan - 7 Days".to_string(),
        },
        Plan {
            hours: 720,
            price_sol: dec!(1.5),
            label: "Monthly Plan - 30 Days".to_string(),
        },
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            processing_delay_ms: default_processing_delay(),
            verify_transactions: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: EnvironmentConfig {
                name: "development".to_string(),
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
                log_directory: None,
            },
            solana: SolanaConfig {
                rpc_urls: vec![domain::DEFAULT_RPC_URL.to_string()],
                commitment: default_commitment(),
                probe_timeout_ms: default_probe_timeout(),
                request_timeout_ms: default_request_timeout(),
                confirmation_timeout_ms: default_confirmation_timeout(),
                confirmation_poll_interval_ms: default_confirmation_poll_interval(),
            },
            payment: PaymentConfig {
                treasury_address: domain::DEFAULT_TREASURY_ADDRESS.to_string(),
                estimated_fee_lamports: default_estimated_fee(),
                refresh_balance_before_submit: true,
                plans: default_plans(),
            },
            recorder: RecorderConfig {
                endpoint_url: "http://127.0.0.1:3000/api/process-payment".to_string(),
                request_timeout_ms: default_recorder_timeout(),
            },
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.name == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.name == "production"
    }

    /// Get the current environment name
    pub fn environment(&self) -> &str {
        &self.environment.name
    }

    /// Look up a plan by its position in the catalogue (1-based, as displayed)
    pub fn plan(&self, number: usize) -> Option<&Plan> {
        number.checked_sub(1).and_then(|idx| self.payment.plans.get(idx))
    }
}

impl SolanaConfig {
    /// Probe timeout as a duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Confirmation timeout as a duration
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    /// Confirmation poll interval as a duration
    pub fn confirmation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_interval_ms)
    }
}

impl RecorderConfig {
    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ServerConfig {
    /// Processing delay as a duration
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}
