//! Configuration validation logic
//!
//! Checks every section before the service starts so that a bad treasury
//! address or an unreachable-by-construction timeout is caught at startup
//! rather than halfway through a payment.

use tracing::{debug, warn};

use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::utils::validation;
use super::models::{
    AppConfig, EnvironmentConfig, PaymentConfig, RecorderConfig, ServerConfig, SolanaConfig,
    TelemetryConfig,
};

/// Configuration validator
pub struct ConfigValidator {
    /// Strict validation mode (fails on warnings)
    strict_mode: bool,

    /// Collect all validation errors instead of failing fast
    collect_all_errors: bool,
}

/// Validation result with warnings and errors
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Fatal validation errors
    pub errors: Vec<String>,

    /// Non-fatal warnings
    pub warnings: Vec<String>,

    /// Validation passed
    pub is_valid: bool,
}

impl ConfigValidator {
    /// Create a new validator with default settings
    pub fn new() -> Self {
        Self {
            strict_mode: false,
            collect_all_errors: true,
        }
    }

    /// Enable strict validation mode
    pub fn with_strict_mode(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Enable fail-fast mode (stop on first error)
    pub fn with_fail_fast(mut self) -> Self {
        self.collect_all_errors = false;
        self
    }

    /// Validate the complete application configuration
    pub fn validate(&self, config: &AppConfig) -> AppResult<ValidationResult> {
        debug!("🔍 Starting configuration validation");

        let mut result = ValidationResult {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        };

        self.validate_environment(&config.environment, &mut result)?;
        self.validate_solana(&config.solana, &mut result)?;
        self.validate_payment(&config.payment, &mut result)?;
        self.validate_recorder(&config.recorder, &mut result)?;
        self.validate_server(&config.server, &mut result)?;
        self.validate_telemetry(&config.telemetry, &mut result)?;

        self.validate_cross_config(config, &mut result)?;

        result.is_valid = result.errors.is_empty() && (!self.strict_mode || result.warnings.is_empty());

        if result.is_valid {
            debug!("✅ Configuration validation passed");
        } else {
            warn!("❌ Configuration validation failed");
            for error in &result.errors {
                warn!("   Error: {}", error);
            }
            for warning in &result.warnings {
                warn!("   Warning: {}", warning);
            }
        }

        Ok(result)
    }

    fn validate_environment(&self, config: &EnvironmentConfig, result: &mut ValidationResult) -> AppResult<()> {
        if let Err(e) = validation::config::validate_environment(&config.name) {
            self.add_error(result, format!("Environment name: {}", e))?;
        }

        if let Err(e) = validation::config::validate_log_level(&config.log_level) {
            self.add_error(result, format!("Log level: {}", e))?;
        }

        if let Err(e) = validation::config::validate_log_format(&config.log_format) {
            self.add_error(result, format!("Log format: {}", e))?;
        }

        if config.name == "production" && config.log_level.eq_ignore_ascii_case("trace") {
            self.add_warning(result, "Trace logging enabled in production environment");
        }

        Ok(())
    }

    fn validate_solana(&self, config: &SolanaConfig, result: &mut ValidationResult) -> AppResult<()> {
        if config.rpc_urls.is_empty() {
            self.add_error(result, "At least one Solana RPC URL is required".to_string())?;
        }

        for (i, url) in config.rpc_urls.iter().enumerate() {
            if let Err(e) = validation::validate_url(url) {
                self.add_error(result, format!("RPC URL {}: {}", i, e))?;
            }
        }

        let mut seen = std::collections::HashSet::new();
        if config.rpc_urls.iter().any(|url| !seen.insert(url)) {
            self.add_warning(result, "Duplicate RPC URLs - a failed endpoint will be probed twice");
        }

        if config.rpc_urls.len() == 1 {
            self.add_warning(result, "Single RPC URL configured - no failover available");
        }

        if let Err(e) = validation::config::validate_commitment(&config.commitment) {
            self.add_error(result, format!("Commitment: {}", e))?;
        }

        let timeouts = [
            ("Probe timeout", config.probe_timeout_ms),
            ("Request timeout", config.request_timeout_ms),
            ("Confirmation timeout", config.confirmation_timeout_ms),
            ("Confirmation poll interval", config.confirmation_poll_interval_ms),
        ];
        for (name, value) in timeouts {
            if let Err(e) = validation::validate_timeout_ms(value) {
                self.add_error(result, format!("{}: {}", name, e))?;
            }
        }

        if config.confirmation_poll_interval_ms >= config.confirmation_timeout_ms {
            self.add_error(result, "Confirmation poll interval must be shorter than the confirmation timeout".to_string())?;
        }

        if config.probe_timeout_ms > 10_000 {
            self.add_warning(result, "Probe timeout over 10 seconds - a dead endpoint will stall wallet connect");
        }

        Ok(())
    }

    fn validate_payment(&self, config: &PaymentConfig, result: &mut ValidationResult) -> AppResult<()> {
        if let Err(e) = validation::validate_solana_address(&config.treasury_address) {
            self.add_error(result, format!("Treasury address: {}", e))?;
        }

        if config.plans.is_empty() {
            self.add_error(result, "Plan catalogue cannot be empty".to_string())?;
        }

        for (i, plan) in config.plans.iter().enumerate() {
            if let Err(e) = plan.validate() {
                self.add_error(result, format!("Plan {}: {}", i + 1, e))?;
            } else if let Err(e) = plan.price_lamports() {
                self.add_error(result, format!("Plan {}: {}", i + 1, e))?;
            }
        }

        if config.estimated_fee_lamports == 0 {
            self.add_warning(result, "Estimated fee is zero - balance checks will not reserve network fees");
        }

        Ok(())
    }

    fn validate_recorder(&self, config: &RecorderConfig, result: &mut ValidationResult) -> AppResult<()> {
        match validation::validate_url(&config.endpoint_url) {
            Ok(url) => {
                if url.scheme() == "http" && !matches!(url.host_str(), Some("127.0.0.1" | "localhost")) {
                    self.add_warning(result, "Recorder endpoint uses plain HTTP on a non-local host");
                }
            }
            Err(e) => self.add_error(result, format!("Recorder URL: {}", e))?,
        }

        if let Err(e) = validation::validate_timeout_ms(config.request_timeout_ms) {
            self.add_error(result, format!("Recorder timeout: {}", e))?;
        }

        Ok(())
    }

    fn validate_server(&self, config: &ServerConfig, result: &mut ValidationResult) -> AppResult<()> {
        if config.bind_address.parse::<std::net::SocketAddr>().is_err() {
            self.add_error(result, format!("Invalid bind address '{}'", config.bind_address))?;
        }

        if config.processing_delay_ms > 30_000 {
            self.add_warning(result, "Processing delay over 30 seconds - clients may time out");
        }

        Ok(())
    }

    fn validate_telemetry(&self, config: &TelemetryConfig, result: &mut ValidationResult) -> AppResult<()> {
        if config.enable_metrics {
            if let Err(e) = validation::validate_port(config.metrics_port) {
                self.add_error(result, format!("Metrics port: {}", e))?;
            }
        }

        Ok(())
    }

    /// Cross-configuration validation
    fn validate_cross_config(&self, config: &AppConfig, result: &mut ValidationResult) -> AppResult<()> {
        if config.telemetry.enable_metrics {
            if let Ok(addr) = config.server.bind_address.parse::<std::net::SocketAddr>() {
                if addr.port() == config.telemetry.metrics_port {
                    self.add_error(result, format!(
                        "Port conflict: server and metrics both use port {}",
                        addr.port()
                    ))?;
                }
            }
        }

        if config.environment.name == "production" {
            if !config.server.verify_transactions {
                self.add_warning(result, "Transaction verification disabled in production - purchases are recorded on trust");
            }
            if config.solana.commitment == "processed" {
                self.add_warning(result, "Processed commitment in production - confirmed payments may be rolled back");
            }
        }

        if config.recorder.request_timeout_ms < config.server.processing_delay_ms {
            self.add_warning(result, "Recorder timeout is shorter than the server processing delay");
        }

        Ok(())
    }

    /// Add an error to the validation result
    fn add_error(&self, result: &mut ValidationResult, message: String) -> AppResult<()> {
        result.errors.push(message.clone());
        result.is_valid = false;

        if !self.collect_all_errors {
            return Err(AppError::validation(message));
        }

        Ok(())
    }

    /// Add a warning to the validation result
    fn add_warning(&self, result: &mut ValidationResult, message: &str) {
        result.warnings.push(message.to_string());

        if self.strict_mode {
            result.is_valid = false;
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    /// Validate this configuration using the default validator
    pub fn validate(&self) -> AppResult<ValidationResult> {
        ConfigValidator::new().validate(self)
    }

    /// Validate this configuration with strict mode
    pub fn validate_strict(&self) -> AppResult<ValidationResult> {
        ConfigValidator::new().with_strict_mode().validate(self)
    }

    /// Quick validation that returns only a boolean result
    pub fn is_valid(&self) -> bool {
        self.validate().map(|r| r.is_valid).unwrap_or(false)
    }

    /// Validate and return errors if any
    pub fn validation_errors(&self) -> Vec<String> {
        self.validate()
            .map(|r| r.errors)
            .unwrap_or_else(|e| vec![e.to_string()])
    }
}
