//! Input validation utilities and helpers
//!
//! Format checks for addresses, signatures, URLs and the handful of enumerated
//! configuration values. Used by the config validator and the recorder server.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use url::Url;

/// Regex for validating Solana addresses (base58, 32-44 characters)
static SOLANA_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("static regex")
});

/// Regex for validating transaction signatures
static TX_SIGNATURE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{87,88}$").expect("static regex")
});

/// Validate a Solana address and decode it
pub fn validate_solana_address(address: &str) -> Result<Pubkey> {
    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    if !SOLANA_ADDRESS_REGEX.is_match(address) {
        return Err(anyhow!("Invalid Solana address format"));
    }

    let pubkey = Pubkey::from_str(address)
        .map_err(|e| anyhow!("Invalid Solana address: {}", e))?;

    validate_not_system_address(&pubkey)?;

    Ok(pubkey)
}

/// Payments must never target the system program
fn validate_not_system_address(pubkey: &Pubkey) -> Result<()> {
    if *pubkey == solana_sdk::system_program::id() {
        return Err(anyhow!("Cannot use system program address"));
    }

    Ok(())
}

/// Validate a transaction signature
pub fn validate_transaction_signature(signature: &str) -> Result<()> {
    if signature.is_empty() {
        return Err(anyhow!("Transaction signature cannot be empty"));
    }

    if !TX_SIGNATURE_REGEX.is_match(signature) {
        return Err(anyhow!("Invalid transaction signature format"));
    }

    Ok(())
}

/// Validate a URL
pub fn validate_url(url_str: &str) -> Result<Url> {
    if url_str.is_empty() {
        return Err(anyhow!("URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| anyhow!("Invalid URL format: {}", e))?;

    match url.scheme() {
        "http" | "https" => {},
        _ => return Err(anyhow!("URL must use http or https scheme")),
    }

    if url.host().is_none() {
        return Err(anyhow!("URL must have a host"));
    }

    Ok(url)
}

/// Validate a port number
pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port cannot be 0"));
    }

    if port < 1024 {
        return Err(anyhow!("Port must be >= 1024 (non-privileged ports only)"));
    }

    Ok(())
}

/// Validate string length
pub fn validate_string_length(
    value: &str,
    min_length: Option<usize>,
    max_length: Option<usize>,
    field_name: &str,
) -> Result<()> {
    let len = value.chars().count();

    if let Some(min) = min_length {
        if len < min {
            return Err(anyhow!("{} must be at least {} characters", field_name, min));
        }
    }

    if let Some(max) = max_length {
        if len > max {
            return Err(anyhow!("{} must be at most {} characters", field_name, max));
        }
    }

    Ok(())
}

/// Validate a timeout value in milliseconds
pub fn validate_timeout_ms(timeout_ms: u64) -> Result<()> {
    if timeout_ms == 0 {
        return Err(anyhow!("Timeout cannot be zero"));
    }

    if timeout_ms > 600_000 {
        return Err(anyhow!("Timeout cannot exceed 10 minutes"));
    }

    Ok(())
}

/// Configuration-specific validators
pub mod config {
    use super::*;

    /// Validate a log level
    pub fn validate_log_level(level: &str) -> Result<()> {
        match level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(anyhow!("Invalid log level '{}'", level)),
        }
    }

    /// Validate a log format
    pub fn validate_log_format(format: &str) -> Result<()> {
        match format {
            "json" | "pretty" | "compact" => Ok(()),
            _ => Err(anyhow!("Invalid log format '{}'. Must be 'json', 'pretty', or 'compact'", format)),
        }
    }

    /// Validate an environment name
    pub fn validate_environment(env: &str) -> Result<()> {
        match env {
            "development" | "staging" | "production" | "test" => Ok(()),
            _ => Err(anyhow!("Invalid environment '{}'", env)),
        }
    }

    /// Validate a commitment level
    pub fn validate_commitment(commitment: &str) -> Result<()> {
        match commitment {
            "processed" | "confirmed" | "finalized" => Ok(()),
            _ => Err(anyhow!(
                "Invalid commitment level '{}'. Must be 'processed', 'confirmed', or 'finalized'",
                commitment
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solana_address_validation() {
        assert!(validate_solana_address("6WgiZL5Aggq2XvTb4BJDkDh81nSmfjb9FTh66EkPKP1F").is_ok());
        assert!(validate_solana_address("").is_err());
        assert!(validate_solana_address("not-an-address").is_err());
        assert!(validate_solana_address("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl").is_err());
        assert!(validate_solana_address("11111111111111111111111111111111").is_err());
    }

    #[test]
    fn test_signature_validation() {
        let signature = solana_sdk::signature::Signature::from([7u8; 64]).to_string();
        assert!(validate_transaction_signature(&signature).is_ok());
        assert!(validate_transaction_signature("").is_err());
        assert!(validate_transaction_signature("abc").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(validate_url("https://api.mainnet-beta.solana.com").is_ok());
        assert!(validate_url("http://127.0.0.1:3000/api/process-payment").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("invalid").is_err());
        assert!(validate_url("").is_err());
    }

    #[test]
    fn test_port_and_timeout_validation() {
        assert!(validate_port(9090).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(80).is_err());

        assert!(validate_timeout_ms(3_000).is_ok());
        assert!(validate_timeout_ms(0).is_err());
        assert!(validate_timeout_ms(3_600_000).is_err());
    }

    #[test]
    fn test_config_validators() {
        assert!(config::validate_log_level("DEBUG").is_ok());
        assert!(config::validate_log_level("verbose").is_err());
        assert!(config::validate_log_format("json").is_ok());
        assert!(config::validate_log_format("xml").is_err());
        assert!(config::validate_environment("staging").is_ok());
        assert!(config::validate_environment("qa").is_err());
        assert!(config::validate_commitment("finalized").is_ok());
        assert!(config::validate_commitment("max").is_err());
    }

    #[test]
    fn test_string_length() {
        assert!(validate_string_length("Starter", Some(1), Some(64), "label").is_ok());
        assert!(validate_string_length("", Some(1), None, "label").is_err());
    }
}
