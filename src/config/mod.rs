//! Configuration management module
//!
//! Loading from TOML, environment and CLI layers, plus startup validation.

pub mod loader;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use loader::{ConfigLoader, load_config, load_config_from_path};
pub use models::{
    AppConfig, EnvironmentConfig, PaymentConfig, RecorderConfig, ServerConfig, SolanaConfig,
    TelemetryConfig,
};
pub use validation::{ConfigValidator, ValidationResult};

// Re-export CLI args from utils for convenience
pub use crate::utils::CliArgs;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        let result = config.validate().unwrap();

        assert!(result.is_valid, "default configuration has errors: {:?}", result.errors);
    }
}
