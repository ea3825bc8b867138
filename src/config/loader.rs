//! Configuration loader with multi-source support
//!
//! Configuration is layered: TOML file, then `CHECKOUT_*` environment
//! variables, then command-line arguments. A missing file falls back to the
//! built-in defaults so the CLI works out of the box.

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::de::DeserializeOwned;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::result::AppResult;
use crate::utils::CliArgs;
use super::models::AppConfig;

/// Configuration loader with support for multiple sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base configuration path
    config_path: Option<PathBuf>,

    /// CLI arguments
    cli_args: Option<CliArgs>,

    /// Environment prefix for variables
    env_prefix: String,

    /// Enable environment variable loading
    enable_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_path: None,
            cli_args: None,
            env_prefix: "CHECKOUT".to_string(),
            enable_env: true,
        }
    }

    /// Set the base configuration path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set CLI arguments
    pub fn with_cli_args(mut self, args: CliArgs) -> Self {
        self.cli_args = Some(args);
        self
    }

    /// Set environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Disable environment variable loading
    pub fn without_env(mut self) -> Self {
        self.enable_env = false;
        self
    }

    /// Load and build the complete application configuration
    pub async fn load(self) -> AppResult<AppConfig> {
        info!("🔧 Loading checkout configuration");

        let mut config = self.load_base_config()
            .await
            .context("Failed to load base configuration")?;

        if self.enable_env {
            self.apply_environment_overrides(&mut config)
                .context("Failed to apply environment overrides")?;
        }

        if let Some(ref cli_args) = self.cli_args {
            self.apply_cli_overrides(&mut config, cli_args);
        }

        debug!(
            environment = %config.environment.name,
            endpoints = config.solana.rpc_urls.len(),
            plans = config.payment.plans.len(),
            "✅ Configuration loaded"
        );

        Ok(config)
    }

    /// Load base configuration from TOML file
    async fn load_base_config(&self) -> Result<AppConfig> {
        let config_path = self.resolve_config_path();

        if !config_path.exists() {
            warn!("⚠️  Configuration file not found: {}", config_path.display());
            warn!("⚠️  Using default configuration values");
            return Ok(AppConfig::default());
        }

        info!("📄 Loading base configuration from: {}", config_path.display());

        let config_content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Resolve the configuration file path
    fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref path) = self.config_path {
            return path.clone();
        }

        if let Some(path) = self.cli_args.as_ref().and_then(|a| a.config_path.as_ref()) {
            return PathBuf::from(path);
        }

        if let Ok(path) = env::var("CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let default_paths = [
            "configs/checkout.toml",
            "checkout.toml",
            "/etc/mk-volume-checkout/checkout.toml",
        ];

        for path in &default_paths {
            let pb = PathBuf::from(path);
            if pb.exists() {
                debug!("📍 Found config file at: {}", pb.display());
                return pb;
            }
        }

        PathBuf::from(default_paths[0])
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&self, config: &mut AppConfig) -> Result<()> {
        debug!("🌍 Applying environment variable overrides");

        let env_config = Config::builder()
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true)
            )
            .build()
            .context("Failed to build environment configuration")?;

        self.apply_env_var(config, &env_config, "solana_rpc_urls", |cfg, val: String| {
            let urls: Vec<String> = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !urls.is_empty() {
                cfg.solana.rpc_urls = urls;
            }
        });

        self.apply_env_var(config, &env_config, "solana_commitment", |cfg, val: String| {
            cfg.solana.commitment = val;
        });

        self.apply_env_var(config, &env_config, "treasury_address", |cfg, val: String| {
            cfg.payment.treasury_address = val;
        });

        self.apply_env_var(config, &env_config, "recorder_url", |cfg, val: String| {
            cfg.recorder.endpoint_url = val;
        });

        self.apply_env_var(config, &env_config, "bind_address", |cfg, val: String| {
            cfg.server.bind_address = val;
        });

        self.apply_env_var(config, &env_config, "verify_transactions", |cfg, val: bool| {
            cfg.server.verify_transactions = val;
        });

        self.apply_env_var(config, &env_config, "environment", |cfg, val: String| {
            cfg.environment.name = val;
        });

        self.apply_env_var(config, &env_config, "log_level", |cfg, val: String| {
            cfg.environment.log_level = val;
        });

        self.apply_env_var(config, &env_config, "log_format", |cfg, val: String| {
            cfg.environment.log_format = val;
        });

        self.apply_env_var(config, &env_config, "enable_metrics", |cfg, val: bool| {
            cfg.telemetry.enable_metrics = val;
        });

        Ok(())
    }

    /// Apply a single environment variable with type conversion
    fn apply_env_var<T, F>(&self, config: &mut AppConfig, env_config: &Config, key: &str, applier: F)
    where
        T: DeserializeOwned,
        F: FnOnce(&mut AppConfig, T),
    {
        if let Ok(value) = env_config.get::<T>(key) {
            applier(config, value);
            debug!("🔄 Applied environment override: {}", key);
        }
    }

    /// Apply CLI argument overrides
    fn apply_cli_overrides(&self, config: &mut AppConfig, cli_args: &CliArgs) {
        debug!("⌨️  Applying CLI argument overrides");

        if let Some(ref env_name) = cli_args.environment {
            config.environment.name = env_name.clone();
        }

        if let Some(ref level) = cli_args.log_level {
            config.environment.log_level = level.clone();
        }

        if let Some(ref format) = cli_args.log_format {
            config.environment.log_format = format.clone();
        }

        if !cli_args.rpc_urls.is_empty() {
            config.solana.rpc_urls = cli_args.rpc_urls.clone();
        }

        if cli_args.enable_metrics {
            config.telemetry.enable_metrics = true;
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to load configuration with default settings
pub async fn load_config() -> AppResult<AppConfig> {
    ConfigLoader::new().load().await
}

/// Load configuration from a specific path
pub async fn load_config_from_path<P: AsRef<Path>>(path: P) -> AppResult<AppConfig> {
    ConfigLoader::new()
        .with_config_path(path)
        .load()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn cli_args() -> CliArgs {
        CliArgs {
            config_path: None,
            log_level: None,
            log_format: None,
            environment: None,
            rpc_urls: vec![],
            enable_metrics: false,
            command: None,
        }
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .with_config_path(dir.path().join("absent.toml"))
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.environment.name, "development");
        assert_eq!(config.payment.plans.len(), 3);
    }

    #[tokio::test]
    async fn test_load_from_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkout.toml");
        tokio::fs::write(&path, r#"
            [environment]
            name = "staging"
            log_level = "debug"
            log_format = "compact"

            [solana]
            rpc_urls = ["https://rpc-a.example", "https://rpc-b.example", "https://rpc-c.example"]
            probe_timeout_ms = 750

            [payment]
            treasury_address = "6WgiZL5Aggq2XvTb4BJDkDh81nSmfjb9FTh66EkPKP1F"
            refresh_balance_before_submit = false

            [[payment.plans]]
            hours = 12
            sol = 0.05
            label = "Trial"

            [recorder]
            endpoint_url = "https://bot.example/api/process-payment"
        "#).await.unwrap();

        let config = load_config_from_path(&path).await.unwrap();

        assert_eq!(config.environment.name, "staging");
        assert_eq!(config.solana.rpc_urls.len(), 3);
        assert_eq!(config.solana.probe_timeout_ms, 750);
        assert!(!config.payment.refresh_balance_before_submit);
        assert_eq!(config.payment.plans.len(), 1);
        assert_eq!(config.payment.plans[0].label, "Trial");
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        tokio::fs::write(&path, "[environment\nname=").await.unwrap();

        let result = ConfigLoader::new().with_config_path(&path).without_env().load().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let mut args = cli_args();
        args.log_level = Some("trace".to_string());
        args.log_format = Some("json".to_string());
        args.environment = Some("test".to_string());
        args.rpc_urls = vec!["https://cli-rpc.example".to_string()];
        args.enable_metrics = true;

        let config = ConfigLoader::new()
            .with_config_path(dir.path().join("absent.toml"))
            .with_cli_args(args)
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.environment.log_level, "trace");
        assert_eq!(config.environment.log_format, "json");
        assert_eq!(config.environment.name, "test");
        assert_eq!(config.solana.rpc_urls, vec!["https://cli-rpc.example".to_string()]);
        assert!(config.telemetry.enable_metrics);
    }

    #[test]
    fn test_environment_variable_override() {
        // Unique prefix so parallel tests never observe these variables
        env::set_var("CKTEST_SOLANA_RPC_URLS", "https://a.example, https://b.example");
        env::set_var("CKTEST_VERIFY_TRANSACTIONS", "true");

        let loader = ConfigLoader::new().with_env_prefix("CKTEST");
        let mut config = AppConfig::default();
        let result = loader.apply_environment_overrides(&mut config);

        env::remove_var("CKTEST_SOLANA_RPC_URLS");
        env::remove_var("CKTEST_VERIFY_TRANSACTIONS");

        assert!(result.is_ok());
        assert_eq!(
            config.solana.rpc_urls,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(config.server.verify_transactions);
    }

    #[test]
    fn test_config_path_resolution_prefers_explicit_path() {
        let loader = ConfigLoader::new().with_config_path("/tmp/explicit.toml");
        assert_eq!(loader.resolve_config_path(), PathBuf::from("/tmp/explicit.toml"));
    }
}
