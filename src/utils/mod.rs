//! Utility functions and helpers used throughout the application
//!
//! Validation, logging setup and command-line parsing.

pub mod validation;

// Re-export commonly used utilities
pub use validation::*;

/// Telemetry and observability utilities
pub mod telemetry {
    use anyhow::{anyhow, Result};
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
    };

    /// Initialize global tracing with the specified log level and format
    pub fn init(log_level: &str, log_format: &str) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level));

        let registry = Registry::default().with(env_filter);

        let outcome = match log_format {
            "json" => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                )
                .try_init(),
            "compact" => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_thread_ids(false)
                )
                .try_init(),
            _ => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                )
                .try_init(),
        };

        outcome.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))
    }

    /// Initialize console logging plus a daily-rotated log file
    ///
    /// The returned guard flushes the file writer on drop; keep it alive for
    /// the lifetime of the process.
    pub fn init_with_file_rotation(
        log_level: &str,
        log_format: &str,
        log_directory: &str,
        file_name_prefix: &str,
    ) -> Result<WorkerGuard> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level));

        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            log_directory,
            file_name_prefix,
        );

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let registry = Registry::default().with(env_filter);

        let outcome = match log_format {
            "json" => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                )
                .with(fmt::layer().compact().with_target(true))
                .try_init(),
            _ => registry
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                )
                .with(fmt::layer().pretty().with_target(true))
                .try_init(),
        };

        outcome.map_err(|e| anyhow!("Failed to initialize tracing: {}", e))?;
        Ok(guard)
    }
}

/// Command line argument parsing
pub mod cli {
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    /// Command line arguments for the application
    #[derive(Parser, Debug, Clone)]
    #[command(
        name = "checkout",
        about = "MK Volume Bot checkout: pay for trading time in SOL and record the purchase",
        version = env!("CARGO_PKG_VERSION")
    )]
    pub struct CliArgs {
        /// Path to configuration file
        #[arg(short, long, env = "CONFIG_PATH", global = true)]
        pub config_path: Option<String>,

        /// Logging level (trace, debug, info, warn, error)
        #[arg(short, long, global = true)]
        pub log_level: Option<String>,

        /// Log format (json, pretty, compact)
        #[arg(long, global = true)]
        pub log_format: Option<String>,

        /// Environment (development, staging, production, test)
        #[arg(short, long, global = true)]
        pub environment: Option<String>,

        /// RPC endpoint, in priority order (repeatable or comma separated)
        #[arg(long = "rpc-url", value_delimiter = ',', global = true)]
        pub rpc_urls: Vec<String>,

        /// Enable metrics collection
        #[arg(long, global = true)]
        pub enable_metrics: bool,

        #[command(subcommand)]
        pub command: Option<Command>,
    }

    /// Subcommands; `serve` runs when none is given
    #[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
    pub enum Command {
        /// Run the purchase recorder HTTP server
        Serve,

        /// Print the plan catalogue
        Plans,

        /// Probe every configured RPC endpoint
        Probe,

        /// Buy a plan with a local keypair
        Pay {
            /// Plan number as listed by `plans`
            #[arg(long)]
            plan: usize,

            /// Path to a Solana keypair JSON file
            #[arg(long)]
            keypair: PathBuf,

            /// Approve the transfer without prompting
            #[arg(long)]
            yes: bool,
        },
    }

    impl CliArgs {
        /// Selected subcommand, defaulting to `serve`
        pub fn command(&self) -> Command {
            self.command.clone().unwrap_or(Command::Serve)
        }
    }
}

// Re-export CLI utilities
pub use cli::{CliArgs, Command};
