//! MK Volume Bot checkout
//!
//! Pays for bot trading time in SOL and records the purchase with the bot
//! backend.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! │   recorder server (axum)   ·   health   ·   lifecycle        │
//! └──────────────────────────────────────────────────────────────┘
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Services Layer                         │
//! │  ┌─────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────┐   │
//! │  │ Payment │  │  Solana  │  │  Wallet  │  │   Recorder   │   │
//! │  │ machine │  │ resolver │  │ provider │  │    client    │   │
//! │  └─────────┘  └──────────┘  └──────────┘  └──────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ┌──────────────────────────────────────────────────────────────┐
//! │              Core · Config · Utils                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`PaymentMachine`](services::PaymentMachine) walks one purchase through
//! `Idle → WalletConnecting → WalletConnected → Submitting → AwaitingSignature
//! → Broadcasting → Confirming → Recording → Succeeded`, failing into exactly
//! one [`FailureKind`](services::payment::FailureKind) on the way.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mk_volume_checkout::{Application, ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load().await?;
//!     let app = Application::build(config).await?;
//!     app.run().await?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Domain types, errors and constants
pub mod core;

// Recorder service and lifecycle
pub mod application;

// Multi-source configuration loading
pub mod config;

// Checkout services and collaborator seams
pub mod services;

// Validation, telemetry and CLI
pub mod utils;

pub use application::Application;
pub use config::{AppConfig, ConfigLoader};
pub use self::core::{
    error::AppError,
    result::AppResult,
    types::*,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
