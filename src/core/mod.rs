//! Core domain layer containing value objects, errors and domain rules
//!
//! Everything here is free of I/O: error types, the result alias, plans and
//! SOL/lamport amounts, plus the constants the checkout flow is built around.

pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::AppError;
pub use result::AppResult;
pub use types::*;

/// Domain constants and business rules
pub mod domain {
    use std::time::Duration;

    /// Lamports in one SOL
    pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    /// Fee assumed for a single-signature transfer when checking the balance
    pub const DEFAULT_ESTIMATED_FEE_LAMPORTS: u64 = 5_000;

    /// Destination account for plan payments
    pub const DEFAULT_TREASURY_ADDRESS: &str = "6WgiZL5Aggq2XvTb4BJDkDh81nSmfjb9FTh66EkPKP1F";

    /// Public mainnet RPC endpoint
    pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

    /// Upper bound for a single endpoint probe
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

    /// Upper bound for waiting on transaction confirmation
    pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

    /// First interval between confirmation polls
    pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Simulated processing time of the purchase recorder
    pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(1000);
}
