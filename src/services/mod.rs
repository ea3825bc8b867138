//! Services layer
//!
//! Collaborator seams of the checkout (ledger, wallet, recorder) and the
//! payment state machine that drives them.

pub mod payment;
pub mod recorder;
pub mod solana;
pub mod wallet;

pub use payment::{PaymentMachine, PaymentOutcome, PaymentSettings, PaymentStatus};
pub use recorder::{HttpPurchaseRecorder, PurchaseRecorder};
pub use solana::{EndpointResolver, LedgerRpc};
pub use wallet::{KeypairWallet, WalletProvider};
