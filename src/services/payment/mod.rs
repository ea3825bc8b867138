//! Plan checkout: intent lifecycle, failure taxonomy and the state machine
//! that drives a SOL transfer from wallet connection to purchase record.

pub mod failure;
pub mod intent;
pub mod machine;

pub use failure::{FailureKind, PaymentFailure};
pub use intent::{PaymentIntent, PaymentStatus};
pub use machine::{
    CancelHandle, ConnectOutcome, PaymentMachine, PaymentObserver, PaymentOutcome, PaymentSettings,
    StatusEvent,
};
