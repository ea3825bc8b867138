//! Application layer: the purchase recorder service, its health endpoint and
//! process lifecycle.

pub mod app;
pub mod health;
pub mod server;

pub use app::{shutdown_signal, Application};
pub use health::{ComponentHealth, HealthReport, HealthService, HealthStatus};
pub use server::{router, ServerState};
