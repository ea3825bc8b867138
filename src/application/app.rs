//! Recorder service lifecycle
//!
//! Builds the server state from configuration, binds the listener and serves
//! until SIGINT or SIGTERM.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::services::solana::EndpointResolver;
use super::server::{self, ServerState};

/// The recorder service, ready to run
#[derive(Debug)]
pub struct Application {
    config: Arc<AppConfig>,
    state: ServerState,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl Application {
    /// Validate the configuration and wire the server state
    #[instrument(skip(config))]
    pub async fn build(config: AppConfig) -> AppResult<Self> {
        info!("🏗️  Building recorder service");

        let validation_result = config.validate()?;
        if !validation_result.is_valid {
            return Err(AppError::config(format!(
                "Configuration validation failed: {:?}",
                validation_result.errors
            )));
        }

        for warning in &validation_result.warnings {
            warn!("⚠️  Configuration warning: {}", warning);
        }

        let resolver = Arc::new(EndpointResolver::from_config(&config.solana));
        let state = ServerState::new(&config, resolver)?;

        Ok(Self {
            config: Arc::new(config),
            state,
            started_at: chrono::Utc::now(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn uptime(&self) -> chrono::Duration {
        chrono::Utc::now() - self.started_at
    }

    /// Serve on the configured address until a shutdown signal arrives
    pub async fn run(self) -> AppResult<()> {
        let addr: SocketAddr = self.config.server.bind_address.parse().map_err(|e| {
            AppError::config(format!("Invalid bind address '{}': {}", self.config.server.bind_address, e))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::network(format!("Failed to bind {}: {}", addr, e)))?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    #[instrument(skip_all)]
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!(
            "🚀 Recorder listening on {} ({} mode, verification {})",
            local_addr,
            self.config.environment.name,
            if self.config.server.verify_transactions { "on" } else { "off" }
        );

        axum::serve(listener, server::router(self.state.clone()))
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("👋 Recorder stopped after {}s", self.uptime().num_seconds());
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️  Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("⚠️  Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("📡 Received Ctrl+C, shutting down"),
        _ = terminate => info!("📡 Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recorder::{HttpPurchaseRecorder, PurchaseRecord, PurchaseRecorder};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.processing_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let mut config = test_config();
        config.solana.rpc_urls.clear();

        assert!(matches!(Application::build(config).await, Err(AppError::Config { .. })));
    }

    #[tokio::test]
    async fn test_serves_records_until_shutdown() {
        let app = Application::build(test_config()).await.unwrap();
        assert_eq!(app.config().server.processing_delay_ms, 0);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(app.serve(listener, async {
            let _ = stop_rx.await;
        }));

        let recorder = HttpPurchaseRecorder::new(
            &format!("http://{}/api/process-payment", addr),
            Duration::from_secs(5),
        ).unwrap();

        let receipt = recorder.record(&PurchaseRecord {
            hours: 720,
            sol: dec!(1.5),
            wallet_address: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string(),
            transaction_hash: "abc123".to_string(),
        }).await.unwrap();

        assert_eq!(receipt.message, "Successfully purchased 720 hours of trading time");
        assert!(receipt.purchase_id.starts_with("purchase_"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
