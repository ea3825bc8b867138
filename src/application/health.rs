//! Health reporting
//!
//! Health is derived from a fresh probe of every configured RPC endpoint. The
//! ledger is the only dependency the checkout cannot work without, so every
//! endpoint is a component and the overall status follows how many of them
//! answer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::services::solana::{EndpointResolver, ProbeReport};

/// Overall or per-component health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything answers
    Healthy,
    /// At least one endpoint answers, some do not
    Degraded,
    /// Nothing to pay through
    Unhealthy,
}

/// Health of one RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl ComponentHealth {
    pub fn from_probe(report: &ProbeReport) -> Self {
        let (status, message) = match &report.error {
            None => (HealthStatus::Healthy, None),
            Some(e) => (HealthStatus::Unhealthy, Some(e.to_string())),
        };

        Self {
            name: report.endpoint.clone(),
            status,
            message,
            response_time_ms: report.latency.as_millis() as u64,
        }
    }
}

/// Answer of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: &'static str,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let healthy = components.iter().filter(|c| c.status == HealthStatus::Healthy).count();
        let status = if healthy == 0 {
            HealthStatus::Unhealthy
        } else if healthy < components.len() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            version: crate::VERSION,
            components,
            checked_at: Utc::now(),
        }
    }

    /// Multi-line summary for the terminal
    pub fn summary(&self) -> String {
        let mut summary = format!("Overall Status: {}\n\nEndpoints:\n", self.status);

        for component in &self.components {
            let status_emoji = match component.status {
                HealthStatus::Healthy => "✅",
                HealthStatus::Degraded => "⚠️",
                HealthStatus::Unhealthy => "❌",
            };

            summary.push_str(&format!(
                "{} {} ({}ms)",
                status_emoji, component.name, component.response_time_ms
            ));
            if let Some(message) = &component.message {
                summary.push_str(&format!(" - {}", message));
            }
            summary.push('\n');
        }

        summary
    }
}

/// Probes the ledger on demand
#[derive(Debug, Clone)]
pub struct HealthService {
    resolver: Arc<EndpointResolver>,
}

impl HealthService {
    pub fn new(resolver: Arc<EndpointResolver>) -> Self {
        Self { resolver }
    }

    #[instrument(skip(self))]
    pub async fn check(&self) -> HealthReport {
        debug!("🔍 Probing {} RPC endpoint(s)", self.resolver.candidates().len());

        let components = self.resolver
            .probe_all()
            .await
            .iter()
            .map(ComponentHealth::from_probe)
            .collect();

        let report = HealthReport::from_components(components);
        if report.status != HealthStatus::Healthy {
            warn!("⚠️  Health check: {}", report.status);
        }
        report
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}
