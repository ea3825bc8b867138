//! Ordered RPC endpoint selection
//!
//! Candidates are probed strictly in configuration order with a per-probe
//! timeout. The first one that returns a blockhash in time wins. A
//! [`ResolutionCursor`] remembers how far an attempt has progressed so an
//! endpoint that failed once is never probed again within that attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::models::SolanaConfig;
use super::rpc::{LedgerRpc, RpcConnector, RpcError, SolanaConnector};

/// Outcome of probing one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Endpoint URL
    pub endpoint: String,
    /// Time spent waiting for the probe
    pub latency: Duration,
    /// `None` when healthy
    pub error: Option<RpcError>,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Resolution failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Every remaining candidate failed its probe
    #[error("no RPC endpoint available ({} failed)", failures.len())]
    NoEndpointAvailable { failures: Vec<ProbeReport> },
}

/// Progress through the candidate list for a single payment attempt
#[derive(Debug, Default, Clone)]
pub struct ResolutionCursor {
    next: usize,
    failures: Vec<ProbeReport>,
}

impl ResolutionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe failures recorded so far
    pub fn failures(&self) -> &[ProbeReport] {
        &self.failures
    }

    /// Mark an already-selected endpoint as failed so it is not offered again
    pub fn record_failure(&mut self, error: RpcError) {
        self.failures.push(ProbeReport {
            endpoint: error.endpoint().to_string(),
            latency: Duration::ZERO,
            error: Some(error),
        });
    }
}

/// Picks the first healthy endpoint from an ordered list
pub struct EndpointResolver {
    candidates: Vec<String>,
    probe_timeout: Duration,
    connector: Arc<dyn RpcConnector>,
}

impl std::fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("candidates", &self.candidates)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl EndpointResolver {
    pub fn new(candidates: Vec<String>, probe_timeout: Duration, connector: Arc<dyn RpcConnector>) -> Self {
        Self { candidates, probe_timeout, connector }
    }

    /// Resolver over the configured endpoints using real Solana clients
    pub fn from_config(config: &SolanaConfig) -> Self {
        Self::new(
            config.rpc_urls.clone(),
            config.probe_timeout(),
            Arc::new(SolanaConnector::from_config(config)),
        )
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Resolve from the beginning of the list
    pub async fn resolve(&self) -> Result<Arc<dyn LedgerRpc>, ResolveError> {
        self.resolve_next(&mut ResolutionCursor::new()).await
    }

    /// Resolve the next healthy endpoint after those the cursor has consumed
    #[instrument(skip(self, cursor), fields(start = cursor.next))]
    pub async fn resolve_next(&self, cursor: &mut ResolutionCursor) -> Result<Arc<dyn LedgerRpc>, ResolveError> {
        while let Some(url) = self.candidates.get(cursor.next) {
            cursor.next += 1;

            let client = self.connector.connect(url);
            let report = self.probe(client.as_ref()).await;

            if report.is_healthy() {
                info!("✅ Using RPC endpoint {} ({:?})", url, report.latency);
                return Ok(client);
            }

            warn!("⚠️  RPC endpoint {} failed probe: {:?}", url, report.error);
            cursor.failures.push(report);
        }

        warn!("❌ All {} RPC endpoints failed", self.candidates.len());
        Err(ResolveError::NoEndpointAvailable { failures: cursor.failures.clone() })
    }

    /// Probe every candidate, for health reporting
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::with_capacity(self.candidates.len());
        for url in &self.candidates {
            let client = self.connector.connect(url);
            reports.push(self.probe(client.as_ref()).await);
        }
        reports
    }

    async fn probe(&self, client: &dyn LedgerRpc) -> ProbeReport {
        let endpoint = client.endpoint();
        let started = Instant::now();

        let error = match tokio::time::timeout(self.probe_timeout, client.get_latest_blockhash()).await {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(RpcError::Timeout { endpoint: endpoint.clone() }),
        };

        let latency = started.elapsed();
        let outcome = if error.is_none() { "healthy" } else { "failed" };
        metrics::histogram!("checkout_rpc_probe_duration_seconds", "outcome" => outcome)
            .record(latency.as_secs_f64());
        debug!("🩺 Probe {} -> {} in {:?}", endpoint, outcome, latency);

        ProbeReport { endpoint, latency, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::rpc::{MockLedgerRpc, MockRpcConnector};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
    use super::super::rpc::Confirmation;
    use super::super::transfer::LandedTransaction;

    fn healthy(url: &str) -> MockLedgerRpc {
        let mut rpc = MockLedgerRpc::new();
        let endpoint = url.to_string();
        rpc.expect_endpoint().returning(move || endpoint.clone());
        rpc.expect_get_latest_blockhash().returning(|| Ok(Hash::new_unique()));
        rpc
    }

    fn refusing(url: &str) -> MockLedgerRpc {
        let mut rpc = MockLedgerRpc::new();
        let endpoint = url.to_string();
        rpc.expect_endpoint().returning(move || endpoint.clone());
        let endpoint = url.to_string();
        rpc.expect_get_latest_blockhash().returning(move || {
            Err(RpcError::Transport { endpoint: endpoint.clone(), message: "refused".to_string() })
        });
        rpc
    }

    /// Node that never answers
    struct Stalled(String);

    #[async_trait]
    impl LedgerRpc for Stalled {
        fn endpoint(&self) -> String {
            self.0.clone()
        }
        async fn get_balance(&self, _: &Pubkey) -> Result<u64, RpcError> {
            std::future::pending().await
        }
        async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
            std::future::pending().await
        }
        async fn send_transaction(&self, _: &Transaction) -> Result<Signature, RpcError> {
            std::future::pending().await
        }
        async fn confirm_transaction(&self, _: &Signature) -> Result<Confirmation, RpcError> {
            std::future::pending().await
        }
        async fn get_transaction(&self, _: &Signature) -> Result<LandedTransaction, RpcError> {
            std::future::pending().await
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://rpc-{}.example", i)).collect()
    }

    #[tokio::test]
    async fn test_first_healthy_endpoint_wins() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let mut connector = MockRpcConnector::new();
        connector.expect_connect().returning(move |url| {
            seen.lock().push(url.to_string());
            if url.contains("rpc-0") {
                Arc::new(refusing(url)) as Arc<dyn LedgerRpc>
            } else {
                Arc::new(healthy(url))
            }
        });

        let resolver = EndpointResolver::new(urls(3), Duration::from_millis(200), Arc::new(connector));
        let client = resolver.resolve().await.unwrap();

        assert_eq!(client.endpoint(), "https://rpc-1.example");
        assert_eq!(*calls.lock(), vec!["https://rpc-0.example", "https://rpc-1.example"]);
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_reports_each() {
        let mut connector = MockRpcConnector::new();
        connector.expect_connect().times(3).returning(|url| Arc::new(refusing(url)));

        let resolver = EndpointResolver::new(urls(3), Duration::from_millis(200), Arc::new(connector));
        let err = resolver.resolve().await.unwrap_err();

        assert_matches!(err, ResolveError::NoEndpointAvailable { ref failures } if failures.len() == 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_endpoint_times_out_and_is_skipped() {
        let mut connector = MockRpcConnector::new();
        connector.expect_connect().returning(|url| {
            if url.contains("rpc-0") {
                Arc::new(Stalled(url.to_string())) as Arc<dyn LedgerRpc>
            } else {
                Arc::new(healthy(url))
            }
        });

        let resolver = EndpointResolver::new(urls(2), Duration::from_secs(3), Arc::new(connector));
        let mut cursor = ResolutionCursor::new();
        let client = resolver.resolve_next(&mut cursor).await.unwrap();

        assert_eq!(client.endpoint(), "https://rpc-1.example");
        assert_matches!(cursor.failures()[0].error, Some(RpcError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cursor_never_revisits_candidates() {
        let mut connector = MockRpcConnector::new();
        connector.expect_connect().times(2).returning(|url| Arc::new(healthy(url)));

        let resolver = EndpointResolver::new(urls(2), Duration::from_millis(200), Arc::new(connector));
        let mut cursor = ResolutionCursor::new();

        let first = resolver.resolve_next(&mut cursor).await.unwrap();
        assert_eq!(first.endpoint(), "https://rpc-0.example");

        let second = resolver.resolve_next(&mut cursor).await.unwrap();
        assert_eq!(second.endpoint(), "https://rpc-1.example");

        assert!(resolver.resolve_next(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let connector = MockRpcConnector::new();
        let resolver = EndpointResolver::new(vec![], Duration::from_millis(200), Arc::new(connector));

        assert_matches!(
            resolver.resolve().await,
            Err(ResolveError::NoEndpointAvailable { ref failures }) if failures.is_empty()
        );
    }

    #[tokio::test]
    async fn test_probe_all_reports_every_candidate() {
        let mut connector = MockRpcConnector::new();
        connector.expect_connect().returning(|url| {
            if url.contains("rpc-1") {
                Arc::new(refusing(url)) as Arc<dyn LedgerRpc>
            } else {
                Arc::new(healthy(url))
            }
        });

        let resolver = EndpointResolver::new(urls(3), Duration::from_millis(200), Arc::new(connector));
        let reports = resolver.probe_all().await;

        assert_eq!(reports.len(), 3);
        assert_eq!(
            reports.iter().map(ProbeReport::is_healthy).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }
}
