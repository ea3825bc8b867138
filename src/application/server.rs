//! Purchase recorder HTTP server
//!
//! Accepts `POST /api/process-payment` from the checkout and answers with a
//! receipt after a processing delay. With `verify_transactions` enabled a
//! record is accepted only for a catalogue plan whose price was transferred
//! from the claimed wallet to the treasury in a confirmed transaction.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::{abbreviate, sol_to_lamports, Plan};
use crate::services::recorder::{ErrorBody, PurchaseReceipt, PurchaseRecord};
use crate::services::solana::{Confirmation, EndpointResolver};
use crate::utils::validation;
use super::health::{HealthService, HealthStatus};

pub const PROCESS_PAYMENT_PATH: &str = "/api/process-payment";
pub const HEALTH_PATH: &str = "/health";

const PROCESSING_FAILED: &str = "Payment processing failed";
const VERIFICATION_FAILED: &str = "Transaction could not be verified";

/// Shared handler state
#[derive(Debug, Clone)]
pub struct ServerState {
    resolver: Arc<EndpointResolver>,
    health: HealthService,
    processing_delay: Duration,
    verify_transactions: bool,
    treasury: Pubkey,
    plans: Arc<Vec<Plan>>,
}

impl ServerState {
    pub fn new(config: &AppConfig, resolver: Arc<EndpointResolver>) -> AppResult<Self> {
        let treasury = validation::validate_solana_address(&config.payment.treasury_address)
            .map_err(|e| AppError::config(format!("Invalid treasury address: {}", e)))?;

        Ok(Self {
            health: HealthService::new(resolver.clone()),
            resolver,
            processing_delay: config.server.processing_delay(),
            verify_transactions: config.server.verify_transactions,
            treasury,
            plans: Arc::new(config.payment.plans.clone()),
        })
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(PROCESS_PAYMENT_PATH, post(process_payment))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody { error: message.to_string() })).into_response()
}

#[instrument(skip_all)]
async fn process_payment(
    State(state): State<ServerState>,
    body: Result<Json<PurchaseRecord>, JsonRejection>,
) -> Response {
    let record = match body {
        Ok(Json(record)) => record,
        Err(rejection) => {
            error!("❌ Payment processing error: {}", rejection.body_text());
            metrics::counter!("checkout_recorder_requests_total", "outcome" => "malformed").increment(1);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, PROCESSING_FAILED);
        }
    };

    info!(
        hours = record.hours,
        sol = %record.sol,
        wallet = %abbreviate(&record.wallet_address),
        tx = %abbreviate(&record.transaction_hash),
        "💳 Processing payment"
    );

    if state.verify_transactions {
        if let Err(reason) = verify(&state, &record).await {
            warn!("❌ Rejecting {}: {}", abbreviate(&record.transaction_hash), reason);
            metrics::counter!("checkout_recorder_requests_total", "outcome" => "unverified").increment(1);
            return failure(StatusCode::BAD_REQUEST, VERIFICATION_FAILED);
        }
    }

    tokio::time::sleep(state.processing_delay).await;

    let receipt = PurchaseReceipt {
        success: true,
        message: format!("Successfully purchased {} hours of trading time", record.hours),
        transaction_hash: record.transaction_hash,
        purchase_id: format!("purchase_{}", chrono::Utc::now().timestamp_millis()),
    };

    metrics::counter!("checkout_recorder_requests_total", "outcome" => "recorded").increment(1);
    info!("✅ Recorded {}", receipt.purchase_id);
    Json(receipt).into_response()
}

/// Require a confirmed transfer of a catalogue plan's price to the treasury
async fn verify(state: &ServerState, record: &PurchaseRecord) -> Result<(), String> {
    if !state.plans.iter().any(|p| p.hours == record.hours && p.price_sol == record.sol) {
        return Err(format!("no plan of {} hours for {} SOL", record.hours, record.sol));
    }

    let signature = Signature::from_str(&record.transaction_hash)
        .map_err(|e| format!("invalid signature: {}", e))?;
    let payer = Pubkey::from_str(&record.wallet_address)
        .map_err(|e| format!("invalid wallet address: {}", e))?;
    let lamports = sol_to_lamports(record.sol).map_err(|e| e.to_string())?;

    let rpc = state.resolver.resolve().await.map_err(|e| e.to_string())?;

    match rpc.confirm_transaction(&signature).await.map_err(|e| e.to_string())? {
        Confirmation::Confirmed => {}
        Confirmation::Pending => return Err("transaction is not confirmed".to_string()),
        Confirmation::Failed(reason) => return Err(format!("transaction failed: {}", reason)),
    }

    let landed = rpc.get_transaction(&signature).await.map_err(|e| e.to_string())?;
    if !landed.pays(&payer, &state.treasury, lamports) {
        return Err(format!(
            "no transfer of {} lamports from {} to the treasury",
            lamports,
            abbreviate(&record.wallet_address)
        ));
    }

    debug!("🔍 Verified {} lamports from {}", lamports, abbreviate(&record.wallet_address));
    Ok(())
}

async fn health(State(state): State<ServerState>) -> Response {
    let report = state.health.check().await;
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::solana::rpc::{MockLedgerRpc, MockRpcConnector};
    use crate::config::models::ServerConfig;
    use crate::core::domain::DEFAULT_TREASURY_ADDRESS;
    use crate::services::solana::{LandedTransaction, LedgerRpc, RpcError, Transfer};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use solana_sdk::hash::Hash;
    use tower::ServiceExt;

    const TX: &str = "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";
    const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
    const WEEKLY_LAMPORTS: u64 = 500_000_000;

    fn transfer(to: Pubkey, lamports: u64) -> LandedTransaction {
        LandedTransaction {
            transfers: vec![Transfer {
                from: Pubkey::from_str(WALLET).unwrap(),
                to,
                lamports,
            }],
            error: None,
        }
    }

    fn treasury() -> Pubkey {
        Pubkey::from_str(DEFAULT_TREASURY_ADDRESS).unwrap()
    }

    fn node_with(confirmation: Confirmation, landed: LandedTransaction) -> MockLedgerRpc {
        let mut rpc = MockLedgerRpc::new();
        rpc.expect_endpoint().returning(|| "https://rpc.example".to_string());
        rpc.expect_get_latest_blockhash().returning(|| Ok(Hash::new_unique()));
        rpc.expect_confirm_transaction().returning(move |_| Ok(confirmation.clone()));
        rpc.expect_get_transaction().returning(move |_| Ok(landed.clone()));
        rpc
    }

    fn node(confirmation: Confirmation) -> MockLedgerRpc {
        node_with(confirmation, transfer(treasury(), WEEKLY_LAMPORTS))
    }

    fn state_with(rpc: MockLedgerRpc, verify_transactions: bool) -> ServerState {
        let rpc: Arc<MockLedgerRpc> = Arc::new(rpc);
        let mut connector = MockRpcConnector::new();
        connector.expect_connect().returning(move |_| rpc.clone() as Arc<dyn LedgerRpc>);

        let resolver = Arc::new(EndpointResolver::new(
            vec!["https://rpc.example".to_string()],
            Duration::from_secs(1),
            Arc::new(connector),
        ));

        let mut config = AppConfig::default();
        config.server = ServerConfig {
            processing_delay_ms: 0,
            verify_transactions,
            ..ServerConfig::default()
        };
        ServerState::new(&config, resolver).unwrap()
    }

    fn state(verify_transactions: bool) -> ServerState {
        state_with(node(Confirmation::Confirmed), verify_transactions)
    }

    fn post_json(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(PROCESS_PAYMENT_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn send(state: ServerState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn record(transaction_hash: &str) -> String {
        record_for(168, 0.5, transaction_hash)
    }

    fn record_for(hours: u32, sol: f64, transaction_hash: &str) -> String {
        json!({
            "hours": hours,
            "sol": sol,
            "walletAddress": WALLET,
            "transactionHash": transaction_hash
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_records_purchase() {
        let (status, body) = send(state(false), post_json(record("abc123"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Successfully purchased 168 hours of trading time"));
        assert_eq!(body["transactionHash"], json!("abc123"));

        let purchase_id = body["purchaseId"].as_str().unwrap();
        let millis = purchase_id.strip_prefix("purchase_").unwrap();
        assert!(millis.parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_malformed_body_is_server_error() {
        let (status, body) = send(state(false), post_json("{not json")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Payment processing failed" }));
    }

    #[tokio::test]
    async fn test_missing_fields_are_server_error() {
        let (status, body) = send(state(false), post_json(r#"{"hours": 24}"#)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("Payment processing failed"));
    }

    #[tokio::test]
    async fn test_verification_accepts_confirmed_transaction() {
        let (status, body) = send(state(true), post_json(record(TX))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transactionHash"], json!(TX));
    }

    #[tokio::test]
    async fn test_verification_rejects_bad_signature() {
        let (status, body) = send(state(true), post_json(record("abc123"))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Transaction could not be verified"));
    }

    #[tokio::test]
    async fn test_verification_rejects_failed_transaction() {
        let state = state_with(node(Confirmation::Failed("InsufficientFundsForRent".into())), true);
        let (status, _) = send(state, post_json(record(TX))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let state = state_with(node(Confirmation::Pending), true);
        let (status, _) = send(state, post_json(record(TX))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verification_rejects_transfer_to_other_account() {
        let state = state_with(
            node_with(Confirmation::Confirmed, transfer(Pubkey::new_unique(), WEEKLY_LAMPORTS)),
            true,
        );
        let (status, body) = send(state, post_json(record(TX))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("Transaction could not be verified"));
    }

    #[tokio::test]
    async fn test_verification_rejects_wrong_amount() {
        let state = state_with(node_with(Confirmation::Confirmed, transfer(treasury(), 1)), true);
        let (status, _) = send(state, post_json(record(TX))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verification_rejects_price_outside_catalogue() {
        // The transfer matches the claimed amount, but no plan sells 168 h for 0.001 SOL
        let state = state_with(node_with(Confirmation::Confirmed, transfer(treasury(), 1_000_000)), true);
        let (status, _) = send(state, post_json(record_for(168, 0.001, TX))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verification_rejects_transaction_with_execution_error() {
        let landed = LandedTransaction {
            error: Some("InstructionError(0, Custom(1))".into()),
            ..transfer(treasury(), WEEKLY_LAMPORTS)
        };
        let state = state_with(node_with(Confirmation::Confirmed, landed), true);
        let (status, _) = send(state, post_json(record(TX))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_state_rejects_bad_treasury() {
        let mut config = AppConfig::default();
        config.payment.treasury_address = "not-an-address".to_string();
        let resolver = Arc::new(EndpointResolver::from_config(&config.solana));

        assert!(matches!(ServerState::new(&config, resolver), Err(AppError::Config { .. })));
    }

    #[tokio::test]
    async fn test_health_reports_endpoints() {
        let request = Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap();
        let (status, body) = send(state(false), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["components"][0]["name"], json!("https://rpc.example"));
    }

    #[tokio::test]
    async fn test_health_unavailable_when_no_endpoint_answers() {
        let mut rpc = MockLedgerRpc::new();
        rpc.expect_endpoint().returning(|| "https://rpc.example".to_string());
        rpc.expect_get_latest_blockhash()
            .returning(|| Err(RpcError::Timeout { endpoint: "https://rpc.example".into() }));

        let request = Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap();
        let (status, body) = send(state_with(rpc, false), request).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], json!("unhealthy"));
    }
}
