//! HTTP client for the purchase recording endpoint

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::models::RecorderConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::abbreviate;
use super::{ErrorBody, PurchaseReceipt, PurchaseRecord, PurchaseRecorder, RecorderError};

/// Posts purchase records as JSON
#[derive(Debug, Clone)]
pub struct HttpPurchaseRecorder {
    http_client: Client,
    endpoint: Url,
}

impl HttpPurchaseRecorder {
    pub fn new(endpoint: &str, timeout: Duration) -> AppResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AppError::config(format!("Invalid recorder URL '{}': {}", endpoint, e)))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, endpoint })
    }

    pub fn from_config(config: &RecorderConfig) -> AppResult<Self> {
        Self::new(&config.endpoint_url, config.request_timeout())
    }

    fn map_transport(err: reqwest::Error) -> RecorderError {
        if err.is_timeout() {
            RecorderError::Timeout
        } else {
            RecorderError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl PurchaseRecorder for HttpPurchaseRecorder {
    #[instrument(skip(self, record), fields(hours = record.hours, tx = %abbreviate(&record.transaction_hash)))]
    async fn record(&self, record: &PurchaseRecord) -> Result<PurchaseReceipt, RecorderError> {
        debug!("📨 Recording purchase at {}", self.endpoint);

        let response = self.http_client
            .post(self.endpoint.clone())
            .json(record)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!("❌ Recorder rejected purchase: {} {}", status, message);
            return Err(RecorderError::Rejected { status: status.as_u16(), message });
        }

        let receipt: PurchaseReceipt = serde_json::from_str(&body)
            .map_err(|e| RecorderError::InvalidResponse(e.to_string()))?;

        if !receipt.success {
            return Err(RecorderError::InvalidResponse(format!(
                "success=false: {}",
                receipt.message
            )));
        }

        info!("✅ Purchase recorded: {}", receipt.purchase_id);
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> PurchaseRecord {
        PurchaseRecord {
            hours: 168,
            sol: dec!(0.5),
            wallet_address: "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin".to_string(),
            transaction_hash: "abc123".to_string(),
        }
    }

    fn recorder(server: &MockServer) -> HttpPurchaseRecorder {
        HttpPurchaseRecorder::new(
            &format!("{}/api/process-payment", server.uri()),
            Duration::from_secs(2),
        ).unwrap()
    }

    #[tokio::test]
    async fn test_successful_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/process-payment"))
            .and(body_json(json!({
                "hours": 168,
                "sol": 0.5,
                "walletAddress": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
                "transactionHash": "abc123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Successfully purchased 168 hours of trading time",
                "transactionHash": "abc123",
                "purchaseId": "purchase_1700000000000"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = recorder(&server).record(&record()).await.unwrap();
        assert_eq!(receipt.transaction_hash, "abc123");
        assert_eq!(receipt.purchase_id, "purchase_1700000000000");
    }

    #[tokio::test]
    async fn test_server_error_is_rejected_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Payment processing failed"
            })))
            .mount(&server)
            .await;

        let err = recorder(&server).record(&record()).await.unwrap_err();
        assert_eq!(
            err,
            RecorderError::Rejected { status: 500, message: "Payment processing failed".to_string() }
        );
    }

    #[tokio::test]
    async fn test_success_false_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "duplicate",
                "transactionHash": "abc123",
                "purchaseId": ""
            })))
            .mount(&server)
            .await;

        assert_matches!(
            recorder(&server).record(&record()).await,
            Err(RecorderError::InvalidResponse(_))
        );
    }

    #[tokio::test]
    async fn test_slow_recorder_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = HttpPurchaseRecorder::new(
            &format!("{}/api/process-payment", server.uri()),
            Duration::from_millis(100),
        ).unwrap();

        assert_eq!(client.record(&record()).await.unwrap_err(), RecorderError::Timeout);
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let err = HttpPurchaseRecorder::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }
}
