//! HTTP disbursement gateway client.

use super::{DisbursementError, DisbursementRail, DisbursementReceipt};
use crate::domain::{Money, PayoutMethod};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Disbursement rail backed by an HTTP payment gateway.
#[derive(Debug, Clone)]
pub struct HttpDisbursementGateway {
    client: Client,
    base_url: String,
}

impl HttpDisbursementGateway {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl DisbursementRail for HttpDisbursementGateway {
    async fn execute(
        &self,
        payout_id: &str,
        net_amount: Money,
        method: &PayoutMethod,
    ) -> Result<DisbursementReceipt, DisbursementError> {
        debug!(
            "Executing disbursement payout_id={}, net_amount={}, method={}",
            payout_id,
            net_amount,
            method.kind_str()
        );

        let url = format!("{}/v1/disbursements", self.base_url);
        let payload = serde_json::json!({
            "idempotencyKey": payout_id,
            "amount": net_amount.to_canonical_string(),
            "method": method,
        });

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let response = retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(DisbursementError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(DisbursementError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(DisbursementError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if status == 422 {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unprocessable".to_string());
                return Err(backoff::Error::permanent(DisbursementError::Rejected(
                    message,
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(DisbursementError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response.json::<serde_json::Value>().await.map_err(|e| {
                backoff::Error::permanent(DisbursementError::ParseError(e.to_string()))
            })
        })
        .await?;

        let external_ref = response
            .get("transactionRef")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DisbursementError::ParseError("missing transactionRef in response".to_string())
            })?
            .to_string();

        Ok(DisbursementReceipt { external_ref })
    }
}
