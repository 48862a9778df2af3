//! Accrual scoring service client
//!
//! `GET {base}/api/orders/{number}`
//!
//! | HTTP status | Meaning                                   |
//! |-------------|-------------------------------------------|
//! | 200         | JSON verdict `{order, status, accrual?}`   |
//! | 204         | order unknown to the scorer (yet)          |
//! | 429         | rate limited, `Retry-After` in seconds     |
//! | other       | error                                      |

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::error::AccrualError;
use crate::config::AccrualConfig;
use crate::models::{OrderStatus, Verdict};

/// Delay assumed when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Source of accrual verdicts
#[async_trait]
pub trait AccrualClient: Send + Sync {
    /// Fetch the current verdict for one order number
    async fn fetch_verdict(&self, number: &str) -> Result<Verdict, AccrualError>;
}

/// Statuses the scoring service can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl From<AccrualStatus> for OrderStatus {
    fn from(s: AccrualStatus) -> Self {
        match s {
            AccrualStatus::Registered => OrderStatus::Registered,
            AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Invalid => OrderStatus::Invalid,
            AccrualStatus::Processed => OrderStatus::Processed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccrualResponse {
    order: String,
    status: AccrualStatus,
    #[serde(default)]
    accrual: Option<Decimal>,
}

/// Decode a 200 response body into a verdict for `requested`.
///
/// A PROCESSED verdict without `accrual` counts as zero accrual; a negative
/// accrual or a verdict about a different order is malformed.
pub fn decode_verdict(requested: &str, body: &[u8]) -> Result<Verdict, AccrualError> {
    let response: AccrualResponse =
        serde_json::from_slice(body).map_err(|e| AccrualError::Malformed(e.to_string()))?;

    if response.order != requested {
        return Err(AccrualError::Malformed(format!(
            "verdict for order {} while requesting {}",
            response.order, requested
        )));
    }

    let status = OrderStatus::from(response.status);
    let accrual = match (status, response.accrual) {
        (OrderStatus::Processed, Some(a)) if a < Decimal::ZERO => {
            return Err(AccrualError::Malformed(format!("negative accrual {}", a)));
        }
        (OrderStatus::Processed, Some(a)) => a,
        _ => Decimal::ZERO,
    };

    Ok(Verdict::new(response.order, status, accrual))
}

/// Parse `Retry-After` given in whole seconds
fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// reqwest-backed client
pub struct HttpAccrualClient {
    client: reqwest::Client,
    base_address: String,
}

impl HttpAccrualClient {
    pub fn new(config: &AccrualConfig) -> Result<Self, AccrualError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| AccrualError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_address: config.base_address.trim_end_matches('/').to_string(),
        })
    }

    pub fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_address, number)
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn fetch_verdict(&self, number: &str) -> Result<Verdict, AccrualError> {
        let url = self.order_url(number);
        debug!(order = number, %url, "Requesting accrual verdict");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(AccrualError::from_request)?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(AccrualError::from_request)?;
                decode_verdict(number, &body)
            }
            StatusCode::NO_CONTENT => Err(AccrualError::NotRegistered(number.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(
                    response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok()),
                );
                Err(AccrualError::RateLimited { retry_after })
            }
            other => Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }
    }
}
