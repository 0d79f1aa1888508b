//! HTTP client for the accrual system.
//!
//! `GET {base}/api/orders/{number}`:
//! - `200` with `{order, status, accrual?}`
//! - `204` when the order is unknown upstream
//! - `429` with an optional `Retry-After` (seconds)
//!
//! No retries happen here. The reconciliation driver revisits the order on
//! its next cycle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::{AccrualOraclePort, OracleError};
use crate::domain::order_lifecycle::AccrualVerdict;
use crate::domain::shared::{OrderNumber, Points};

/// Status strings reported by the accrual system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum RemoteStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

#[derive(Debug, Deserialize)]
struct AccrualResponse {
    order: String,
    status: RemoteStatus,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    accrual: Option<Decimal>,
}

impl AccrualResponse {
    fn into_verdict(self) -> AccrualVerdict {
        match self.status {
            RemoteStatus::Registered => AccrualVerdict::Registered,
            RemoteStatus::Processing => AccrualVerdict::Processing,
            RemoteStatus::Invalid => AccrualVerdict::Invalid,
            RemoteStatus::Processed => {
                AccrualVerdict::Processed(self.accrual.map_or(Points::ZERO, Points::new))
            }
        }
    }
}

/// How a non-success status should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorCategory {
    RateLimited,
    Unavailable,
}

const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        _ => ErrorCategory::Unavailable,
    }
}

/// Accrual oracle speaking the accrual system's HTTP protocol.
#[derive(Debug, Clone)]
pub struct HttpAccrualOracle {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpAccrualOracle {
    /// Build a client for `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

#[async_trait]
impl AccrualOraclePort for HttpAccrualOracle {
    async fn fetch_verdict(&self, number: &OrderNumber) -> Result<AccrualVerdict, OracleError> {
        let response = self
            .client
            .get(self.order_url(number))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        after: self.timeout,
                    }
                } else {
                    OracleError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(AccrualVerdict::Unknown);
        }

        if status == StatusCode::OK {
            let body: AccrualResponse =
                response
                    .json()
                    .await
                    .map_err(|e| OracleError::InvalidResponse {
                        message: e.to_string(),
                    })?;
            if body.order != number.as_str() {
                return Err(OracleError::InvalidResponse {
                    message: format!("asked for {number}, got {}", body.order),
                });
            }
            return Ok(body.into_verdict());
        }

        match categorize_status(status) {
            ErrorCategory::RateLimited => {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                tracing::warn!(
                    order_number = %number,
                    retry_after_secs = retry_after.map(|d| d.as_secs()),
                    "Accrual system rate limited"
                );
                Err(OracleError::RateLimited { retry_after })
            }
            ErrorCategory::Unavailable => {
                tracing::warn!(
                    order_number = %number,
                    status = status.as_u16(),
                    "Accrual system returned unexpected status"
                );
                Err(OracleError::Unavailable {
                    status: status.as_u16(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn number(n: &str) -> OrderNumber {
        OrderNumber::parse(n).unwrap()
    }

    async fn oracle_for(server: &MockServer) -> HttpAccrualOracle {
        HttpAccrualOracle::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn processed_with_accrual() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/12345678903"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "12345678903",
                "status": "PROCESSED",
                "accrual": 729.98
            })))
            .mount(&server)
            .await;

        let verdict = oracle_for(&server)
            .await
            .fetch_verdict(&number("12345678903"))
            .await
            .unwrap();
        assert_eq!(verdict, AccrualVerdict::Processed(Points::new(dec!(729.98))));
    }

    #[tokio::test]
    async fn non_final_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders/18"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "18",
                "status": "REGISTERED"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/orders/26"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "26",
                "status": "PROCESSING"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/orders/34"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "34",
                "status": "INVALID"
            })))
            .mount(&server)
            .await;

        let oracle = oracle_for(&server).await;
        assert_eq!(
            oracle.fetch_verdict(&number("18")).await.unwrap(),
            AccrualVerdict::Registered
        );
        assert_eq!(
            oracle.fetch_verdict(&number("26")).await.unwrap(),
            AccrualVerdict::Processing
        );
        assert_eq!(
            oracle.fetch_verdict(&number("34")).await.unwrap(),
            AccrualVerdict::Invalid
        );
    }

    #[tokio::test]
    async fn no_content_means_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let verdict = oracle_for(&server)
            .await
            .fetch_verdict(&number("18"))
            .await
            .unwrap();
        assert_eq!(verdict, AccrualVerdict::Unknown);
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
            .mount(&server)
            .await;

        let err = oracle_for(&server)
            .await
            .fetch_verdict(&number("18"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OracleError::RateLimited {
                retry_after: Some(Duration::from_secs(60))
            }
        );
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = oracle_for(&server)
            .await
            .fetch_verdict(&number("18"))
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::Unavailable { status: 500 });
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = oracle_for(&server)
            .await
            .fetch_verdict(&number("18"))
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn mismatched_order_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "order": "26",
                "status": "INVALID"
            })))
            .mount(&server)
            .await;

        let err = oracle_for(&server)
            .await
            .fetch_verdict(&number("18"))
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::InvalidResponse { .. }));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let oracle = HttpAccrualOracle::new("http://accrual:8081/", Duration::from_secs(1)).unwrap();
        assert_eq!(oracle.base_url(), "http://accrual:8081");
        assert_eq!(
            oracle.order_url(&number("18")),
            "http://accrual:8081/api/orders/18"
        );
    }

    #[test]
    fn status_categories() {
        assert_eq!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        );
        assert_eq!(
            categorize_status(StatusCode::BAD_GATEWAY),
            ErrorCategory::Unavailable
        );
    }
}
