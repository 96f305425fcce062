//! Payment Status Checker.
//!
//! Re-derives a payment's status, amount and parent order from the
//! gateway instead of trusting what the browser reported, then applies
//! the acceptance policy.

use crate::config::{GatewayConfig, PaymentPolicy};
use crate::entities::payments::{UnknownPaymentStatus, VerifiedPayment};
use crate::entities::PaymentStatus;
use crate::error::PaymentError;
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use bookpay_sdk::objects::{GatewayErrorBody, GatewayPaymentEntity, OrderPaymentsCollection};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection failure or timeout.
    #[error("gateway request failed: {0}")]
    Network(String),

    /// Unexpected HTTP status from the gateway.
    #[error("gateway returned HTTP {0}")]
    Gateway(u16),

    #[error("payment not found")]
    NotFound,

    /// Response body could not be understood.
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Gateway(status) => *status >= 500 || *status == 429,
            GatewayError::NotFound | GatewayError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

impl From<UnknownPaymentStatus> for GatewayError {
    fn from(e: UnknownPaymentStatus) -> Self {
        GatewayError::Decode(e.to_string())
    }
}

/// Read access to the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_payment(&self, payment_id: &str) -> Result<VerifiedPayment, GatewayError>;

    /// All payment attempts made against a gateway order, oldest first.
    async fn fetch_order_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<VerifiedPayment>, GatewayError>;
}

/// Razorpay REST API client.
pub struct RazorpayGateway {
    http_client: reqwest::Client,
    config: GatewayConfig,
}

impl RazorpayGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.as_str().trim_end_matches('/'),
            path
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self
            .http_client
            .get(self.endpoint(path))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            // Unknown ids come back as 400 with a BAD_REQUEST_ERROR body.
            let bytes = response.bytes().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_slice::<GatewayErrorBody>(&bytes)
                && body.error.description.contains("does not exist")
            {
                return Err(GatewayError::NotFound);
            }
        }
        Err(GatewayError::Gateway(status.as_u16()))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn fetch_payment(&self, payment_id: &str) -> Result<VerifiedPayment, GatewayError> {
        let path = format!("payments/{}", urlencoding::encode(payment_id));
        let entity: GatewayPaymentEntity = self.get_json(&path).await?;
        debug!(payment_id, status = %entity.status, "Fetched payment from gateway");
        Ok(VerifiedPayment::try_from(entity)?)
    }

    async fn fetch_order_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<VerifiedPayment>, GatewayError> {
        let path = format!("orders/{}/payments", urlencoding::encode(gateway_order_id));
        let collection: OrderPaymentsCollection = self.get_json(&path).await?;
        collection
            .items
            .into_iter()
            .map(|entity| VerifiedPayment::try_from(entity).map_err(GatewayError::from))
            .collect()
    }
}

/// Whether the policy counts this status as paid.
pub fn is_accepted(policy: &PaymentPolicy, status: PaymentStatus) -> bool {
    match status {
        PaymentStatus::Captured => true,
        PaymentStatus::Authorized => policy.accept_authorized,
        _ => false,
    }
}

/// Apply the acceptance policy to a payment fetched from the gateway.
///
/// Status is checked first, so an uncaptured payment is reported as such
/// even if its amount is also wrong. Minor units are only comparable in the
/// same currency, so currency is checked before amount.
pub fn check_payment(
    policy: &PaymentPolicy,
    payment: &VerifiedPayment,
    expected_minor: i64,
    expected_currency: &str,
    expected_order_id: Option<&str>,
) -> Result<(), PaymentError> {
    if !is_accepted(policy, payment.status) {
        return Err(match payment.status {
            PaymentStatus::Authorized | PaymentStatus::Created => PaymentError::PaymentPending,
            status => PaymentError::PaymentNotSuccessful { status },
        });
    }
    if let Some(expected) = expected_order_id
        && payment.gateway_order_id.as_deref() != Some(expected)
    {
        return Err(PaymentError::OrderMismatch);
    }
    if !payment.currency.eq_ignore_ascii_case(expected_currency) {
        return Err(PaymentError::CurrencyMismatch {
            expected: expected_currency.to_string(),
            actual: payment.currency.clone(),
        });
    }
    if payment.amount_minor_units != expected_minor {
        return Err(PaymentError::AmountMismatch {
            expected: expected_minor,
            actual: payment.amount_minor_units,
        });
    }
    Ok(())
}

fn map_lookup_error(e: GatewayError) -> PaymentError {
    match e {
        GatewayError::NotFound => PaymentError::PaymentNotFound,
        GatewayError::Decode(message) => PaymentError::GatewayFailure(message),
        e @ GatewayError::Gateway(_) if !e.is_retryable() => PaymentError::GatewayFailure(e.to_string()),
        _ => PaymentError::GatewayUnreachable,
    }
}

/// Fetch a payment, retrying network failures, 5xx and 429.
pub async fn lookup_payment(
    gateway: &dyn PaymentGateway,
    retry: &RetryPolicy,
    payment_id: &str,
) -> Result<VerifiedPayment, PaymentError> {
    retry
        .run(
            move |_| gateway.fetch_payment(payment_id),
            GatewayError::is_retryable,
        )
        .await
        .map_err(|e| {
            warn!(payment_id, error = %e, "Gateway lookup failed");
            map_lookup_error(e)
        })
}

/// Fetch the payment attempts of a gateway order with the same retry rules.
pub async fn lookup_order_payments(
    gateway: &dyn PaymentGateway,
    retry: &RetryPolicy,
    gateway_order_id: &str,
) -> Result<Vec<VerifiedPayment>, PaymentError> {
    retry
        .run(
            move |_| gateway.fetch_order_payments(gateway_order_id),
            GatewayError::is_retryable,
        )
        .await
        .map_err(|e| {
            warn!(gateway_order_id, error = %e, "Gateway order lookup failed");
            map_lookup_error(e)
        })
}
