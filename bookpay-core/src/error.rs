use crate::entities::PaymentStatus;
use bookpay_sdk::objects::DraftError;

/// Every way the payment pipeline can refuse or fail a request.
///
/// A duplicate order is not an error; it surfaces as a replayed success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("payment signature is invalid")]
    InvalidSignature,
    #[error("order draft rejected: {0}")]
    InvalidDraft(#[from] DraftError),
    #[error("payment gateway is unreachable")]
    GatewayUnreachable,
    #[error("payment not found at the gateway")]
    PaymentNotFound,
    #[error("payment is {status}, not successful")]
    PaymentNotSuccessful { status: PaymentStatus },
    #[error("payment is authorized but not yet captured")]
    PaymentPending,
    #[error("paid amount {actual} does not match expected {expected}")]
    AmountMismatch { expected: i64, actual: i64 },
    #[error("paid currency {actual} does not match expected {expected}")]
    CurrencyMismatch { expected: String, actual: String },
    #[error("payment belongs to a different gateway order")]
    OrderMismatch,
    #[error("gateway returned an unusable response: {0}")]
    GatewayFailure(String),
    #[error("webhook payload is malformed")]
    MalformedWebhook,
    #[error("order storage is unavailable")]
    StorageUnavailable,
    #[error("order storage failed: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Stable machine-readable code returned to clients.
    pub fn reason(&self) -> &'static str {
        match self {
            PaymentError::InvalidSignature => "invalid_signature",
            PaymentError::InvalidDraft(_) => "invalid_order_data",
            PaymentError::GatewayUnreachable => "gateway_unreachable",
            PaymentError::PaymentNotFound => "payment_not_found",
            PaymentError::PaymentNotSuccessful { .. } => "payment_not_successful",
            PaymentError::PaymentPending => "payment_pending",
            PaymentError::AmountMismatch { .. } => "amount_mismatch",
            PaymentError::CurrencyMismatch { .. } => "currency_mismatch",
            PaymentError::OrderMismatch => "order_mismatch",
            PaymentError::GatewayFailure(_) => "gateway_error",
            PaymentError::MalformedWebhook => "malformed_webhook",
            PaymentError::StorageUnavailable => "storage_unavailable",
            PaymentError::Storage(_) => "storage_error",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            PaymentError::GatewayUnreachable
                | PaymentError::GatewayFailure(_)
                | PaymentError::StorageUnavailable
                | PaymentError::PaymentPending
        )
    }
}
