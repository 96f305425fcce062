//! Endpoint request and response bodies.
//!
//! # Endpoints
//!
//! - `POST /verify-payment`       – client callback after checkout
//! - `POST /check-payment-status` – recovery after an interrupted checkout
//! - `POST /payment-webhook`      – gateway-initiated event

use serde::{Deserialize, Serialize};

use super::order::OrderDetails;

/// Identifiers and signature returned by the gateway's checkout widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAssertion {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

/// Body of `POST /verify-payment`.
///
/// Missing identifiers deserialize as empty strings so that they fail
/// signature verification instead of producing a framework error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub razorpay_payment_id: String,
    #[serde(default)]
    pub razorpay_order_id: String,
    #[serde(default)]
    pub razorpay_signature: String,
    /// The untrusted order draft. Validated server side.
    #[serde(default, rename = "orderData", alias = "order_data")]
    pub order_data: Option<serde_json::Value>,
}

impl VerifyPaymentRequest {
    pub fn assertion(&self) -> PaymentAssertion {
        PaymentAssertion {
            payment_id: self.razorpay_payment_id.clone(),
            order_id: self.razorpay_order_id.clone(),
            signature: self.razorpay_signature.clone(),
        }
    }
}

/// Body of `POST /check-payment-status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckPaymentStatusRequest {
    #[serde(default)]
    pub razorpay_payment_id: Option<String>,
    #[serde(default)]
    pub razorpay_order_id: Option<String>,
    #[serde(default, rename = "orderData", alias = "order_data")]
    pub order_data: Option<serde_json::Value>,
}

/// Outcome of a recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    OrderExists,
    OrderCreated,
    PaymentFailed,
    PaymentPending,
    RecoveryFailed,
    NoData,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStatus::OrderExists => "order_exists",
            RecoveryStatus::OrderCreated => "order_created",
            RecoveryStatus::PaymentFailed => "payment_failed",
            RecoveryStatus::PaymentPending => "payment_pending",
            RecoveryStatus::RecoveryFailed => "recovery_failed",
            RecoveryStatus::NoData => "no_data",
        }
    }

    /// Inverse of [`RecoveryStatus::as_str`].
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "order_exists" => Some(RecoveryStatus::OrderExists),
            "order_created" => Some(RecoveryStatus::OrderCreated),
            "payment_failed" => Some(RecoveryStatus::PaymentFailed),
            "payment_pending" => Some(RecoveryStatus::PaymentPending),
            "recovery_failed" => Some(RecoveryStatus::RecoveryFailed),
            "no_data" => Some(RecoveryStatus::NoData),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response envelope shared by the verify and recovery endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecoveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_data: Option<OrderDetails>,
    pub message: String,
    /// Machine-readable failure reason, e.g. `amount_mismatch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub already_processed: bool,
}

impl PaymentResponse {
    pub fn confirmed(order: OrderDetails, already_processed: bool) -> Self {
        let message = if already_processed {
            "Order already processed"
        } else {
            "Payment verified and order created"
        };
        Self {
            success: true,
            status: None,
            order_id: Some(order.order_id.clone()),
            order_data: Some(order),
            message: message.to_string(),
            reason: None,
            already_processed,
        }
    }

    /// Acknowledge an existing order by id only.
    ///
    /// Used where the caller has not proven ownership of the payment, so no
    /// customer details are echoed back.
    pub fn already_processed(order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            status: None,
            order_id: Some(order_id.into()),
            order_data: None,
            message: "Order already processed".to_string(),
            reason: None,
            already_processed: true,
        }
    }

    pub fn failed(reason: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            order_id: None,
            order_data: None,
            message: message.into(),
            reason: Some(reason.to_string()),
            already_processed: false,
        }
    }

    pub fn with_status(mut self, status: RecoveryStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Acknowledgement returned to the gateway for a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub received: bool,
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecoveryStatus>,
    #[serde(default)]
    pub duplicate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tolerates_missing_fields() {
        let req: VerifyPaymentRequest = serde_json::from_str(r#"{"razorpay_order_id": "order_1"}"#).unwrap();
        assert_eq!(req.razorpay_payment_id, "");
        assert_eq!(req.assertion().order_id, "order_1");
        assert!(req.order_data.is_none());
    }

    #[test]
    fn test_failure_envelope_shape() {
        let resp = PaymentResponse::failed("amount_mismatch", "amount mismatch")
            .with_status(RecoveryStatus::RecoveryFailed);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "amount_mismatch");
        assert_eq!(json["status"], "recovery_failed");
        assert!(json.get("order_id").is_none());
    }

    #[test]
    fn test_already_processed_carries_id_only() {
        let json = serde_json::to_value(PaymentResponse::already_processed("BK-1001")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["order_id"], "BK-1001");
        assert_eq!(json["already_processed"], true);
        assert!(json.get("order_data").is_none());
    }
}
