//! HTTP API of the payment service.
//!
//! # Endpoints
//!
//! - `POST /verify-payment`       – checkout callback from the storefront
//! - `POST /check-payment-status` – recovery after an interrupted checkout
//! - `POST /payment-webhook`      – gateway-initiated events

mod payment;
mod webhook;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use bookpay_core::error::PaymentError;
use bookpay_sdk::objects::{PaymentResponse, RecoveryStatus};

use crate::state::AppState;

/// Build the payment API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify-payment", post(payment::verify_payment))
        .route("/check-payment-status", post(payment::check_payment_status))
        .route("/payment-webhook", post(webhook::payment_webhook))
}

/// HTTP status for a failed payment operation.
fn status_for(error: &PaymentError) -> StatusCode {
    match error {
        PaymentError::InvalidSignature
        | PaymentError::AmountMismatch { .. }
        | PaymentError::CurrencyMismatch { .. }
        | PaymentError::OrderMismatch
        | PaymentError::MalformedWebhook => StatusCode::BAD_REQUEST,
        PaymentError::InvalidDraft(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PaymentError::PaymentNotFound => StatusCode::NOT_FOUND,
        PaymentError::PaymentNotSuccessful { .. } => StatusCode::PAYMENT_REQUIRED,
        PaymentError::PaymentPending => StatusCode::CONFLICT,
        PaymentError::GatewayFailure(_) => StatusCode::BAD_GATEWAY,
        PaymentError::GatewayUnreachable | PaymentError::StorageUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PaymentError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error returned by the payment handlers.
///
/// Always rendered as a [`PaymentResponse`] failure envelope.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    response: PaymentResponse,
}

impl ApiError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: PaymentResponse::failed("invalid_request", message),
        }
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    fn with_reason(mut self, reason: &str) -> Self {
        self.response.reason = Some(reason.to_string());
        self
    }

    fn with_recovery_status(mut self, status: RecoveryStatus) -> Self {
        self.response = self.response.with_status(status);
        self
    }
}

impl From<PaymentError> for ApiError {
    fn from(error: PaymentError) -> Self {
        let message = match &error {
            PaymentError::Storage(cause) => {
                tracing::error!(error = %cause, "Order storage failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            status: status_for(&error),
            response: PaymentResponse::failed(error.reason(), message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::invalid_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use bookpay_core::testing::{
        TestHarness, WEBHOOK_SECRET, captured_payment, sample_draft_json, signed_assertion,
        test_secrets,
    };
    use bookpay_sdk::signature::{WEBHOOK_EVENT_ID_HEADER, WEBHOOK_SIGNATURE_HEADER, sign_webhook};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(harness: &TestHarness) -> Router {
        build_router(AppState::new(
            harness.services.clone(),
            test_secrets(),
            None,
        ))
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn verify_body(gateway_order_id: &str, payment_id: &str) -> Value {
        let assertion = signed_assertion(gateway_order_id, payment_id);
        json!({
            "razorpay_payment_id": assertion.payment_id,
            "razorpay_order_id": assertion.order_id,
            "razorpay_signature": assertion.signature,
            "orderData": sample_draft_json(),
        })
    }

    #[tokio::test]
    async fn test_verify_payment_then_replay() {
        let mut harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));

        let (status, body) = post_json(
            app(&harness),
            "/verify-payment",
            verify_body("order_abc", "pay_123"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["already_processed"], false);
        assert_eq!(body["order_id"], "BK-1001");
        assert_eq!(body["order_data"]["payment"]["status"], "Paid");

        let (status, body) = post_json(
            app(&harness),
            "/verify-payment",
            verify_body("order_abc", "pay_123"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["already_processed"], true);
        assert_eq!(harness.store.order_count(), 1);
        assert_eq!(harness.drain_notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_verify_payment_rejects_bad_signature() {
        let harness = TestHarness::new();
        let mut body = verify_body("order_abc", "pay_123");
        body["razorpay_signature"] = json!("00".repeat(32));

        let (status, body) = post_json(app(&harness), "/verify-payment", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "invalid_signature");
        assert_eq!(harness.gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_payment_amount_mismatch() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49901));

        let (status, body) = post_json(
            app(&harness),
            "/verify-payment",
            verify_body("order_abc", "pay_123"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "amount_mismatch");
        assert_eq!(harness.store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_request() {
        let harness = TestHarness::new();
        let request = Request::post("/verify-payment")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app(&harness), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "invalid_request");
    }

    #[tokio::test]
    async fn test_check_payment_status_recovers_order() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));

        let (status, body) = post_json(
            app(&harness),
            "/check-payment-status",
            json!({
                "razorpay_payment_id": "pay_123",
                "razorpay_order_id": "order_abc",
                "orderData": sample_draft_json(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "order_created");
        assert_eq!(body["order_id"], "BK-1001");

        let (status, body) = post_json(
            app(&harness),
            "/check-payment-status",
            json!({ "razorpay_order_id": "order_abc" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "order_exists");
        assert_eq!(body["already_processed"], true);
        assert_eq!(body["order_id"], "BK-1001");
        assert!(body.get("order_data").is_none());
        assert!(!body.to_string().contains("asha@example.com"));
    }

    #[tokio::test]
    async fn test_check_payment_status_without_ids() {
        let harness = TestHarness::new();
        let (status, body) = post_json(app(&harness), "/check-payment-status", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn test_check_payment_status_reports_failed_payment() {
        let harness = TestHarness::new();
        let (status, body) = post_json(
            app(&harness),
            "/check-payment-status",
            json!({ "razorpay_payment_id": "pay_unknown" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "payment_failed");
        assert_eq!(body["reason"], "payment_not_found");
    }

    fn webhook_request(body: &Value, signature: &str, event_id: &str) -> Request<Body> {
        Request::post("/payment-webhook")
            .header("content-type", "application/json")
            .header(WEBHOOK_SIGNATURE_HEADER, signature)
            .header(WEBHOOK_EVENT_ID_HEADER, event_id)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_webhook_signature_and_duplicates() {
        let harness = TestHarness::new();
        let payload = json!({
            "event": "payment.failed",
            "payload": { "payment": { "entity": {
                "id": "pay_1", "order_id": "order_1", "amount": 100,
                "currency": "INR", "status": "failed"
            }}}
        });

        let (status, body) = send(
            app(&harness),
            webhook_request(&payload, "deadbeef", "evt_1"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["reason"], "invalid_signature");
        assert_eq!(harness.store.webhook_event_count(), 0);

        let signature = sign_webhook(payload.to_string().as_bytes(), WEBHOOK_SECRET.as_bytes());
        let (status, body) = send(
            app(&harness),
            webhook_request(&payload, &signature, "evt_1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
        assert_eq!(body["duplicate"], false);

        let (status, body) = send(
            app(&harness),
            webhook_request(&payload, &signature, "evt_1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duplicate"], true);
        assert_eq!(harness.store.webhook_event_count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let harness = TestHarness::new();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(&harness), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let request = Request::get("/ready").body(Body::empty()).unwrap();
        let (status, _) = send(app(&harness), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
