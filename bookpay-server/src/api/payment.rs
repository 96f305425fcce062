use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use bookpay_core::processors::RecoveryOutcome;
use bookpay_sdk::objects::{
    CheckPaymentStatusRequest, PaymentResponse, RecoveryStatus, VerifyPaymentRequest,
};

use super::ApiError;
use crate::state::AppState;

/// `POST /verify-payment`: checkout callback.
///
/// A replayed callback for a payment that already has an order answers
/// 200 with `already_processed: true`.
pub(super) async fn verify_payment(
    state: State<AppState>,
    body: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let outcome = state
        .pipeline
        .verify_payment(&request.assertion(), request.order_data)
        .await?;

    let replayed = !outcome.is_created();
    let details = outcome.into_order().to_details();
    Ok(Json(PaymentResponse::confirmed(details, replayed)))
}

/// `POST /check-payment-status`: recover an interrupted checkout.
///
/// The request is unsigned, so an order that already exists is reported by
/// id only.
pub(super) async fn check_payment_status(
    state: State<AppState>,
    body: Result<Json<CheckPaymentStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body?;
    let outcome = state
        .recovery
        .reconcile(
            request.razorpay_payment_id.as_deref(),
            request.razorpay_order_id.as_deref(),
            request.order_data,
        )
        .await;

    let status = outcome.status();
    let response = match outcome {
        RecoveryOutcome::OrderExists(order) => PaymentResponse::already_processed(order.order_id),
        RecoveryOutcome::OrderCreated(order) => {
            PaymentResponse::confirmed(order.to_details(), false)
        }
        RecoveryOutcome::PaymentFailed(e) => PaymentResponse::failed(e.reason(), e.to_string()),
        RecoveryOutcome::PaymentPending => PaymentResponse::failed(
            status.as_str(),
            "Payment is not complete yet, check again shortly",
        ),
        RecoveryOutcome::NoData(message) => {
            return Err(ApiError::invalid_request(message)
                .with_reason(status.as_str())
                .with_recovery_status(status));
        }
        RecoveryOutcome::RecoveryFailed(e) => {
            return Err(ApiError::from(e).with_recovery_status(RecoveryStatus::RecoveryFailed));
        }
    };

    Ok((StatusCode::OK, Json(response.with_status(status))))
}
