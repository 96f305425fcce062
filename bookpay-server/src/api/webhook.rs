use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bookpay_core::error::PaymentError;
use bookpay_sdk::objects::WebhookResponse;
use bookpay_sdk::signature::{WEBHOOK_EVENT_ID_HEADER, WEBHOOK_SIGNATURE_HEADER};

use super::ApiError;
use crate::state::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /payment-webhook`: gateway-initiated event.
///
/// The raw body is kept as bytes: the signature covers it exactly.
/// Answers 503 when processing failed temporarily so the gateway
/// redelivers.
pub(super) async fn payment_webhook(
    state: State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .webhook
        .handle(
            &body,
            header(&headers, WEBHOOK_SIGNATURE_HEADER),
            header(&headers, WEBHOOK_EVENT_ID_HEADER),
        )
        .await
        .map_err(|e| match e {
            PaymentError::InvalidSignature => {
                ApiError::from(e).with_status(StatusCode::UNAUTHORIZED)
            }
            other => ApiError::from(other),
        })?;

    let status = if outcome.retry_later {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(WebhookResponse {
            received: !outcome.retry_later,
            event_id: outcome.event_id,
            status: outcome.status,
            duplicate: outcome.duplicate,
        }),
    ))
}
