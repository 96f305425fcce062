//! WebhookProcessor.
//!
//! Authenticates gateway webhooks, records each event id once, and feeds
//! payment events into the [`RecoveryChecker`]. Redeliveries of an event
//! that already reached a final outcome are acknowledged without work.

use super::PaymentServices;
use super::recovery::RecoveryChecker;
use crate::config::SignatureSecrets;
use crate::entities::{WebhookEventRecord, WebhookRecordState};
use crate::error::PaymentError;
use crate::store::StoreError;
use bookpay_sdk::objects::{RecoveryStatus, WebhookEnvelope};
use bookpay_sdk::signature::verify_webhook_signature;
use ring::digest;
use tracing::{debug, error, info, warn};

/// Events that may create an order.
const PAYMENT_EVENTS: [&str; 2] = ["payment.captured", "payment.authorized"];

/// Stored outcome of events that need no action.
const OUTCOME_IGNORED: &str = "ignored";

/// Note key under which the storefront stores the serialized draft.
pub const ORDER_DRAFT_NOTE: &str = "order_draft";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub event_id: String,
    /// `None` when the event type needs no action.
    pub status: Option<RecoveryStatus>,
    pub duplicate: bool,
    /// The gateway should redeliver: the failure may clear up.
    pub retry_later: bool,
}

#[derive(Clone)]
pub struct WebhookProcessor {
    services: PaymentServices,
    secrets: SignatureSecrets,
    recovery: RecoveryChecker,
}

/// Event id derived from the body when the gateway sends no id header.
fn body_event_id(raw_body: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA256, raw_body);
    format!("body:{}", hex::encode(hash.as_ref()))
}

fn storage_error(e: StoreError) -> PaymentError {
    error!(error = %e, "Webhook event storage failed");
    match e {
        StoreError::Transient(_) => PaymentError::StorageUnavailable,
        other => PaymentError::Storage(other.to_string()),
    }
}

impl WebhookProcessor {
    pub fn new(services: PaymentServices, secrets: SignatureSecrets) -> Self {
        Self {
            recovery: RecoveryChecker::new(services.clone()),
            services,
            secrets,
        }
    }

    #[tracing::instrument(skip_all, name = "payment_webhook")]
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let signature = signature.unwrap_or_default();
        if !verify_webhook_signature(raw_body, signature, self.secrets.webhook_secret.as_bytes()) {
            warn!("Rejected webhook with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body).map_err(|e| {
            warn!(error = %e, "Webhook body is not a valid envelope");
            PaymentError::MalformedWebhook
        })?;
        let event_id = event_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| body_event_id(raw_body));
        let entity = envelope.payment();

        let record = WebhookEventRecord {
            event_id: event_id.clone(),
            event_type: envelope.event.clone(),
            payment_id: entity.map(|p| p.id.clone()),
            gateway_order_id: entity.and_then(|p| p.order_id.clone()),
            payload: serde_json::from_slice(raw_body).unwrap_or(serde_json::Value::Null),
            received_at: time::OffsetDateTime::now_utc(),
        };
        let settings = self.services.settings.snapshot().await;
        let store = self.services.store.as_ref();
        let record = &record;
        let state = settings
            .retry
            .run(
                move |_| store.record_webhook_event(record),
                StoreError::is_transient,
            )
            .await
            .map_err(storage_error)?;

        if let WebhookRecordState::Seen {
            outcome: Some(outcome),
        } = &state
        {
            info!(event_id = %event_id, outcome = %outcome, "Duplicate webhook delivery");
            return Ok(WebhookOutcome {
                event_id,
                status: RecoveryStatus::from_code(outcome),
                duplicate: true,
                retry_later: false,
            });
        }

        if !PAYMENT_EVENTS.contains(&envelope.event.as_str()) {
            debug!(event = %envelope.event, "Ignoring webhook event type");
            self.finish(&event_id, OUTCOME_IGNORED).await?;
            return Ok(WebhookOutcome {
                event_id,
                status: None,
                duplicate: false,
                retry_later: false,
            });
        }

        let Some(entity) = entity else {
            warn!(event = %envelope.event, "Payment event without a payment entity");
            return Err(PaymentError::MalformedWebhook);
        };
        let draft = entity
            .note(ORDER_DRAFT_NOTE)
            .and_then(|raw| match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(error = %e, "Order draft note is not valid json");
                    None
                }
            });

        let outcome = self
            .recovery
            .reconcile(Some(&entity.id), entity.order_id.as_deref(), draft)
            .await;
        let status = outcome.status();
        let retry_later = outcome.is_temporary();
        info!(event_id = %event_id, status = %status, "Webhook processed");

        // Leave temporary failures without an outcome so a redelivery
        // runs them again.
        if !retry_later {
            self.finish(&event_id, status.as_str()).await?;
        }
        Ok(WebhookOutcome {
            event_id,
            status: Some(status),
            duplicate: false,
            retry_later,
        })
    }

    async fn finish(&self, event_id: &str, outcome: &str) -> Result<(), PaymentError> {
        self.services
            .store
            .set_webhook_outcome(event_id, outcome)
            .await
            .map_err(storage_error)
    }
}
