//! Payment verification pipeline.
//!
//! Turns a checkout callback into exactly one committed order:
//! `Received -> SignatureChecked -> StatusVerified -> Deduplicated ->
//! Written -> Notified`. Any failing stage stops the pipeline before
//! anything is written.

use super::PaymentServices;
use super::idempotency::IdempotencyGuard;
use super::order_writer::{OrderWriter, WriteOutcome};
use super::status_checker::{check_payment, lookup_payment};
use crate::config::{SignatureSecrets, VerificationMode};
use crate::entities::{PaymentStatus, VerifiedPayment};
use crate::error::PaymentError;
use bookpay_sdk::objects::{DraftError, OrderDraft, PaymentAssertion};
use bookpay_sdk::signature::verify_payment_signature;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct PaymentPipeline {
    services: PaymentServices,
    secrets: SignatureSecrets,
    guard: IdempotencyGuard,
    writer: OrderWriter,
}

impl PaymentPipeline {
    pub fn new(services: PaymentServices, secrets: SignatureSecrets) -> Self {
        Self {
            guard: IdempotencyGuard::new(services.store.clone()),
            writer: OrderWriter::new(services.store.clone()),
            services,
            secrets,
        }
    }

    /// Verify a checkout callback and create its order.
    ///
    /// Returns [`WriteOutcome::Replayed`] when the payment already has an
    /// order; only [`WriteOutcome::Created`] triggers a notification.
    #[tracing::instrument(skip_all, name = "verify_payment", fields(payment_id = %assertion.payment_id, gateway_order_id = %assertion.order_id))]
    pub async fn verify_payment(
        &self,
        assertion: &PaymentAssertion,
        draft: Option<serde_json::Value>,
    ) -> Result<WriteOutcome, PaymentError> {
        debug!(stage = "received");

        if !verify_payment_signature(
            &assertion.order_id,
            &assertion.payment_id,
            &assertion.signature,
            self.secrets.key_secret.as_bytes(),
        ) {
            warn!("Rejected payment with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }
        debug!(stage = "signature_checked");

        let draft = OrderDraft::from_json(
            draft
                .filter(|d| !d.is_null())
                .ok_or(DraftError::MissingField("orderData"))?,
        )?;
        let totals = draft.validate()?;

        let settings = self.services.settings.snapshot().await;
        let payment = match settings.policy.verification {
            VerificationMode::Strict => {
                lookup_payment(
                    self.services.gateway.as_ref(),
                    &settings.retry,
                    &assertion.payment_id,
                )
                .await?
            }
            VerificationMode::SkipGateway => {
                warn!("Gateway verification skipped, trusting order data for amount and status");
                VerifiedPayment {
                    payment_id: assertion.payment_id.clone(),
                    gateway_order_id: Some(assertion.order_id.clone()),
                    amount_minor_units: totals.grand_total_minor,
                    currency: settings.orders.currency.clone(),
                    status: PaymentStatus::Captured,
                    method: Some(draft.payment.method.clone()),
                }
            }
        };
        check_payment(
            &settings.policy,
            &payment,
            totals.grand_total_minor,
            &settings.orders.currency,
            Some(&assertion.order_id),
        )
        .inspect_err(|e| warn!(error = %e, "Payment failed verification"))?;
        debug!(stage = "status_verified", amount = payment.amount_minor_units);

        if let Some(existing) = self
            .guard
            .find_existing(
                &settings.retry,
                Some(&payment.payment_id),
                payment.gateway_order_id.as_deref(),
            )
            .await?
        {
            info!(order_id = %existing.order_id, "Payment already processed");
            return Ok(WriteOutcome::Replayed(existing));
        }
        debug!(stage = "deduplicated");

        let outcome = self
            .writer
            .write(
                &settings.retry,
                &settings.orders,
                &draft,
                &payment,
                Some(&assertion.signature),
            )
            .await?;
        debug!(stage = "written", created = outcome.is_created());

        if let WriteOutcome::Created(order) = &outcome {
            self.services.notifier.order_confirmed(&order.order_id);
            debug!(stage = "notified");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentPolicy;
    use crate::testing::{TestHarness, captured_payment, sample_draft_json, signed_assertion};
    use futures_util::future::join_all;

    #[tokio::test]
    async fn test_valid_payment_creates_one_order() {
        let mut harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));

        let outcome = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await
            .unwrap();

        assert!(outcome.is_created());
        let order = outcome.order();
        assert_eq!(order.payment.amount_minor, 49900);
        assert_eq!(order.payment.razorpay_order_id.as_deref(), Some("order_abc"));
        assert!(order.payment.payment_confirmed);
        assert_eq!(harness.store.order_count(), 1);
        assert_eq!(harness.drain_notifications(), vec![order.order_id.clone()]);
    }

    #[tokio::test]
    async fn test_invalid_signature_touches_nothing() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_124", "order_abc", 49900));
        let mut assertion = signed_assertion("order_abc", "pay_123");
        assertion.payment_id = "pay_124".to_string();

        let result = harness
            .pipeline()
            .verify_payment(&assertion, Some(sample_draft_json()))
            .await;

        assert_eq!(result, Err(PaymentError::InvalidSignature));
        assert_eq!(harness.gateway.fetch_count(), 0);
        assert_eq!(harness.store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_amount_mismatch_creates_nothing() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49901));

        let result = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await;

        assert_eq!(
            result,
            Err(PaymentError::AmountMismatch {
                expected: 49900,
                actual: 49901
            })
        );
        assert_eq!(harness.store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_currency_mismatch_creates_nothing() {
        let harness = TestHarness::new();
        let mut payment = captured_payment("pay_123", "order_abc", 49900);
        payment.currency = "JPY".to_string();
        harness.gateway.insert(payment);

        let result = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await;

        assert_eq!(
            result,
            Err(PaymentError::CurrencyMismatch {
                expected: "INR".to_string(),
                actual: "JPY".to_string()
            })
        );
        assert_eq!(harness.store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_authorized_payment_is_pending_by_default() {
        let harness = TestHarness::new();
        let mut payment = captured_payment("pay_123", "order_abc", 49900);
        payment.status = PaymentStatus::Authorized;
        harness.gateway.insert(payment);

        let result = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await;
        assert_eq!(result, Err(PaymentError::PaymentPending));
        assert_eq!(harness.store.order_count(), 0);

        harness
            .services
            .settings
            .policy
            .write()
            .await
            .accept_authorized = true;
        let outcome = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await
            .unwrap();
        assert!(outcome.is_created());
    }

    #[tokio::test]
    async fn test_failed_payment_creates_nothing() {
        let harness = TestHarness::new();
        let mut payment = captured_payment("pay_123", "order_abc", 49900);
        payment.status = PaymentStatus::Failed;
        harness.gateway.insert(payment);

        let result = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await;
        assert_eq!(
            result,
            Err(PaymentError::PaymentNotSuccessful {
                status: PaymentStatus::Failed
            })
        );
        assert_eq!(harness.store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_or_tampered_draft_rejected() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));
        let pipeline = harness.pipeline();
        let assertion = signed_assertion("order_abc", "pay_123");

        let missing = pipeline.verify_payment(&assertion, None).await;
        assert_eq!(
            missing,
            Err(PaymentError::InvalidDraft(DraftError::MissingField("orderData")))
        );

        let mut tampered = sample_draft_json();
        tampered["order_summary"]["grand_total"] = serde_json::json!(1);
        let result = pipeline.verify_payment(&assertion, Some(tampered)).await;
        assert_eq!(
            result,
            Err(PaymentError::InvalidDraft(DraftError::GrandTotalMismatch))
        );
        assert_eq!(harness.store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_replay_returns_same_order_without_notification() {
        let mut harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));
        let pipeline = harness.pipeline();
        let assertion = signed_assertion("order_abc", "pay_123");

        let first = pipeline
            .verify_payment(&assertion, Some(sample_draft_json()))
            .await
            .unwrap();
        let second = pipeline
            .verify_payment(&assertion, Some(sample_draft_json()))
            .await
            .unwrap();

        assert!(first.is_created());
        assert_eq!(second, WriteOutcome::Replayed(first.order().clone()));
        assert_eq!(harness.drain_notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_create_one_order() {
        let mut harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));
        let pipeline = harness.pipeline();
        let assertion = signed_assertion("order_abc", "pay_123");

        let results = join_all(
            (0..8).map(|_| pipeline.verify_payment(&assertion, Some(sample_draft_json()))),
        )
        .await;

        let ids: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().into_order().order_id)
            .collect();
        assert!(ids.iter().all(|id| id == &ids[0]));
        assert_eq!(harness.store.order_count(), 1);
        // The memory store yields on every call, so the requests interleave
        // and at least one loses the insert race.
        assert!(harness.store.conflict_count() > 0);
        assert_eq!(harness.drain_notifications(), vec![ids[0].clone()]);
    }

    #[tokio::test]
    async fn test_gateway_order_mismatch_rejected() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_other", 49900));

        let result = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await;
        assert_eq!(result, Err(PaymentError::OrderMismatch));
    }

    #[tokio::test]
    async fn test_skip_gateway_mode_trusts_draft_total() {
        let harness = TestHarness::with_policy(PaymentPolicy {
            verification: VerificationMode::SkipGateway,
            ..Default::default()
        });

        let outcome = harness
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await
            .unwrap();
        assert_eq!(outcome.order().payment.amount_minor, 49900);
        assert_eq!(harness.gateway.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_recovery_matches_primary_path() {
        let harness = TestHarness::new();
        harness
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));
        let primary = TestHarness::new();
        primary
            .gateway
            .insert(captured_payment("pay_123", "order_abc", 49900));

        let recovered = harness
            .recovery()
            .reconcile(Some("pay_123"), None, Some(sample_draft_json()))
            .await;
        let verified = primary
            .pipeline()
            .verify_payment(
                &signed_assertion("order_abc", "pay_123"),
                Some(sample_draft_json()),
            )
            .await
            .unwrap();

        let recovered = recovered.order().unwrap().to_details();
        let verified = verified.order().to_details();
        assert_eq!(recovered.order_id, verified.order_id);
        assert_eq!(recovered.items, verified.items);
        assert_eq!(recovered.order_summary, verified.order_summary);
        assert_eq!(recovered.payment.amount, verified.payment.amount);
        assert_eq!(recovered.payment.currency, verified.payment.currency);
        assert_eq!(
            recovered.payment.razorpay_order_id,
            verified.payment.razorpay_order_id
        );
        assert_eq!(
            recovered.payment.razorpay_order_id.as_deref(),
            Some("order_abc")
        );
        assert_eq!(recovered.payment.status, verified.payment.status);
        assert_eq!(recovered.order_status, verified.order_status);
    }
}
