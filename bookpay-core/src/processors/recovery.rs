//! Recovery Checker.
//!
//! Reconciles a payment the storefront lost track of: the browser closed
//! before the verify callback, or the callback failed half way. Produces
//! the same order the primary path would have.

use super::PaymentServices;
use super::idempotency::IdempotencyGuard;
use super::order_writer::{OrderWriter, WriteOutcome};
use super::status_checker::{check_payment, is_accepted, lookup_order_payments, lookup_payment};
use crate::entities::{Order, PaymentStatus, VerifiedPayment};
use crate::error::PaymentError;
use bookpay_sdk::objects::{OrderDraft, RecoveryStatus};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    OrderExists(Order),
    OrderCreated(Order),
    /// The gateway says the payment did not succeed, or does not know it.
    PaymentFailed(PaymentError),
    PaymentPending,
    /// The payment succeeded but the order could not be created.
    RecoveryFailed(PaymentError),
    /// Not enough input to look anything up or to build the order.
    NoData(&'static str),
}

impl RecoveryOutcome {
    pub fn status(&self) -> RecoveryStatus {
        match self {
            RecoveryOutcome::OrderExists(_) => RecoveryStatus::OrderExists,
            RecoveryOutcome::OrderCreated(_) => RecoveryStatus::OrderCreated,
            RecoveryOutcome::PaymentFailed(_) => RecoveryStatus::PaymentFailed,
            RecoveryOutcome::PaymentPending => RecoveryStatus::PaymentPending,
            RecoveryOutcome::RecoveryFailed(_) => RecoveryStatus::RecoveryFailed,
            RecoveryOutcome::NoData(_) => RecoveryStatus::NoData,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            RecoveryOutcome::OrderExists(order) | RecoveryOutcome::OrderCreated(order) => {
                Some(order)
            }
            _ => None,
        }
    }

    /// Whether the same reconcile call may succeed later.
    pub fn is_temporary(&self) -> bool {
        match self {
            RecoveryOutcome::RecoveryFailed(e) => e.is_temporary(),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct RecoveryChecker {
    services: PaymentServices,
    guard: IdempotencyGuard,
    writer: OrderWriter,
}

/// Pick the attempt that paid, or else the most recent one.
fn select_payment(
    payments: Vec<VerifiedPayment>,
    accept: impl Fn(PaymentStatus) -> bool,
) -> Option<VerifiedPayment> {
    if let Some(paid) = payments.iter().find(|p| accept(p.status)) {
        return Some(paid.clone());
    }
    payments.into_iter().last()
}

impl RecoveryChecker {
    pub fn new(services: PaymentServices) -> Self {
        Self {
            guard: IdempotencyGuard::new(services.store.clone()),
            writer: OrderWriter::new(services.store.clone()),
            services,
        }
    }

    #[tracing::instrument(skip_all, name = "recovery", fields(payment_id = ?payment_id, gateway_order_id = ?gateway_order_id))]
    pub async fn reconcile(
        &self,
        payment_id: Option<&str>,
        gateway_order_id: Option<&str>,
        draft: Option<serde_json::Value>,
    ) -> RecoveryOutcome {
        let payment_id = payment_id.filter(|id| !id.is_empty());
        let gateway_order_id = gateway_order_id.filter(|id| !id.is_empty());
        if payment_id.is_none() && gateway_order_id.is_none() {
            return RecoveryOutcome::NoData("payment id or gateway order id is required");
        }

        let settings = self.services.settings.snapshot().await;

        match self
            .guard
            .find_existing(&settings.retry, payment_id, gateway_order_id)
            .await
        {
            Ok(Some(order)) => return RecoveryOutcome::OrderExists(order),
            Ok(None) => {}
            Err(e) => return RecoveryOutcome::RecoveryFailed(e),
        }

        let gateway = self.services.gateway.as_ref();
        let lookup = match (payment_id, gateway_order_id) {
            (Some(payment_id), _) => lookup_payment(gateway, &settings.retry, payment_id)
                .await
                .map(Some),
            (None, Some(order_id)) => lookup_order_payments(gateway, &settings.retry, order_id)
                .await
                .map(|payments| select_payment(payments, |s| is_accepted(&settings.policy, s))),
            (None, None) => Ok(None),
        };
        let payment = match lookup {
            Ok(Some(payment)) => payment,
            Ok(None) => return RecoveryOutcome::NoData("no payment attempts for this order"),
            Err(e @ PaymentError::PaymentNotFound) => return RecoveryOutcome::PaymentFailed(e),
            Err(e) => return RecoveryOutcome::RecoveryFailed(e),
        };

        if !is_accepted(&settings.policy, payment.status) {
            info!(status = %payment.status, "Payment not in an accepted state");
            return match payment.status {
                PaymentStatus::Authorized | PaymentStatus::Created => {
                    RecoveryOutcome::PaymentPending
                }
                status => {
                    RecoveryOutcome::PaymentFailed(PaymentError::PaymentNotSuccessful { status })
                }
            };
        }

        let Some(draft) = draft.filter(|d| !d.is_null()) else {
            return RecoveryOutcome::NoData("order data is required to create the order");
        };
        let draft = match OrderDraft::from_json(draft) {
            Ok(draft) => draft,
            Err(e) => return RecoveryOutcome::RecoveryFailed(e.into()),
        };
        let totals = match draft.validate() {
            Ok(totals) => totals,
            Err(e) => return RecoveryOutcome::RecoveryFailed(e.into()),
        };
        if let Err(e) = check_payment(
            &settings.policy,
            &payment,
            totals.grand_total_minor,
            &settings.orders.currency,
            gateway_order_id,
        ) {
            warn!(error = %e, "Recovered payment does not match the order data");
            return RecoveryOutcome::RecoveryFailed(e);
        }

        match self
            .writer
            .write(&settings.retry, &settings.orders, &draft, &payment, None)
            .await
        {
            Ok(WriteOutcome::Created(order)) => {
                self.services.notifier.order_confirmed(&order.order_id);
                info!(order_id = %order.order_id, "Order recovered");
                RecoveryOutcome::OrderCreated(order)
            }
            Ok(WriteOutcome::Replayed(order)) => RecoveryOutcome::OrderExists(order),
            Err(e) => RecoveryOutcome::RecoveryFailed(e),
        }
    }
}
