//! Order Writer.
//!
//! Builds the order from the draft and the verified payment and inserts
//! it. The store's unique constraints are the real idempotency mechanism:
//! losing an insert race on a payment identifier yields the winner's order.

use crate::config::OrderConfig;
use crate::entities::{Order, VerifiedPayment};
use crate::error::PaymentError;
use crate::store::{OrderStore, StoreError, UniqueTarget};
use crate::utils::order_id::generate_order_id;
use crate::utils::retry::RetryPolicy;
use bookpay_sdk::objects::OrderDraft;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// What the write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// This call inserted the order.
    Created(Order),
    /// Another request already created the order for this payment.
    Replayed(Order),
}

impl WriteOutcome {
    pub fn order(&self) -> &Order {
        match self {
            WriteOutcome::Created(order) | WriteOutcome::Replayed(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            WriteOutcome::Created(order) | WriteOutcome::Replayed(order) => order,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, WriteOutcome::Created(_))
    }
}

fn is_retryable(e: &StoreError) -> bool {
    e.is_transient() || *e == StoreError::UniqueViolation(UniqueTarget::OrderId)
}

#[derive(Clone)]
pub struct OrderWriter {
    store: Arc<dyn OrderStore>,
}

impl OrderWriter {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Insert the order for a verified payment.
    ///
    /// Uses the draft's order id when present, otherwise generates one. An
    /// order id collision regenerates the id and counts as one attempt.
    #[tracing::instrument(skip_all, name = "order_writer", fields(payment_id = %payment.payment_id))]
    pub async fn write(
        &self,
        retry: &RetryPolicy,
        orders: &OrderConfig,
        draft: &OrderDraft,
        payment: &VerifiedPayment,
        signature: Option<&str>,
    ) -> Result<WriteOutcome, PaymentError> {
        let initial_id = draft
            .order_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_order_id(&orders.id_prefix, time::OffsetDateTime::now_utc()));
        let current_id = Mutex::new(initial_id);
        let current_id = &current_id;
        let store = self.store.as_ref();

        let result = retry
            .run(
                move |_| async move {
                    let order_id = current_id
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    let order = Order::from_verified(
                        order_id,
                        draft,
                        payment,
                        signature,
                        time::OffsetDateTime::now_utc(),
                    );
                    match store.insert_order(&order).await {
                        Ok(()) => Ok(WriteOutcome::Created(order)),
                        Err(StoreError::UniqueViolation(UniqueTarget::PaymentIdentity)) => {
                            let winner = store
                                .find_by_payment_identity(
                                    Some(&payment.payment_id),
                                    payment.gateway_order_id.as_deref(),
                                )
                                .await?;
                            match winner {
                                Some(existing) => Ok(WriteOutcome::Replayed(existing)),
                                // Conflicting row is not visible yet.
                                None => Err(StoreError::Transient(
                                    "conflicting order not found".to_string(),
                                )),
                            }
                        }
                        Err(StoreError::UniqueViolation(UniqueTarget::OrderId)) => {
                            let fresh = generate_order_id(
                                &orders.id_prefix,
                                time::OffsetDateTime::now_utc(),
                            );
                            warn!(
                                taken = %order.order_id,
                                fresh = %fresh,
                                "Order id already in use, regenerating"
                            );
                            *current_id.lock().unwrap_or_else(PoisonError::into_inner) = fresh;
                            Err(StoreError::UniqueViolation(UniqueTarget::OrderId))
                        }
                        Err(e) => Err(e),
                    }
                },
                is_retryable,
            )
            .await;

        match result {
            Ok(outcome) => {
                match &outcome {
                    WriteOutcome::Created(order) => {
                        info!(order_id = %order.order_id, "Order created")
                    }
                    WriteOutcome::Replayed(order) => {
                        info!(order_id = %order.order_id, "Order already existed, returning it")
                    }
                }
                Ok(outcome)
            }
            Err(StoreError::Transient(message)) => {
                error!(error = %message, "Order write failed after retries");
                Err(PaymentError::StorageUnavailable)
            }
            Err(e) => {
                error!(error = %e, "Order write failed");
                Err(PaymentError::Storage(e.to_string()))
            }
        }
    }
}
