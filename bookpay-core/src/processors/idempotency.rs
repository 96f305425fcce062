//! Idempotency Guard.
//!
//! Looks for an order already created for a payment before anything is
//! written. This is only a fast path: two racing requests can both miss
//! here, and the unique constraints in the store settle the race.

use crate::entities::Order;
use crate::error::PaymentError;
use crate::store::{OrderStore, StoreError};
use crate::utils::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn OrderStore>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Order matching either identifier, if one exists.
    #[tracing::instrument(skip_all, name = "idempotency_guard")]
    pub async fn find_existing(
        &self,
        retry: &RetryPolicy,
        payment_id: Option<&str>,
        gateway_order_id: Option<&str>,
    ) -> Result<Option<Order>, PaymentError> {
        if payment_id.is_none() && gateway_order_id.is_none() {
            return Ok(None);
        }
        let store = self.store.as_ref();
        let existing = retry
            .run(
                move |_| store.find_by_payment_identity(payment_id, gateway_order_id),
                StoreError::is_transient,
            )
            .await
            .map_err(|e| {
                error!(error = %e, "Idempotency lookup failed");
                match e {
                    StoreError::Transient(_) => PaymentError::StorageUnavailable,
                    other => PaymentError::Storage(other.to_string()),
                }
            })?;
        if let Some(order) = &existing {
            debug!(order_id = %order.order_id, "Payment already has an order");
        }
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryOrderStore, sample_order};

    #[tokio::test]
    async fn test_matches_either_identifier() {
        let store = Arc::new(MemoryOrderStore::new());
        store
            .insert_order(&sample_order("BK1", "pay_1", Some("order_1")))
            .await
            .unwrap();
        let guard = IdempotencyGuard::new(store);
        let retry = RetryPolicy::once();

        let by_payment = guard.find_existing(&retry, Some("pay_1"), None).await.unwrap();
        assert_eq!(by_payment.map(|o| o.order_id), Some("BK1".to_string()));

        let by_order = guard
            .find_existing(&retry, Some("pay_other"), Some("order_1"))
            .await
            .unwrap();
        assert_eq!(by_order.map(|o| o.order_id), Some("BK1".to_string()));

        assert!(guard.find_existing(&retry, None, None).await.unwrap().is_none());
        assert!(
            guard
                .find_existing(&retry, Some("pay_2"), Some("order_2"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
