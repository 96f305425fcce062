//! Order persistence behind a trait, so the pipeline can run against
//! Postgres in production and an in-memory store in tests.

use crate::entities::orders::{FindOrderByPaymentIdentity, GetOrderById, InsertOrder};
use crate::entities::webhook_events::{InsertWebhookEvent, SetWebhookEventOutcome};
use crate::entities::{Order, WebhookEventRecord, WebhookRecordState};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;

/// Which uniqueness rule an insert ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueTarget {
    /// The order id primary key.
    OrderId,
    /// The gateway payment id or gateway order id.
    PaymentIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0:?}")]
    UniqueViolation(UniqueTarget),
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("storage failure: {0}")]
    Fatal(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

const ORDER_ID_CONSTRAINT: &str = "orders_pkey";

/// SQLSTATE codes worth retrying: connection exceptions (class 08),
/// serialization failure, deadlock, admin shutdown.
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "40001" | "40P01" | "57P01")
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let target = match db_err.constraint() {
                        Some(ORDER_ID_CONSTRAINT) => UniqueTarget::OrderId,
                        _ => UniqueTarget::PaymentIdentity,
                    };
                    return StoreError::UniqueViolation(target);
                }
                match db_err.code() {
                    Some(code) if is_transient_sqlstate(&code) => {
                        StoreError::Transient(e.to_string())
                    }
                    _ => StoreError::Fatal(e.to_string()),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Protocol(_) => StoreError::Transient(e.to_string()),
            _ => StoreError::Fatal(e.to_string()),
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Order whose gateway payment id or gateway order id matches.
    async fn find_by_payment_identity(
        &self,
        payment_id: Option<&str>,
        gateway_order_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError>;

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, StoreError>;

    /// Insert without upsert semantics: conflicts are reported as
    /// [`StoreError::UniqueViolation`].
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn record_webhook_event(
        &self,
        record: &WebhookEventRecord,
    ) -> Result<WebhookRecordState, StoreError>;

    async fn set_webhook_outcome(&self, event_id: &str, outcome: &str) -> Result<(), StoreError>;
}

/// Postgres-backed [`OrderStore`].
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    db: DatabaseProcessor,
}

impl PgOrderStore {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_payment_identity(
        &self,
        payment_id: Option<&str>,
        gateway_order_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        if payment_id.is_none() && gateway_order_id.is_none() {
            return Ok(None);
        }
        let record = self
            .db
            .process(FindOrderByPaymentIdentity {
                payment_id: payment_id.map(str::to_string),
                gateway_order_id: gateway_order_id.map(str::to_string),
            })
            .await?;
        Ok(record.map(Order::from))
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let record = self
            .db
            .process(GetOrderById {
                order_id: order_id.to_string(),
            })
            .await?;
        Ok(record.map(Order::from))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.db
            .process(InsertOrder {
                order: order.clone(),
            })
            .await?;
        Ok(())
    }

    async fn record_webhook_event(
        &self,
        record: &WebhookEventRecord,
    ) -> Result<WebhookRecordState, StoreError> {
        let state = self
            .db
            .process(InsertWebhookEvent {
                record: record.clone(),
            })
            .await?;
        Ok(state)
    }

    async fn set_webhook_outcome(&self, event_id: &str, outcome: &str) -> Result<(), StoreError> {
        self.db
            .process(SetWebhookEventOutcome {
                event_id: event_id.to_string(),
                outcome: outcome.to_string(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_sqlstates() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("40001"));
        assert!(is_transient_sqlstate("40P01"));
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("42P01"));
    }

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::from(sqlx::Error::PoolClosed).is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
    }
}
