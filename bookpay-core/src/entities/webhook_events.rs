use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::types::Json;

/// One delivery of a provider webhook, keyed by the provider's event id.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: time::OffsetDateTime,
}

/// Result of recording a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookRecordState {
    /// First time this event id is seen.
    New,
    /// Already recorded. `outcome` is `None` while the first delivery is
    /// still being processed or if it never finished.
    Seen { outcome: Option<String> },
}

#[derive(Debug, Clone)]
/// Insert the event if its id is unknown, otherwise report the stored outcome.
pub struct InsertWebhookEvent {
    pub record: WebhookEventRecord,
}

impl Processor<InsertWebhookEvent> for DatabaseProcessor {
    type Output = WebhookRecordState;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertWebhookEvent")]
    async fn process(&self, insert: InsertWebhookEvent) -> Result<WebhookRecordState, sqlx::Error> {
        let record = insert.record;
        let inserted = sqlx::query(
            r#"
            INSERT INTO payment_webhook_events
                (event_id, event_type, payment_id, gateway_order_id, payload, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(&record.payment_id)
        .bind(&record.gateway_order_id)
        .bind(Json(&record.payload))
        .bind(record.received_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(WebhookRecordState::New);
        }

        let outcome: Option<String> =
            sqlx::query_scalar("SELECT outcome FROM payment_webhook_events WHERE event_id = $1")
                .bind(&record.event_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(WebhookRecordState::Seen { outcome })
    }
}

#[derive(Debug, Clone)]
pub struct SetWebhookEventOutcome {
    pub event_id: String,
    pub outcome: String,
}

impl Processor<SetWebhookEventOutcome> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SetWebhookEventOutcome")]
    async fn process(&self, update: SetWebhookEventOutcome) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE payment_webhook_events SET outcome = $2 WHERE event_id = $1")
            .bind(update.event_id)
            .bind(update.outcome)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
