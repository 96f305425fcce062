//! Payloads produced by the payment gateway.
//!
//! The same payment entity appears in `GET /payments/{id}` responses, in
//! `GET /orders/{id}/payments` collections and inside webhook envelopes.

use serde::{Deserialize, Serialize};

/// A payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPaymentEntity {
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form notes. The gateway sends `[]` when no notes are set.
    #[serde(default)]
    pub notes: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl GatewayPaymentEntity {
    /// Return a string note by key, if the notes are an object.
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.as_object()?.get(key)?.as_str()
    }
}

/// Response of `GET /orders/{id}/payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaymentsCollection {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub items: Vec<GatewayPaymentEntity>,
}

/// Error body returned by the gateway on 4xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayErrorBody {
    pub error: GatewayErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// Webhook envelope posted by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityWrapper {
    pub entity: GatewayPaymentEntity,
}

impl WebhookEnvelope {
    /// The payment entity carried by the event, if any.
    pub fn payment(&self) -> Option<&GatewayPaymentEntity> {
        self.payload.payment.as_ref().map(|w| &w.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_webhook_with_empty_notes() {
        let raw = r#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {"payment": {"entity": {
                "id": "pay_123", "amount": 49900, "currency": "INR",
                "status": "captured", "order_id": "order_abc", "method": "upi",
                "notes": []
            }}},
            "created_at": 1760000000
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_str(raw).unwrap();
        let payment = envelope.payment().unwrap();
        assert_eq!(payment.id, "pay_123");
        assert_eq!(payment.amount, 49900);
        assert_eq!(payment.note("order_draft"), None);
    }

    #[test]
    fn test_note_lookup() {
        let raw = r#"{"id": "pay_1", "amount": 100, "status": "captured",
                      "notes": {"order_draft": "{}"}}"#;
        let payment: GatewayPaymentEntity = serde_json::from_str(raw).unwrap();
        assert_eq!(payment.note("order_draft"), Some("{}"));
        assert_eq!(payment.order_id, None);
    }
}
