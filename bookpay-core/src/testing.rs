//! In-memory fakes and fixtures for tests.
//!
//! Enabled for this crate's own tests and, through the `test-util`
//! feature, for the server's router tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::config::{OrderConfig, PaymentPolicy, Secret, SharedSettings, SignatureSecrets};
use crate::entities::{
    Order, PaymentStatus, VerifiedPayment, WebhookEventRecord, WebhookRecordState,
};
use crate::events::{NotificationEvent, NotificationReceiver, Notifier, notification_channel};
use crate::processors::notification::{EmailMessage, MailError, Mailer};
use crate::processors::status_checker::{GatewayError, PaymentGateway};
use crate::processors::{PaymentPipeline, PaymentServices, RecoveryChecker, WebhookProcessor};
use crate::store::{OrderStore, StoreError, UniqueTarget};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use bookpay_sdk::objects::{OrderDraft, PaymentAssertion};
use bookpay_sdk::signature::sign_payment;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const KEY_SECRET: &str = "rzp_secret_for_tests";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn test_secrets() -> SignatureSecrets {
    SignatureSecrets {
        key_secret: Secret::new(KEY_SECRET.to_string()),
        webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2))
}

/// A checkout callback signed with [`KEY_SECRET`].
pub fn signed_assertion(gateway_order_id: &str, payment_id: &str) -> PaymentAssertion {
    PaymentAssertion {
        payment_id: payment_id.to_string(),
        order_id: gateway_order_id.to_string(),
        signature: sign_payment(gateway_order_id, payment_id, KEY_SECRET.as_bytes()),
    }
}

/// Draft for two books with a coupon: grand total 499.00.
pub fn sample_draft_json() -> serde_json::Value {
    serde_json::json!({
        "order_id": "BK-1001",
        "user_info": {
            "name": "Asha Rao",
            "email": "asha@example.com",
            "phone": "+91 98450 00000",
            "address": "12 MG Road, Bengaluru"
        },
        "items": [
            {"product_id": "isbn-978", "name": "The Hobbit", "quantity": 2, "unit_price": "199.50", "line_total": "399.00"},
            {"product_id": "isbn-979", "name": "Dune", "quantity": 1, "unit_price": "150.00", "line_total": "150.00"}
        ],
        "order_summary": {"subtotal": "549.00", "coupon_discount": "100.00", "delivery_charge": "50.00", "grand_total": "499.00"},
        "payment": {"method": "razorpay", "amount": "499.00"},
        "order_date": "2026-10-14T10:00:00Z"
    })
}

pub fn sample_draft(order_id: Option<&str>) -> OrderDraft {
    let mut draft = OrderDraft::from_json(sample_draft_json()).unwrap();
    draft.order_id = order_id.map(str::to_string);
    draft
}

pub fn captured_payment(payment_id: &str, gateway_order_id: &str, amount: i64) -> VerifiedPayment {
    VerifiedPayment {
        payment_id: payment_id.to_string(),
        gateway_order_id: Some(gateway_order_id.to_string()),
        amount_minor_units: amount,
        currency: "INR".to_string(),
        status: PaymentStatus::Captured,
        method: Some("upi".to_string()),
    }
}

pub fn sample_order(order_id: &str, payment_id: &str, gateway_order_id: Option<&str>) -> Order {
    let payment = VerifiedPayment {
        gateway_order_id: gateway_order_id.map(str::to_string),
        ..captured_payment(payment_id, "", 49900)
    };
    Order::from_verified(
        order_id.to_string(),
        &sample_draft(None),
        &payment,
        None,
        time::OffsetDateTime::now_utc(),
    )
}

#[derive(Default)]
struct MemoryState {
    orders: HashMap<String, Order>,
    webhook_events: HashMap<String, (WebhookEventRecord, Option<String>)>,
}

/// [`OrderStore`] with the same uniqueness rules as the Postgres schema.
///
/// Every call yields to the scheduler first, so concurrent requests
/// interleave the way they would against a real database.
#[derive(Default)]
pub struct MemoryOrderStore {
    state: Mutex<MemoryState>,
    failing_inserts: AtomicU32,
    conflicts: AtomicU32,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` inserts fail with a transient error.
    pub fn fail_next_inserts(&self, n: u32) {
        self.failing_inserts.store(n, Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.state.lock().unwrap().orders.get(order_id).cloned()
    }

    /// Inserts rejected by a payment identity constraint.
    pub fn conflict_count(&self) -> u32 {
        self.conflicts.load(Ordering::SeqCst)
    }

    pub fn webhook_event_count(&self) -> usize {
        self.state.lock().unwrap().webhook_events.len()
    }

    pub fn webhook_outcome(&self, event_id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .webhook_events
            .get(event_id)
            .and_then(|(_, outcome)| outcome.clone())
    }
}

fn matches_identity(order: &Order, payment_id: Option<&str>, gateway_order_id: Option<&str>) -> bool {
    let by_payment = payment_id.is_some_and(|id| order.payment.razorpay_payment_id == id);
    let by_order = gateway_order_id.is_some()
        && order.payment.razorpay_order_id.as_deref() == gateway_order_id;
    by_payment || by_order
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_payment_identity(
        &self,
        payment_id: Option<&str>,
        gateway_order_id: Option<&str>,
    ) -> Result<Option<Order>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .values()
            .filter(|o| matches_identity(o, payment_id, gateway_order_id))
            .min_by_key(|o| o.created_at)
            .cloned())
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        tokio::task::yield_now().await;
        Ok(self.order(order_id))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let remaining = self.failing_inserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("connection reset".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if state.orders.contains_key(&order.order_id) {
            return Err(StoreError::UniqueViolation(UniqueTarget::OrderId));
        }
        let payment = &order.payment;
        if state.orders.values().any(|o| {
            matches_identity(
                o,
                Some(&payment.razorpay_payment_id),
                payment.razorpay_order_id.as_deref(),
            )
        }) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::UniqueViolation(UniqueTarget::PaymentIdentity));
        }
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn record_webhook_event(
        &self,
        record: &WebhookEventRecord,
    ) -> Result<WebhookRecordState, StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if let Some((_, outcome)) = state.webhook_events.get(&record.event_id) {
            return Ok(WebhookRecordState::Seen {
                outcome: outcome.clone(),
            });
        }
        state
            .webhook_events
            .insert(record.event_id.clone(), (record.clone(), None));
        Ok(WebhookRecordState::New)
    }

    async fn set_webhook_outcome(&self, event_id: &str, outcome: &str) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.webhook_events.get_mut(event_id) {
            entry.1 = Some(outcome.to_string());
        }
        Ok(())
    }
}

type ErrorFactory = Box<dyn Fn() -> GatewayError + Send + Sync>;

/// [`PaymentGateway`] answering from a fixed set of payments.
#[derive(Default)]
pub struct ScriptedGateway {
    payments: Mutex<Vec<VerifiedPayment>>,
    failures: Mutex<Option<(u32, ErrorFactory)>>,
    fetches: AtomicU32,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, payment: VerifiedPayment) {
        self.payments.lock().unwrap().push(payment);
    }

    /// Fail the next `n` calls with errors from `factory`.
    pub fn fail_next(&self, n: u32, factory: impl Fn() -> GatewayError + Send + Sync + 'static) {
        *self.failures.lock().unwrap() = Some((n, Box::new(factory)));
    }

    /// Number of calls made, failed ones included.
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self) -> Option<GatewayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut failures = self.failures.lock().unwrap();
        let (remaining, factory) = failures.as_mut()?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(factory())
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn fetch_payment(&self, payment_id: &str) -> Result<VerifiedPayment, GatewayError> {
        tokio::task::yield_now().await;
        if let Some(e) = self.scripted_failure() {
            return Err(e);
        }
        self.payments
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_id == payment_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn fetch_order_payments(
        &self,
        gateway_order_id: &str,
    ) -> Result<Vec<VerifiedPayment>, GatewayError> {
        tokio::task::yield_now().await;
        if let Some(e) = self.scripted_failure() {
            return Err(e);
        }
        Ok(self
            .payments
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned()
            .collect())
    }
}

/// [`Mailer`] that keeps every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Processors wired to in-memory fakes.
pub struct TestHarness {
    pub store: Arc<MemoryOrderStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub services: PaymentServices,
    notifications: NotificationReceiver,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_policy(PaymentPolicy::default())
    }

    pub fn with_policy(policy: PaymentPolicy) -> Self {
        let store = Arc::new(MemoryOrderStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let (tx, notifications) = notification_channel();
        let settings = SharedSettings::new(policy, fast_retry(), OrderConfig::default());
        let services = PaymentServices::new(
            store.clone(),
            gateway.clone(),
            Notifier::new(tx),
            settings,
        );
        Self {
            store,
            gateway,
            services,
            notifications,
        }
    }

    pub fn pipeline(&self) -> PaymentPipeline {
        PaymentPipeline::new(self.services.clone(), test_secrets())
    }

    pub fn recovery(&self) -> RecoveryChecker {
        RecoveryChecker::new(self.services.clone())
    }

    pub fn webhook(&self) -> WebhookProcessor {
        WebhookProcessor::new(self.services.clone(), test_secrets())
    }

    /// Order ids of every confirmation queued so far.
    pub fn drain_notifications(&mut self) -> Vec<String> {
        let mut ids = Vec::new();
        while let Ok(NotificationEvent::OrderConfirmed { order_id }) = self.notifications.try_recv() {
            ids.push(order_id);
        }
        ids
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
