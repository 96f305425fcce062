//! Request processors for the payment service.
//!
//! - `PaymentPipeline`: checkout callback, signature to committed order
//! - `RecoveryChecker`: reconciles a payment whose callback never arrived
//! - `WebhookProcessor`: authenticated gateway webhooks, feeds `RecoveryChecker`
//! - `NotificationDispatcher`: receives `OrderConfirmed`, emails the customer

pub mod idempotency;
pub mod notification;
pub mod order_writer;
pub mod pipeline;
pub mod recovery;
pub mod status_checker;
pub mod webhook;

pub use idempotency::IdempotencyGuard;
pub use notification::{LogMailer, Mailer, NotificationDispatcher, ResendMailer};
pub use order_writer::{OrderWriter, WriteOutcome};
pub use pipeline::PaymentPipeline;
pub use recovery::{RecoveryChecker, RecoveryOutcome};
pub use status_checker::{PaymentGateway, RazorpayGateway};
pub use webhook::{WebhookOutcome, WebhookProcessor};

use crate::config::SharedSettings;
use crate::events::Notifier;
use crate::store::OrderStore;
use std::sync::Arc;

/// Handles shared by every processor.
#[derive(Clone)]
pub struct PaymentServices {
    pub store: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Notifier,
    pub settings: SharedSettings,
}

impl PaymentServices {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
        settings: SharedSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            settings,
        }
    }
}
