//! Application state shared across all request handlers.

use bookpay_core::config::SignatureSecrets;
use bookpay_core::processors::{
    PaymentPipeline, PaymentServices, RecoveryChecker, WebhookProcessor,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PaymentPipeline>,
    pub recovery: Arc<RecoveryChecker>,
    pub webhook: Arc<WebhookProcessor>,
    /// Pool checked by `/ready`. `None` in router tests.
    pub db: Option<PgPool>,
}

impl AppState {
    /// Wire the processors around one set of services.
    pub fn new(services: PaymentServices, secrets: SignatureSecrets, db: Option<PgPool>) -> Self {
        Self {
            pipeline: Arc::new(PaymentPipeline::new(services.clone(), secrets.clone())),
            recovery: Arc::new(RecoveryChecker::new(services.clone())),
            webhook: Arc::new(WebhookProcessor::new(services, secrets)),
            db,
        }
    }
}
