pub mod orders;
pub mod payments;
pub mod webhook_events;

pub use orders::{Order, OrderPayment};
pub use payments::{PaymentStatus, VerifiedPayment};
pub use webhook_events::{WebhookEventRecord, WebhookRecordState};
