//! Events emitted after an order is committed.
//!
//! Events carry identifiers only; the consumer re-reads the order from the
//! store. Emitting never blocks the request path.

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer size of the notification channel.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A new order was inserted. Never emitted for replays.
    OrderConfirmed { order_id: String },
}

pub type NotificationSender = mpsc::Sender<NotificationEvent>;
pub type NotificationReceiver = mpsc::Receiver<NotificationEvent>;

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Fire-and-forget handle used by the pipeline to request notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: NotificationSender,
}

impl Notifier {
    pub fn new(tx: NotificationSender) -> Self {
        Self { tx }
    }

    pub fn order_confirmed(&self, order_id: &str) {
        let event = NotificationEvent::OrderConfirmed {
            order_id: order_id.to_string(),
        };
        match self.tx.try_send(event) {
            Ok(()) => debug!(order_id, "Queued order confirmation"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(order_id, "Notification queue full, confirmation dropped")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(order_id, "Notification dispatcher stopped, confirmation dropped")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_order_confirmed_is_queued() {
        let (tx, mut rx) = notification_channel();
        Notifier::new(tx).order_confirmed("BK1");
        assert_eq!(
            rx.recv().await,
            Some(NotificationEvent::OrderConfirmed {
                order_id: "BK1".to_string()
            })
        );
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (tx, rx) = notification_channel();
        drop(rx);
        Notifier::new(tx).order_confirmed("BK1");
    }
}
