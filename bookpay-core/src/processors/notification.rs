//! NotificationDispatcher processor.
//!
//! Receives `OrderConfirmed` events, loads the order and emails the
//! customer a confirmation. Delivery failures are logged and dropped; the
//! order is already committed and the response already sent.

use crate::config::MailConfig;
use crate::entities::Order;
use crate::events::{NotificationEvent, NotificationReceiver};
use crate::store::{OrderStore, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Lets the provider drop duplicate sends of the same confirmation.
    pub idempotency_key: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Sends mail through the Resend REST API.
pub struct ResendMailer {
    http_client: reqwest::Client,
    config: MailConfig,
}

impl ResendMailer {
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let url = format!(
            "{}/emails",
            self.config.api_base.as_str().trim_end_matches('/')
        );
        let body = ResendEmail {
            from: &self.config.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };
        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.config.api_key.reveal())
            .header("Idempotency-Key", &message.idempotency_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Used when mail is disabled: logs the message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            subject = %message.subject,
            key = %message.idempotency_key,
            "Mail disabled, confirmation not sent"
        );
        Ok(())
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the confirmation email for an order.
pub fn render_confirmation(order: &Order, subject_prefix: &str) -> EmailMessage {
    let summary = &order.order_summary;
    let user = &order.user_info;
    let mut rows = String::new();
    for item in &order.items {
        // Writing to a String cannot fail.
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&item.name),
            item.quantity,
            item.line_total
        );
    }
    let html = format!(
        "<h2>Thank you for your order, {name}!</h2>\
         <p>Order <strong>{order_id}</strong> is confirmed.</p>\
         <table><tr><th>Book</th><th>Qty</th><th>Total</th></tr>{rows}</table>\
         <p>Subtotal: {subtotal}<br>Discount: {discount}<br>Delivery: {delivery}<br>\
         <strong>Paid: {grand_total} {currency}</strong></p>\
         <h3>Shipping to</h3><p>{name}<br>{address}<br>{phone}</p>",
        name = escape_html(&user.name),
        order_id = escape_html(&order.order_id),
        subtotal = summary.subtotal,
        discount = summary.coupon_discount,
        delivery = summary.delivery_charge,
        grand_total = summary.grand_total,
        currency = escape_html(&order.payment.currency),
        address = escape_html(&user.address),
        phone = escape_html(&user.phone),
    );
    EmailMessage {
        to: user.email.clone(),
        subject: format!("{subject_prefix} Order {} confirmed", order.order_id)
            .trim()
            .to_string(),
        html,
        idempotency_key: format!("order-confirmed/{}", order.order_id),
    }
}

/// Background task delivering order confirmations.
pub struct NotificationDispatcher {
    store: Arc<dyn OrderStore>,
    mailer: Arc<dyn Mailer>,
    subject_prefix: String,
    notification_rx: NotificationReceiver,
    shutdown_rx: watch::Receiver<bool>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        mailer: Arc<dyn Mailer>,
        subject_prefix: String,
        notification_rx: NotificationReceiver,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            mailer,
            subject_prefix,
            notification_rx,
            shutdown_rx,
        }
    }

    /// Run until shutdown is signalled, then drain queued events.
    pub async fn run(mut self) {
        info!("NotificationDispatcher started");

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("NotificationDispatcher received shutdown signal");
                        break;
                    }
                }

                Some(event) = self.notification_rx.recv() => {
                    debug!(event = ?event, "Received NotificationEvent");
                    self.handle(event).await;
                }

                else => {
                    info!("Notification channel closed");
                    break;
                }
            }
        }

        self.notification_rx.close();
        while let Ok(event) = self.notification_rx.try_recv() {
            self.handle(event).await;
        }

        info!("NotificationDispatcher shutdown complete");
    }

    async fn handle(&self, event: NotificationEvent) {
        if let Err(e) = self.process_event(&event).await {
            error!(event = ?event, error = %e, "Failed to send notification");
        }
    }

    async fn process_event(&self, event: &NotificationEvent) -> Result<(), MailError> {
        match event {
            NotificationEvent::OrderConfirmed { order_id } => {
                let Some(order) = self.store.get_order(order_id).await? else {
                    return Err(MailError::OrderNotFound(order_id.clone()));
                };
                let message = render_confirmation(&order, &self.subject_prefix);
                self.mailer.send(&message).await?;
                info!(order_id = %order.order_id, "Order confirmation sent");
                Ok(())
            }
        }
    }
}
