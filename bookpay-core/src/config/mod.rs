//! Configuration types for the payment service.
//!
//! These types represent the validated runtime configuration. Loading and
//! parsing (TOML file, environment secrets) is handled by the server crate.

mod gateway;
mod mail;
mod secret;

pub use gateway::{GatewayConfig, PaymentPolicy, VerificationMode};
pub use mail::MailConfig;
pub use secret::Secret;

use crate::utils::retry::RetryPolicy;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Order id generation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    /// Prefix of server-generated order ids.
    pub id_prefix: String,
    /// ISO currency code the storefront charges in.
    pub currency: String,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            id_prefix: "BK".to_string(),
            currency: "INR".to_string(),
        }
    }
}

/// Secrets used to authenticate gateway callbacks.
#[derive(Debug, Clone)]
pub struct SignatureSecrets {
    /// Gateway key secret; signs the checkout `order_id|payment_id` pair.
    pub key_secret: Secret<String>,
    /// Webhook secret; signs webhook bodies.
    pub webhook_secret: Secret<String>,
}

/// Reloadable settings with separate locks for each section.
///
/// Readers take a snapshot at the start of a request so that a reload
/// never changes policy half way through one.
#[derive(Clone)]
pub struct SharedSettings {
    pub policy: Arc<RwLock<PaymentPolicy>>,
    pub retry: Arc<RwLock<RetryPolicy>>,
    pub orders: Arc<RwLock<OrderConfig>>,
}

/// A consistent copy of [`SharedSettings`].
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    pub policy: PaymentPolicy,
    pub retry: RetryPolicy,
    pub orders: OrderConfig,
}

impl SharedSettings {
    pub fn new(policy: PaymentPolicy, retry: RetryPolicy, orders: OrderConfig) -> Self {
        Self {
            policy: Arc::new(RwLock::new(policy)),
            retry: Arc::new(RwLock::new(retry)),
            orders: Arc::new(RwLock::new(orders)),
        }
    }

    /// Every guard is held until all sections are cloned, so a concurrent
    /// [`update`](Self::update) is seen entirely or not at all.
    pub async fn snapshot(&self) -> SettingsSnapshot {
        let policy = self.policy.read().await;
        let retry = self.retry.read().await;
        let orders = self.orders.read().await;
        SettingsSnapshot {
            policy: policy.clone(),
            retry: retry.clone(),
            orders: orders.clone(),
        }
    }

    /// Replace every section (used during SIGHUP reload).
    ///
    /// Locks are taken in the same order as in [`snapshot`](Self::snapshot).
    pub async fn update(&self, snapshot: SettingsSnapshot) {
        let mut policy = self.policy.write().await;
        let mut retry = self.retry.write().await;
        let mut orders = self.orders.write().await;
        *policy = snapshot.policy;
        *retry = snapshot.retry;
        *orders = snapshot.orders;
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(
            PaymentPolicy::default(),
            RetryPolicy::default(),
            OrderConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(accept_authorized: bool, currency: &str) -> SettingsSnapshot {
        SettingsSnapshot {
            policy: PaymentPolicy {
                accept_authorized,
                ..Default::default()
            },
            retry: RetryPolicy::default(),
            orders: OrderConfig {
                currency: currency.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_snapshot_never_mixes_sections() {
        let settings = SharedSettings::default();
        let writer = {
            let settings = settings.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    let next = if i % 2 == 0 {
                        variant(true, "USD")
                    } else {
                        variant(false, "INR")
                    };
                    settings.update(next).await;
                }
            })
        };

        for _ in 0..500 {
            let snapshot = settings.snapshot().await;
            assert_eq!(
                snapshot.policy.accept_authorized,
                snapshot.orders.currency == "USD"
            );
        }
        writer.await.unwrap();
    }
}
