//! Payment gateway configuration and the payment acceptance policy.

use super::Secret;
use std::time::Duration;

/// Prefix of gateway key ids that belong to the sandbox environment.
pub const TEST_KEY_PREFIX: &str = "rzp_test_";

/// Credentials and endpoint for the gateway REST API.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://api.razorpay.com/v1/`.
    pub api_base: url::Url,
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// Per-request timeout. Timeouts are retryable network errors.
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn is_test_key(&self) -> bool {
        self.key_id.starts_with(TEST_KEY_PREFIX)
    }
}

/// How much of the payment is re-derived from the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationMode {
    /// Verify the signature and fetch status and amount from the gateway.
    #[default]
    Strict,
    /// Verify the signature only and trust the draft's total.
    ///
    /// Only accepted together with a sandbox key id.
    SkipGateway,
}

/// Which gateway payment states count as paid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentPolicy {
    /// Accept `authorized` (not yet captured) payments as paid.
    ///
    /// When `false`, an authorized payment is reported as pending.
    pub accept_authorized: bool,
    pub verification: VerificationMode,
}
