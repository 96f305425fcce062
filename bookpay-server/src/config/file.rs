//! TOML file configuration structures.
//!
//! These structs directly map to the `bookpay-config.toml` file format.
//! Secrets never appear here; they are read from the environment.

use serde::Deserialize;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub orders: OrdersConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    #[default]
    Strict,
    /// Trust the signed callback and the draft total. Sandbox keys only.
    SkipGateway,
}

/// Payment gateway section.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Count `authorized` payments as paid, not only `captured` ones.
    #[serde(default)]
    pub accept_authorized: bool,
    #[serde(default)]
    pub verification: Verification,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: default_gateway_api_base(),
            timeout_secs: default_timeout_secs(),
            accept_authorized: false,
            verification: Verification::Strict,
        }
    }
}

fn default_gateway_api_base() -> String {
    "https://api.razorpay.com/v1/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Retry policy shared by gateway lookups and order writes.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    2000
}

/// Order id generation.
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersConfig {
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
            currency: default_currency(),
        }
    }
}

fn default_id_prefix() -> String {
    "BK".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Confirmation email section. The API key comes from `MAIL_API_KEY`.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_mail_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_mail_api_base(),
            from: String::new(),
            subject_prefix: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_mail_api_base() -> String {
    "https://api.resend.com/".to_string()
}
