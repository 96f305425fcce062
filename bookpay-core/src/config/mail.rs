//! Transactional email configuration.

use super::Secret;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Base URL of the email provider API, e.g. `https://api.resend.com/`.
    pub api_base: url::Url,
    pub api_key: Secret<String>,
    /// Sender, e.g. `Bookstore <orders@example.com>`.
    pub from: String,
    pub subject_prefix: String,
    pub timeout: Duration,
}
