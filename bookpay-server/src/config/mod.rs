//! Configuration module for bookpay-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables. Credentials only ever come from the environment.

pub mod file;

use crate::config::file::{FileConfig, Verification};
use bookpay_core::config::{
    GatewayConfig, MailConfig, OrderConfig, PaymentPolicy, Secret, SettingsSnapshot,
    SignatureSecrets, VerificationMode,
};
use bookpay_core::utils::retry::RetryPolicy;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_KEY_ID: &str = "RAZORPAY_KEY_ID";
pub const ENV_KEY_SECRET: &str = "RAZORPAY_KEY_SECRET";
pub const ENV_WEBHOOK_SECRET: &str = "RAZORPAY_WEBHOOK_SECRET";
pub const ENV_MAIL_API_KEY: &str = "MAIL_API_KEY";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),
}

/// Secrets read from the environment.
#[derive(Debug, Clone)]
pub struct EnvSecrets {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub mail_api_key: Option<Secret<String>>,
}

impl EnvSecrets {
    /// Read secrets through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingEnv(name));
        Ok(Self {
            key_id: require(ENV_KEY_ID)?,
            key_secret: Secret::new(require(ENV_KEY_SECRET)?),
            webhook_secret: Secret::new(require(ENV_WEBHOOK_SECRET)?),
            mail_api_key: get(ENV_MAIL_API_KEY).map(Secret::new),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub gateway: GatewayConfig,
    pub policy: PaymentPolicy,
    pub retry: RetryPolicy,
    pub orders: OrderConfig,
    /// `None` when mail is disabled.
    pub mail: Option<MailConfig>,
    pub secrets: SignatureSecrets,
}

impl LoadedConfig {
    /// The sections that can change on SIGHUP.
    pub fn settings(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            policy: self.policy.clone(),
            retry: self.retry.clone(),
            orders: self.orders.clone(),
        }
    }
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and validate the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Read secrets from the environment
    /// 4. Validate and build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        build_loaded_config(file_config, EnvSecrets::from_env()?)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn parse_url(field: &str, value: &str) -> Result<url::Url, ConfigError> {
    url::Url::parse(value)
        .map_err(|e| ConfigError::ValidationError(format!("{field} is not a valid URL: {e}")))
}

/// Combine the file sections with environment secrets.
pub fn build_loaded_config(
    file_config: FileConfig,
    secrets: EnvSecrets,
) -> Result<LoadedConfig, ConfigError> {
    let gateway = GatewayConfig {
        api_base: parse_url("gateway.api_base", &file_config.gateway.api_base)?,
        key_id: secrets.key_id,
        key_secret: secrets.key_secret.clone(),
        timeout: Duration::from_secs(file_config.gateway.timeout_secs),
    };

    let verification = match file_config.gateway.verification {
        Verification::Strict => VerificationMode::Strict,
        Verification::SkipGateway => {
            if !gateway.is_test_key() {
                return Err(ConfigError::ValidationError(
                    "gateway.verification = \"skip_gateway\" requires a test mode key id"
                        .to_string(),
                ));
            }
            tracing::warn!("Gateway verification is disabled, payments are not re-checked");
            VerificationMode::SkipGateway
        }
    };

    if file_config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }
    let retry = RetryPolicy::new(
        file_config.retry.max_attempts,
        Duration::from_millis(file_config.retry.base_delay_ms),
        Duration::from_millis(file_config.retry.max_delay_ms),
    );

    if file_config.orders.id_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "orders.id_prefix must not be empty".to_string(),
        ));
    }

    let mail = if file_config.mail.enabled {
        let api_key = secrets
            .mail_api_key
            .ok_or(ConfigError::MissingEnv(ENV_MAIL_API_KEY))?;
        if file_config.mail.from.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mail.from is required when mail is enabled".to_string(),
            ));
        }
        Some(MailConfig {
            api_base: parse_url("mail.api_base", &file_config.mail.api_base)?,
            api_key,
            from: file_config.mail.from,
            subject_prefix: file_config.mail.subject_prefix,
            timeout: Duration::from_secs(file_config.mail.timeout_secs),
        })
    } else {
        None
    };

    Ok(LoadedConfig {
        listen: file_config.server.listen,
        gateway,
        policy: PaymentPolicy {
            accept_authorized: file_config.gateway.accept_authorized,
            verification,
        },
        retry,
        orders: OrderConfig {
            id_prefix: file_config.orders.id_prefix,
            currency: file_config.orders.currency,
        },
        mail,
        secrets: SignatureSecrets {
            key_secret: secrets.key_secret,
            webhook_secret: secrets.webhook_secret,
        },
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var(ENV_DATABASE_URL).map_err(|_| ConfigError::MissingEnv(ENV_DATABASE_URL))
}
