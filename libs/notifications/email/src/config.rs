//! Mail delivery settings.

use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};
use std::time::Duration;
use strum::{Display, EnumString};

pub const DEFAULT_MAIL_API_URL: &str = "http://127.0.0.1:8080/v1/email";
pub const DEFAULT_MAIL_FROM: &str = "receipts@example.com";
pub const DEFAULT_MAIL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAIL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MailProviderKind {
    /// JSON mail API over HTTP
    Http,
    /// Capture mail in memory
    Mock,
}

/// Environment variables:
/// - `RECEIPT_MAIL_PROVIDER`: `http` or `mock` (default: `http`)
/// - `RECEIPT_MAIL_API_URL`, `RECEIPT_MAIL_FROM`, `RECEIPT_MAIL_API_KEY`
/// - `RECEIPT_MAIL_TIMEOUT_MS`, `RECEIPT_MAIL_CONCURRENCY`
#[derive(Clone)]
pub struct MailConfig {
    pub provider: MailProviderKind,
    pub api_url: String,
    pub from: String,
    pub api_key: Option<String>,
    /// Per request timeout
    pub timeout: Duration,
    /// Receipts mailed in parallel within one batch
    pub concurrency: usize,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("from", &self.from)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl FromEnv for MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_ms = env_parse_or("RECEIPT_MAIL_TIMEOUT_MS", DEFAULT_MAIL_TIMEOUT.as_millis() as u64)?;
        let concurrency = env_parse_or("RECEIPT_MAIL_CONCURRENCY", DEFAULT_MAIL_CONCURRENCY)?;
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RECEIPT_MAIL_CONCURRENCY".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            provider: env_parse_or("RECEIPT_MAIL_PROVIDER", MailProviderKind::Http)?,
            api_url: env_or_default("RECEIPT_MAIL_API_URL", DEFAULT_MAIL_API_URL),
            from: env_or_default("RECEIPT_MAIL_FROM", DEFAULT_MAIL_FROM),
            api_key: std::env::var("RECEIPT_MAIL_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_millis(timeout_ms),
            concurrency,
        })
    }
}
