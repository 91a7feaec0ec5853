use core_config::broker::BrokerConfig;
use core_config::server::ServerConfig;
use core_config::tracing::DEFAULT_LOG_LEVEL;
use core_config::{ConfigError, Environment, FromEnv, env_or_default};
use email::MailConfig;

pub const DEFAULT_HTTP_ADDR: &str = ":8000";

/// Receipt service configuration, composed from the shared config components.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub environment: Environment,
    /// `RECEIPT_LOG_LEVEL`
    pub log_level: String,
    /// `RECEIPT_HTTP_ADDR`
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub mail: MailConfig,
}

impl FromEnv for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            log_level: env_or_default("RECEIPT_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            server: ServerConfig::from_env_key("RECEIPT_HTTP_ADDR", DEFAULT_HTTP_ADDR)?,
            broker: BrokerConfig::from_env()?,
            mail: MailConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::broker::BrokerKind;

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "APP_ENV",
                "RECEIPT_LOG_LEVEL",
                "RECEIPT_HTTP_ADDR",
                "RECEIPT_BROKER",
                "RECEIPT_SEED_BROKERS",
                "RECEIPT_TOPIC",
                "RECEIPT_MAIL_PROVIDER",
            ],
            || {
                let config = AppConfig::from_env().unwrap();
                assert_eq!(config.log_level, "info");
                assert_eq!(config.server.bind_address(), "0.0.0.0:8000");
                assert_eq!(config.broker.kind, BrokerKind::Redis);
                assert_eq!(config.broker.topic, "receipts");
                assert!(config.environment.is_development());
            },
        );
    }

    #[test]
    fn test_invalid_http_addr_fails() {
        temp_env::with_var("RECEIPT_HTTP_ADDR", Some("nope"), || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("RECEIPT_HTTP_ADDR"));
        });
    }
}
