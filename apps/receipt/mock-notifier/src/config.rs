use core_config::server::ServerConfig;
use core_config::tracing::DEFAULT_LOG_LEVEL;
use core_config::{ConfigError, Environment, FromEnv, env_or_default, env_parse_or};

pub const DEFAULT_HTTP_ADDR: &str = ":8080";
pub const DEFAULT_RATE_LIMIT: i64 = 1000;

/// Environment variables:
/// - `NOTIFIER_LOG_LEVEL` (default: `info`)
/// - `NOTIFIER_HTTP_ADDR` (default: `:8080`)
/// - `NOTIFIER_RATE_LIMIT`: accepted requests per second, `<= 0` disables limiting
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    pub environment: Environment,
    pub log_level: String,
    pub server: ServerConfig,
    pub rate_limit: i64,
}

impl FromEnv for NotifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            log_level: env_or_default("NOTIFIER_LOG_LEVEL", DEFAULT_LOG_LEVEL),
            server: ServerConfig::from_env_key("NOTIFIER_HTTP_ADDR", DEFAULT_HTTP_ADDR)?,
            rate_limit: env_parse_or("NOTIFIER_RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
        })
    }
}
