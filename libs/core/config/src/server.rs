use crate::{env_or_default, validate_host_port, ConfigError};
use std::time::Duration;

/// Listen settings for an HTTP service.
///
/// The address is kept as written (`127.0.0.1:4000`, `:8080`), validated up front so a
/// typo fails at startup instead of at bind time.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: String,
    /// Per-request handler budget
    pub handler_timeout: Duration,
    /// Upper bound for draining in-flight requests on shutdown
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            handler_timeout: Self::DEFAULT_HANDLER_TIMEOUT,
            shutdown_timeout: Self::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Load the listen address from `key`, using `default` when unset.
    pub fn from_env_key(key: &str, default: &str) -> Result<Self, ConfigError> {
        let addr = env_or_default(key, default);
        validate_host_port(key, &addr)?;
        Ok(Self::new(addr))
    }

    /// Address suitable for `TcpListener::bind`; `:8080` binds all interfaces.
    pub fn bind_address(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }
}
