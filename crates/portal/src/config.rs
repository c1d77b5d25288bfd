use anyhow::Result;
use service_registry::SelectionPolicy;
use service_registry::config::{ClientConfig, env_nonzero, env_or};
use std::time::Duration;

use crate::forwarder::{DEFAULT_FORWARD_TIMEOUT_MS, ForwarderConfig};

/// Everything the portal needs at startup
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub app_name: String,
    pub port: u16,
    pub advertise_host: String,
    pub forwarder: ForwarderConfig,
    pub selection: SelectionPolicy,
    pub registry: ClientConfig,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self> {
        let timeout_ms = env_nonzero("FORWARD_TIMEOUT_MS", DEFAULT_FORWARD_TIMEOUT_MS)?;

        Ok(Self {
            app_name: env_or("APP_NAME", "DOCTORPORTAL".to_string())?,
            port: env_or("PORT", 8080)?,
            advertise_host: env_or("ADVERTISE_HOST", "localhost".to_string())?,
            forwarder: ForwarderConfig {
                timeout: Duration::from_millis(timeout_ms),
            },
            selection: env_or("INSTANCE_SELECTION", SelectionPolicy::default())?,
            registry: ClientConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_forward_timeout_is_a_startup_error() {
        // SAFETY: no other test in this crate reads FORWARD_TIMEOUT_MS
        unsafe { std::env::set_var("FORWARD_TIMEOUT_MS", "0") };
        let err = PortalConfig::from_env().unwrap_err();
        unsafe { std::env::remove_var("FORWARD_TIMEOUT_MS") };
        assert!(err.to_string().contains("FORWARD_TIMEOUT_MS"));
    }
}
