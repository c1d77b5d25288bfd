//! Startup configuration read from the environment (and `.env`, when present).

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:3003";

/// Read `key` from the environment, falling back to `default` when unset.
///
/// A value that is set but does not parse is an error rather than a silent default.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Like [`env_or`] for counts and durations, where zero is rejected.
pub fn env_nonzero(key: &str, default: u64) -> Result<u64> {
    let value = env_or(key, default)?;
    anyhow::ensure!(value > 0, "{} must be greater than zero", key);
    Ok(value)
}

/// Load `.env` if present and install the tracing subscriber.
///
/// `RUST_LOG` controls verbosity and defaults to `info`.
pub fn init_tracing() {
    dotenv::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Settings of the registry server.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub bind_addr: String,
    pub lease_ttl_secs: u64,
    pub eviction_interval: Duration,
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_addr: env_or("REGISTRY_BIND_ADDR", "0.0.0.0:3003".to_string())?,
            lease_ttl_secs: env_nonzero("REGISTRY_LEASE_TTL_SECS", 30)?,
            eviction_interval: Duration::from_secs(env_nonzero("REGISTRY_EVICTION_INTERVAL_SECS", 5)?),
        })
    }
}

/// Settings every registry client (portal, clinic services) shares.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub registry_url: String,
    pub heartbeat_interval: Duration,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            heartbeat_interval: Duration::from_secs(10),
            max_attempts: 30,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            registry_url: env_or("SERVICE_REGISTRY_URL", defaults.registry_url)?,
            heartbeat_interval: Duration::from_secs(env_nonzero(
                "REGISTRY_HEARTBEAT_SECS",
                defaults.heartbeat_interval.as_secs(),
            )?),
            max_attempts: env_or("REGISTRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            ..defaults
        })
    }
}
