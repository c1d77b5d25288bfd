//! Resolution of logical service names to one live instance address.
//!
//! [`Discovery`] is the seam the forwarding side depends on. [`LocalDiscovery`]
//! reads an in-process [`ServiceRegistry`](crate::ServiceRegistry) and
//! [`HttpDiscovery`] queries a remote registry over its HTTP API. Neither caches
//! anything: each call performs a fresh lookup.

use crate::error::{RegistryError, Result};
use crate::registry::SharedRegistry;
use crate::selector::{InstanceSelector, RoundRobin};
use crate::service::{canonical_name, ServiceInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One instance picked for a single resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInstance {
    pub service: String,
    pub instance_id: String,
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[async_trait]
pub trait Discovery: Send + Sync {
    /// Resolve `service_name` to one live instance.
    ///
    /// With `use_secure_port` only instances advertising a secure port are
    /// considered and the base URL uses `https`.
    async fn resolve(&self, service_name: &str, use_secure_port: bool) -> Result<ResolvedInstance>;
}

fn validate_name(service_name: &str) -> Result<()> {
    if service_name.trim().is_empty() {
        return Err(RegistryError::InvalidServiceData("service name is empty".into()));
    }
    Ok(())
}

fn pick(
    selector: &dyn InstanceSelector,
    service_name: &str,
    use_secure_port: bool,
    instances: Vec<ServiceInfo>,
) -> Result<ResolvedInstance> {
    let name = canonical_name(service_name);
    let eligible: Vec<ServiceInfo> = instances
        .into_iter()
        .filter(|svc| svc.is_healthy())
        .filter(|svc| !use_secure_port || svc.secure_port.is_some())
        .collect();

    let chosen = selector
        .select(&name, &eligible)
        .ok_or_else(|| RegistryError::ServiceNotFound(name.clone()))?;

    let base_url = chosen
        .base_url(use_secure_port)
        .ok_or_else(|| RegistryError::ServiceNotFound(name.clone()))?;
    let port = if use_secure_port {
        chosen.secure_port.unwrap_or(chosen.port)
    } else {
        chosen.port
    };

    debug!("Resolved {} to {} ({})", name, base_url, chosen.id);

    Ok(ResolvedInstance {
        service: name,
        instance_id: chosen.id.clone(),
        host: chosen.address.clone(),
        port,
        base_url,
    })
}

/// Discovery backed by a registry living in the same process.
#[derive(Clone)]
pub struct LocalDiscovery {
    registry: SharedRegistry,
    selector: Arc<dyn InstanceSelector>,
}

impl LocalDiscovery {
    pub fn new(registry: SharedRegistry) -> Self {
        Self::with_selector(registry, Arc::new(RoundRobin::new()))
    }

    pub fn with_selector(registry: SharedRegistry, selector: Arc<dyn InstanceSelector>) -> Self {
        Self { registry, selector }
    }
}

#[async_trait]
impl Discovery for LocalDiscovery {
    async fn resolve(&self, service_name: &str, use_secure_port: bool) -> Result<ResolvedInstance> {
        validate_name(service_name)?;
        let instances = self.registry.lock().await.get_services(service_name);
        pick(self.selector.as_ref(), service_name, use_secure_port, instances)
    }
}

/// Discovery against a remote registry's `/api/registry/services/{name}` endpoint.
#[derive(Clone)]
pub struct HttpDiscovery {
    registry_url: String,
    client: reqwest::Client,
    selector: Arc<dyn InstanceSelector>,
}

impl HttpDiscovery {
    pub fn new(registry_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            registry_url: registry_url.into(),
            client,
            selector: Arc::new(RoundRobin::new()),
        })
    }

    pub fn with_selector(mut self, selector: Arc<dyn InstanceSelector>) -> Self {
        self.selector = selector;
        self
    }

    fn lookup_url(&self, service_name: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.registry_url).map_err(|e| {
            RegistryError::ConnectionError(format!("invalid registry url {}: {}", self.registry_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                RegistryError::ConnectionError(format!("registry url {} cannot be a base", self.registry_url))
            })?
            .pop_if_empty()
            .extend(["api", "registry", "services", service_name]);
        Ok(url)
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn resolve(&self, service_name: &str, use_secure_port: bool) -> Result<ResolvedInstance> {
        validate_name(service_name)?;
        let url = self.lookup_url(service_name)?;

        debug!("Looking up service: {}", service_name);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!("Failed to query service registry for {}: {}", service_name, e);
            RegistryError::ConnectionError(format!("{}: {}", url, e))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::ServiceNotFound(canonical_name(service_name)));
        }
        if !status.is_success() {
            warn!("Service registry returned error for {}: {}", service_name, status);
            return Err(RegistryError::ConnectionError(format!(
                "registry responded with {} for {}",
                status, service_name
            )));
        }

        let instances = response.json::<Vec<ServiceInfo>>().await?;
        pick(self.selector.as_ref(), service_name, use_secure_port, instances)
    }
}
