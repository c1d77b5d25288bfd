use crate::config::ClientConfig;
use crate::error::{RegistryError, Result};
use crate::{ServiceInfo, ServiceStatus};
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
struct RegisterResponse {
    lease_id: i64,
}

/// Unique id for this process: `<hostname>-<pid>`
pub fn local_instance_id() -> String {
    let hostname = hostname::get()
        .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
        .to_string_lossy()
        .to_string();
    format!("{}-{}", hostname, std::process::id())
}

/// Talks to the registry HTTP API on behalf of one service instance.
#[derive(Clone)]
pub struct RegistrationClient {
    registry_url: String,
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl RegistrationClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            registry_url: config.registry_url.trim_end_matches('/').to_string(),
            client,
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay,
        })
    }

    async fn try_register(&self, service: &ServiceInfo) -> Result<i64> {
        let response = self
            .client
            .post(format!("{}/api/registry/register", self.registry_url))
            .json(&serde_json::json!({ "service": service }))
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RegistryError::ConnectionError(format!(
                "registry rejected registration with {}",
                response.status()
            )));
        }

        Ok(response.json::<RegisterResponse>().await?.lease_id)
    }

    /// Register `service`, retrying with a fixed delay until the registry accepts it
    pub async fn register(&self, service: &ServiceInfo) -> Result<i64> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            match self.try_register(service).await {
                Ok(lease_id) => {
                    info!("Service {} registered with lease ID: {}", service.name, lease_id);
                    return Ok(lease_id);
                }
                Err(e) if attempts >= self.max_attempts => {
                    return Err(RegistryError::ConnectionError(format!(
                        "failed to register {} after {} attempts: {}",
                        service.name, attempts, e
                    )));
                }
                Err(e) => {
                    warn!(
                        "Failed to register service (attempt {}/{}): {}",
                        attempts, self.max_attempts, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    pub async fn keep_alive(&self, lease_id: i64) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/registry/keepalive", self.registry_url))
            .json(&serde_json::json!({ "lease_id": lease_id }))
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionError(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(RegistryError::LeaseNotFound(lease_id)),
            status => Err(RegistryError::ConnectionError(format!(
                "keep-alive for lease {} failed with {}",
                lease_id, status
            ))),
        }
    }

    pub async fn deregister(&self, service: &ServiceInfo) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/registry/deregister", self.registry_url))
            .json(service)
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionError(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(RegistryError::ServiceNotFound(format!(
                "{}/{}",
                service.name, service.id
            ))),
            status => Err(RegistryError::ConnectionError(format!(
                "deregistration failed with {}",
                status
            ))),
        }
    }

    /// Heartbeat the lease every `interval`.
    ///
    /// A lease the registry no longer knows (expired, or the registry restarted)
    /// is replaced by registering again.
    pub fn spawn_keep_alive(&self, service: ServiceInfo, lease_id: i64, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let mut lease_id = lease_id;
            loop {
                tokio::time::sleep(interval).await;

                match client.keep_alive(lease_id).await {
                    Ok(()) => debug!("Lease {} kept alive", lease_id),
                    Err(RegistryError::LeaseNotFound(_)) => {
                        warn!("Lease {} lost, registering {} again", lease_id, service.name);
                        match client.register(&service).await {
                            Ok(new_lease) => lease_id = new_lease,
                            Err(e) => tracing::error!("Failed to re-register {}: {}", service.name, e),
                        }
                    }
                    Err(e) => warn!("Failed to keep lease {} alive: {}", lease_id, e),
                }
            }
        })
    }
}

/// A registered instance with its heartbeat task
pub struct BootstrappedService {
    pub service: ServiceInfo,
    pub lease_id: i64,
    client: RegistrationClient,
    heartbeat: JoinHandle<()>,
}

impl BootstrappedService {
    /// Stop heartbeating and remove the instance from the registry
    pub async fn shutdown(self) {
        self.heartbeat.abort();
        match self.client.deregister(&self.service).await {
            Ok(()) => info!("Service {} ({}) deregistered", self.service.name, self.service.id),
            Err(e) => warn!("Failed to deregister {}: {}", self.service.name, e),
        }
    }
}

/// Bootstrap a service with automatic registration via the registry HTTP API
///
/// This function:
/// - Generates a unique service ID from hostname and PID
/// - Registers the service as healthy, retrying while the registry is unreachable
/// - Spawns a background task to keep the lease alive
pub async fn bootstrap_service(
    config: &ClientConfig,
    service_name: impl Into<String>,
    address: impl Into<String>,
    port: u16,
) -> Result<BootstrappedService> {
    let service = ServiceInfo::new(service_name, local_instance_id(), address, port)
        .with_status(ServiceStatus::Healthy);

    let client = RegistrationClient::new(config)?;
    let lease_id = client.register(&service).await?;
    let heartbeat = client.spawn_keep_alive(service.clone(), lease_id, config.heartbeat_interval);

    Ok(BootstrappedService {
        service,
        lease_id,
        client,
        heartbeat,
    })
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
