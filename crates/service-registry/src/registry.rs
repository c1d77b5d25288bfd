use crate::error::{RegistryError, Result};
use crate::service::{canonical_name, ServiceInfo, ServiceRecord};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

/// Registry shared between the HTTP API, the eviction task and in-process
/// discovery.
pub type SharedRegistry = Arc<Mutex<ServiceRegistry>>;

const DEFAULT_LEASE_TTL_SECS: u64 = 30;

struct Registration {
    info: ServiceInfo,
    lease_id: i64,
    expires_at: Instant,
}

impl Registration {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// ServiceRegistry keeps the live instances of every logical service in memory.
///
/// Every registration holds a lease. An instance whose lease is not renewed
/// within the TTL stops being visible and is dropped on the next eviction.
pub struct ServiceRegistry {
    services: BTreeMap<String, Vec<Registration>>,
    lease_ttl: Duration,
    next_lease_id: i64,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ServiceRegistry {
    /// Create a new ServiceRegistry instance
    ///
    /// # Arguments
    /// * `lease_ttl` - Time-to-live for service registrations in seconds (default: 30)
    pub fn new(lease_ttl: Option<u64>) -> Self {
        let lease_ttl = Duration::from_secs(lease_ttl.unwrap_or(DEFAULT_LEASE_TTL_SECS));
        info!("Creating in-memory service registry with lease TTL {:?}", lease_ttl);

        Self {
            services: BTreeMap::new(),
            lease_ttl,
            next_lease_id: 1,
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    /// Register a service instance and grant it a lease
    ///
    /// Registering an id that is already present replaces that entry in place
    /// and issues a new lease.
    pub fn register(&mut self, service: &ServiceInfo) -> Result<i64> {
        validate(service)?;

        let mut info = service.clone();
        info.name = canonical_name(&info.name);

        let lease_id = self.next_lease_id;
        self.next_lease_id += 1;

        let registration = Registration {
            info,
            lease_id,
            expires_at: Instant::now() + self.lease_ttl,
        };
        let name = registration.info.name.clone();
        let id = registration.info.id.clone();

        let instances = self.services.entry(name.clone()).or_default();
        match instances.iter_mut().find(|r| r.info.id == id) {
            Some(existing) => {
                debug!("Replacing registration of {}/{}", name, id);
                *existing = registration;
            }
            None => instances.push(registration),
        }

        info!(
            "Service {}/{} registered with lease {} (TTL {:?})",
            name, id, lease_id, self.lease_ttl
        );

        Ok(lease_id)
    }

    /// Keep a service registration alive by refreshing its lease
    pub fn keep_alive(&mut self, lease_id: i64) -> Result<()> {
        let now = Instant::now();
        let registration = self
            .services
            .values_mut()
            .flat_map(|instances| instances.iter_mut())
            .find(|r| r.lease_id == lease_id && r.is_live(now))
            .ok_or(RegistryError::LeaseNotFound(lease_id))?;

        registration.expires_at = now + self.lease_ttl;
        debug!("Lease {} kept alive for {:?}", lease_id, self.lease_ttl);

        Ok(())
    }

    /// Deregister a service instance; removing the last instance removes the service
    pub fn deregister(&mut self, service: &ServiceInfo) -> Result<()> {
        let name = canonical_name(&service.name);
        let key = format!("{}/{}", name, service.id);

        let instances = self
            .services
            .get_mut(&name)
            .ok_or_else(|| RegistryError::ServiceNotFound(key.clone()))?;

        let before = instances.len();
        instances.retain(|r| r.info.id != service.id);
        if instances.len() == before {
            return Err(RegistryError::ServiceNotFound(key));
        }

        if instances.is_empty() {
            self.services.remove(&name);
            info!("Last instance of {} removed, service deregistered", name);
        }

        info!("Service {} deregistered successfully", key);

        Ok(())
    }

    /// Get a specific service by name and id
    pub fn get_service(&self, service_name: &str, service_id: &str) -> Result<ServiceInfo> {
        let now = Instant::now();
        let name = canonical_name(service_name);

        self.services
            .get(&name)
            .and_then(|instances| {
                instances
                    .iter()
                    .find(|r| r.info.id == service_id && r.is_live(now))
            })
            .map(|r| r.info.clone())
            .ok_or_else(|| RegistryError::ServiceNotFound(format!("{}/{}", name, service_id)))
    }

    /// Get all live instances of a service by name, in registration order
    pub fn get_services(&self, service_name: &str) -> Vec<ServiceInfo> {
        let services = self
            .get_record(service_name)
            .map(|record| record.instances)
            .unwrap_or_default();

        debug!("Found {} instances of service {}", services.len(), service_name);

        services
    }

    /// Get the record of a service, or `None` if it has no live instance
    pub fn get_record(&self, service_name: &str) -> Option<ServiceRecord> {
        let now = Instant::now();
        let name = canonical_name(service_name);

        let instances: Vec<ServiceInfo> = self
            .services
            .get(&name)?
            .iter()
            .filter(|r| r.is_live(now))
            .map(|r| r.info.clone())
            .collect();

        if instances.is_empty() {
            return None;
        }

        Some(ServiceRecord { name, instances })
    }

    /// Get all registered services
    pub fn get_all_services(&self) -> Vec<ServiceInfo> {
        let now = Instant::now();

        self.services
            .values()
            .flat_map(|instances| instances.iter())
            .filter(|r| r.is_live(now))
            .map(|r| r.info.clone())
            .collect()
    }

    /// Drop every registration whose lease has expired, returning how many were removed
    pub fn evict_expired(&mut self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;

        self.services.retain(|name, instances| {
            let before = instances.len();
            instances.retain(|r| r.is_live(now));
            let removed = before - instances.len();
            if removed > 0 {
                info!("Evicted {} expired instance(s) of {}", removed, name);
            }
            evicted += removed;
            !instances.is_empty()
        });

        evicted
    }
}

/// Periodically evict expired registrations
pub fn spawn_eviction(registry: SharedRegistry, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            registry.lock().await.evict_expired();
        }
    })
}

fn validate(service: &ServiceInfo) -> Result<()> {
    if service.name.trim().is_empty() {
        return Err(RegistryError::InvalidServiceData("service name is empty".into()));
    }
    if service.id.trim().is_empty() {
        return Err(RegistryError::InvalidServiceData(format!(
            "instance id of {} is empty",
            service.name
        )));
    }
    if service.address.trim().is_empty() {
        return Err(RegistryError::InvalidServiceData(format!(
            "address of {}/{} is empty",
            service.name, service.id
        )));
    }
    if service.port == 0 {
        return Err(RegistryError::InvalidServiceData(format!(
            "port of {}/{} is zero",
            service.name, service.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceStatus;
    use tokio_test::{assert_err, assert_ok};

    fn instance(name: &str, id: &str, port: u16) -> ServiceInfo {
        ServiceInfo::new(name, id, "localhost", port).with_status(ServiceStatus::Healthy)
    }

    #[tokio::test]
    async fn register_and_lookup_is_case_insensitive() {
        let mut registry = ServiceRegistry::new(Some(10));
        assert_ok!(registry.register(&instance("DocterService", "a", 9001)));

        let services = registry.get_services("DOCTERSERVICE");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "DOCTERSERVICE");
        assert_eq!(services[0].port, 9001);

        let found = registry.get_service("docterservice", "a").unwrap();
        assert_eq!(found.id, "a");
    }

    #[tokio::test]
    async fn reregistering_same_id_replaces_in_place() {
        let mut registry = ServiceRegistry::new(Some(10));
        let first = registry.register(&instance("svc", "a", 9001)).unwrap();
        registry.register(&instance("svc", "b", 9002)).unwrap();
        let second = registry.register(&instance("svc", "a", 9011)).unwrap();

        assert_ne!(first, second);
        let ports: Vec<u16> = registry.get_services("svc").iter().map(|s| s.port).collect();
        assert_eq!(ports, vec![9011, 9002]);
    }

    #[tokio::test]
    async fn removing_last_instance_removes_record() {
        let mut registry = ServiceRegistry::new(Some(10));
        let a = instance("svc", "a", 9001);
        let b = instance("svc", "b", 9002);
        registry.register(&a).unwrap();
        registry.register(&b).unwrap();

        assert_ok!(registry.deregister(&a));
        assert_eq!(registry.get_record("svc").unwrap().instances.len(), 1);

        assert_ok!(registry.deregister(&b));
        assert!(registry.get_record("svc").is_none());
        assert!(registry.get_all_services().is_empty());

        assert!(matches!(
            registry.deregister(&b),
            Err(RegistryError::ServiceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_invalid_registrations() {
        let mut registry = ServiceRegistry::new(Some(10));
        assert_err!(registry.register(&instance("", "a", 9001)));
        assert_err!(registry.register(&instance("svc", " ", 9001)));
        assert_err!(registry.register(&instance("svc", "a", 0)));
        assert!(registry.get_all_services().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lease_hides_and_evicts_instance() {
        let mut registry = ServiceRegistry::new(Some(10));
        let lease = registry.register(&instance("svc", "a", 9001)).unwrap();
        registry.register(&instance("svc", "b", 9002)).unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_ok!(registry.keep_alive(lease));

        tokio::time::advance(Duration::from_secs(6)).await;
        let services = registry.get_services("svc");
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, "a");

        assert_eq!(registry.evict_expired(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(registry.get_record("svc").is_none());
        assert!(matches!(
            registry.keep_alive(lease),
            Err(RegistryError::LeaseNotFound(_))
        ));
        assert_eq!(registry.evict_expired(), 1);
    }

    #[tokio::test]
    async fn keep_alive_unknown_lease_fails() {
        let mut registry = ServiceRegistry::new(Some(10));
        assert!(matches!(
            registry.keep_alive(42),
            Err(RegistryError::LeaseNotFound(42))
        ));
    }
}
