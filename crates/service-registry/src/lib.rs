pub mod registry;
pub mod error;
pub mod service;
pub mod selector;
pub mod discovery;
pub mod bootstrap;
pub mod config;
pub mod api;

pub use registry::{ServiceRegistry, SharedRegistry};
pub use error::RegistryError;
pub use service::{ServiceInfo, ServiceRecord, ServiceStatus};
pub use selector::{InstanceSelector, SelectionPolicy};
pub use discovery::{Discovery, HttpDiscovery, LocalDiscovery, ResolvedInstance};
pub use bootstrap::{bootstrap_service, shutdown_signal, BootstrappedService, RegistrationClient};
pub use config::{ClientConfig, RegistryConfig};
