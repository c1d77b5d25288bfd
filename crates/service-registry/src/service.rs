use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    Starting,
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub id: String,
    pub address: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_port: Option<u16>,
    pub status: ServiceStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub version: String,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            address: address.into(),
            port,
            secure_port: None,
            status: ServiceStatus::Starting,
            metadata: HashMap::new(),
            version: "0.1.0".to_string(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_secure_port(mut self, port: u16) -> Self {
        self.secure_port = Some(port);
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }

    /// Base URL of the instance, without a trailing slash.
    ///
    /// Returns `None` when `secure` is requested but the instance does not
    /// advertise a secure port.
    pub fn base_url(&self, secure: bool) -> Option<String> {
        if secure {
            self.secure_port
                .map(|port| format!("https://{}:{}", self.address, port))
        } else {
            Some(format!("http://{}:{}", self.address, self.port))
        }
    }
}

/// Canonical registry key for a logical service name.
///
/// Names are matched case-insensitively, so `DocterService` and
/// `DOCTERSERVICE` refer to the same record.
pub fn canonical_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// All live instances of one logical service, in registration order.
///
/// A record never exists with an empty instance list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub instances: Vec<ServiceInfo>,
}
