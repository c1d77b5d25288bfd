//! Resolve-then-forward: look a logical service up in discovery, issue one GET
//! to the instance it resolved to and hand the body back.
//!
//! There is no retry, no fallback instance and no caching. Each call resolves
//! afresh and makes at most one outbound request. The outbound future is owned
//! by the caller, so dropping it (for example when the inbound connection goes
//! away) aborts the request.
//!
//! Bodies are relayed as text: bytes that are not valid UTF-8 are replaced
//! with U+FFFD rather than passed through.

use crate::error::{ForwardError, PortalError, Result};
use service_registry::Discovery;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FORWARD_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_millis(DEFAULT_FORWARD_TIMEOUT_MS);

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Bound on a whole outbound call, connect through body
    pub timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FORWARD_TIMEOUT,
        }
    }
}

/// Logical service plus the relative path to call on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardRequest<'a> {
    pub service: &'a str,
    pub path: &'a str,
}

impl<'a> ForwardRequest<'a> {
    pub fn new(service: &'a str, path: &'a str) -> Self {
        Self { service, path }
    }

    /// Join a resolved base URL and the relative path
    pub fn target_url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }
}

#[derive(Clone)]
pub struct Forwarder {
    discovery: Arc<dyn Discovery>,
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(discovery: Arc<dyn Discovery>, config: &ForwarderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(PortalError::Client)?;

        Ok(Self { discovery, client })
    }

    pub async fn forward(&self, service: &str, path: &str) -> Result<String> {
        self.send(ForwardRequest::new(service, path)).await
    }

    #[tracing::instrument(skip_all, fields(service = request.service, path = request.path))]
    pub async fn send(&self, request: ForwardRequest<'_>) -> Result<String> {
        if !request.path.starts_with('/') {
            return Err(PortalError::InvalidPath(request.path.to_string()));
        }

        let instance = self.discovery.resolve(request.service, false).await?;
        let url = request.target_url(&instance.base_url);

        debug!("Forwarding to {} ({})", url, instance.instance_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ForwardError::from_reqwest(url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::UpstreamStatus {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ForwardError::from_reqwest(url.clone(), e))?;

        debug!("Relaying {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_registry::{LocalDiscovery, ServiceRegistry};

    #[test]
    fn target_url_joins_without_double_slash() {
        let request = ForwardRequest::new("DOCTERSERVICE", "/location");
        assert_eq!(
            request.target_url("http://localhost:9001/"),
            "http://localhost:9001/location"
        );
        assert_eq!(
            request.target_url("http://localhost:9001"),
            "http://localhost:9001/location"
        );
    }

    #[tokio::test]
    async fn relative_path_without_separator_is_rejected() {
        let discovery = Arc::new(LocalDiscovery::new(ServiceRegistry::new(None).shared()));
        let forwarder = Forwarder::new(discovery, &ForwarderConfig::default()).unwrap();

        let err = forwarder.forward("DOCTERSERVICE", "location").await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidPath(_)));
    }
}
