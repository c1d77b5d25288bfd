//! The disease, doctor and patient services: one static listing each plus a
//! `/location` route reporting the instance's own identity.

use anyhow::Context;
use axum::{Router, extract::State, routing::get};
use service_registry::config::{ClientConfig, env_or, init_tracing};
use service_registry::{bootstrap_service, shutdown_signal};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Disease,
    Doctor,
    Patient,
}

impl ServiceKind {
    /// Logical name the service registers under unless `APP_NAME` overrides it
    pub fn default_app_name(self) -> &'static str {
        match self {
            ServiceKind::Disease => "DISEASESERVICE",
            ServiceKind::Doctor => "DOCTERSERVICE",
            ServiceKind::Patient => "PATIENTSERVICE",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            ServiceKind::Doctor => 9001,
            ServiceKind::Disease => 9002,
            ServiceKind::Patient => 9003,
        }
    }

    pub fn listing_route(self) -> &'static str {
        match self {
            ServiceKind::Disease => "/diseases",
            ServiceKind::Doctor => "/doctors",
            ServiceKind::Patient => "/patients",
        }
    }

    pub fn listing_body(self) -> &'static str {
        match self {
            ServiceKind::Disease => " List of diseases ",
            ServiceKind::Doctor => " List of doctors ",
            ServiceKind::Patient => " List of patients ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub app_name: String,
    pub port: u16,
    pub advertise_host: String,
    pub registry: ClientConfig,
}

impl ServiceConfig {
    pub fn from_env(kind: ServiceKind) -> anyhow::Result<Self> {
        Ok(Self {
            app_name: env_or("APP_NAME", kind.default_app_name().to_string())?,
            port: env_or("PORT", kind.default_port())?,
            advertise_host: env_or("ADVERTISE_HOST", "localhost".to_string())?,
            registry: ClientConfig::from_env()?,
        })
    }

    /// `"<app-name> : <port>"`
    pub fn location(&self) -> String {
        format!("{} : {}", self.app_name, self.port)
    }
}

pub fn router(kind: ServiceKind, location: String) -> Router {
    let listing = kind.listing_body();

    Router::new()
        .route(kind.listing_route(), get(move || async move { listing }))
        .route("/location", get(location_handler))
        .route("/health", get(|| async { "OK" }))
        .with_state(Arc::new(location))
        .layer(TraceLayer::new_for_http())
}

async fn location_handler(State(location): State<Arc<String>>) -> String {
    location.as_ref().clone()
}

/// Serve one clinic service until shutdown, registered with the registry for its lifetime
pub async fn run(kind: ServiceKind) -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env(kind)?;

    let registration = bootstrap_service(
        &config.registry,
        config.app_name.clone(),
        config.advertise_host.clone(),
        config.port,
    )
    .await?;
    tracing::info!(
        "Service registered: {} ({})",
        registration.service.name,
        registration.service.id
    );

    let app = router(kind, config.location());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!("{} listening on {}", config.app_name, listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    registration.shutdown().await;
    served.context("server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn listings_return_literal_text() {
        for (kind, uri, expected) in [
            (ServiceKind::Disease, "/diseases", " List of diseases "),
            (ServiceKind::Doctor, "/doctors", " List of doctors "),
            (ServiceKind::Patient, "/patients", " List of patients "),
        ] {
            let (status, body) = get_text(router(kind, String::new()), uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, expected);
        }
    }

    #[tokio::test]
    async fn location_reports_identity() {
        let config = ServiceConfig {
            app_name: "doctor-service".to_string(),
            port: 9001,
            advertise_host: "localhost".to_string(),
            registry: ClientConfig::default(),
        };

        let (status, body) = get_text(router(ServiceKind::Doctor, config.location()), "/location").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "doctor-service : 9001");
    }

    #[tokio::test]
    async fn other_listings_are_not_served() {
        let (status, _) = get_text(router(ServiceKind::Doctor, String::new()), "/patients").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
