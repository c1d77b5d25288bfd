use anyhow::Context;
use portal::{Forwarder, PortalConfig};
use service_registry::{HttpDiscovery, bootstrap_service, config::init_tracing, shutdown_signal};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = PortalConfig::from_env()?;
    tracing::info!(
        "Starting {} (registry {}, forward timeout {:?}, selection {:?})",
        config.app_name,
        config.registry.registry_url,
        config.forwarder.timeout,
        config.selection
    );

    let discovery = HttpDiscovery::new(
        config.registry.registry_url.clone(),
        config.registry.request_timeout,
    )?
    .with_selector(config.selection.build());
    let forwarder = Forwarder::new(Arc::new(discovery), &config.forwarder)?;

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

    let app = portal::router(forwarder);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!("portal listening on {}", listener.local_addr()?);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    registration.shutdown().await;
    served.context("portal server failed")
}
