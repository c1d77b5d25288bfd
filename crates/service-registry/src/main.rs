use anyhow::Context;
use service_registry::{api, config, registry, RegistryConfig, ServiceRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();

    let config = RegistryConfig::from_env()?;

    let registry = ServiceRegistry::new(Some(config.lease_ttl_secs)).shared();
    let eviction = registry::spawn_eviction(registry.clone(), config.eviction_interval);

    let app = api::router(registry);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("Service registry listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(service_registry::shutdown_signal())
        .await
        .context("registry server failed")?;

    eviction.abort();
    Ok(())
}
