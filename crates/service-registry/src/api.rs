use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::registry::SharedRegistry;
use crate::{RegistryError, ServiceInfo};

type AppState = SharedRegistry;

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub service: ServiceInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub lease_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KeepAliveRequest {
    pub lease_id: i64,
}

/// Routes of the registry HTTP API
pub fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/api/registry/register", post(register))
        .route("/api/registry/deregister", post(deregister))
        .route("/api/registry/services", get(list_services))
        .route("/api/registry/services/{name}", get(get_services_by_name))
        .route("/api/registry/keepalive", post(keep_alive))
        .route("/health", get(|| async { "OK" }))
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}

fn status_for(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::ServiceNotFound(_) | RegistryError::LeaseNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::InvalidServiceData(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn register(
    State(registry): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, StatusCode> {
    let mut registry = registry.lock().await;

    match registry.register(&req.service) {
        Ok(lease_id) => {
            tracing::info!("Registered service: {} with lease {}", req.service.name, lease_id);
            Ok(Json(RegisterResponse { lease_id }))
        }
        Err(e) => {
            tracing::error!("Failed to register service: {}", e);
            Err(status_for(&e))
        }
    }
}

pub async fn deregister(
    State(registry): State<AppState>,
    Json(service): Json<ServiceInfo>,
) -> Result<StatusCode, StatusCode> {
    let mut registry = registry.lock().await;

    match registry.deregister(&service) {
        Ok(_) => {
            tracing::info!("Deregistered service: {}", service.name);
            Ok(StatusCode::OK)
        }
        Err(e) => {
            tracing::warn!("Failed to deregister service: {}", e);
            Err(status_for(&e))
        }
    }
}

pub async fn list_services(State(registry): State<AppState>) -> Json<Vec<ServiceInfo>> {
    Json(registry.lock().await.get_all_services())
}

pub async fn get_services_by_name(
    State(registry): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ServiceInfo>>, StatusCode> {
    let registry = registry.lock().await;

    match registry.get_record(&name) {
        Some(record) => Ok(Json(record.instances)),
        None => {
            tracing::debug!("No live instances of {}", name);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

pub async fn keep_alive(
    State(registry): State<AppState>,
    Json(req): Json<KeepAliveRequest>,
) -> Result<StatusCode, StatusCode> {
    let mut registry = registry.lock().await;

    match registry.keep_alive(req.lease_id) {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) => {
            tracing::warn!("Failed to keep alive lease {}: {}", req.lease_id, e);
            Err(status_for(&e))
        }
    }
}
