use axum::{Router, extract::State, routing::get};
use tower_http::trace::TraceLayer;

use crate::forwarder::{ForwardRequest, Forwarder};

/// An inbound route answered by forwarding to a logical service.
#[derive(Debug, Clone, Copy)]
pub struct PortalRoute {
    pub path: &'static str,
    pub target: ForwardRequest<'static>,
}

pub const PORTAL_ROUTES: &[PortalRoute] = &[
    PortalRoute {
        path: "/portal-doctors",
        target: ForwardRequest {
            service: "DOCTERSERVICE",
            path: "/location",
        },
    },
    PortalRoute {
        path: "/portal-Disease",
        target: ForwardRequest {
            service: "DISEASESERVICE",
            path: "/location",
        },
    },
];

pub async fn health() -> &'static str {
    "OK"
}

pub fn router(forwarder: Forwarder) -> Router {
    let mut router = Router::new().route("/health", get(health));

    for route in PORTAL_ROUTES {
        let target = route.target;
        router = router.route(
            route.path,
            get(move |State(forwarder): State<Forwarder>| async move { forwarder.send(target).await }),
        );
    }

    router.with_state(forwarder).layer(TraceLayer::new_for_http())
}
