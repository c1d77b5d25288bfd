pub mod config;
pub mod error;
pub mod forwarder;
pub mod routes;

pub use config::PortalConfig;
pub use error::{ForwardError, PortalError};
pub use forwarder::{ForwardRequest, Forwarder, ForwarderConfig};
pub use routes::{router, PortalRoute, PORTAL_ROUTES};
