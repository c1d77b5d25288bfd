use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use service_registry::RegistryError;
use thiserror::Error;

/// Failure of the outbound call to a resolved instance.
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    UpstreamStatus { url: String, status: u16 },
}

impl ForwardError {
    pub(crate) fn from_reqwest(url: String, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ForwardError::Timeout { url, source }
        } else {
            ForwardError::Transport { url, source }
        }
    }
}

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("no registered instance for service {0}")]
    NotFound(String),

    #[error("service discovery failed: {0}")]
    Discovery(#[source] RegistryError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("invalid forward path {0:?}: must start with '/'")]
    InvalidPath(String),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<RegistryError> for PortalError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::ServiceNotFound(name) => PortalError::NotFound(name),
            other => PortalError::Discovery(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl PortalError {
    /// Machine-readable error kind reported in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            PortalError::NotFound(_) => "service_not_found",
            PortalError::Discovery(_) => "discovery_failed",
            PortalError::Forward(ForwardError::Timeout { .. }) => "upstream_timeout",
            PortalError::Forward(ForwardError::Transport { .. }) => "upstream_unreachable",
            PortalError::Forward(ForwardError::UpstreamStatus { .. }) => "upstream_status",
            PortalError::InvalidPath(_) => "invalid_path",
            PortalError::Client(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Discovery(_) => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Forward(ForwardError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            PortalError::Forward(_) => StatusCode::BAD_GATEWAY,
            PortalError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            PortalError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!("Forwarding failed: {}", self);
        } else {
            tracing::debug!("Forwarding rejected: {}", self);
        }

        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_errors_split_into_not_found_and_discovery() {
        let not_found = PortalError::from(RegistryError::ServiceNotFound("DISEASESERVICE".into()));
        assert!(matches!(not_found, PortalError::NotFound(ref name) if name == "DISEASESERVICE"));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.kind(), "service_not_found");

        let down = PortalError::from(RegistryError::ConnectionError("refused".into()));
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.kind(), "discovery_failed");
    }

    #[test]
    fn upstream_status_is_bad_gateway() {
        let err = PortalError::from(ForwardError::UpstreamStatus {
            url: "http://localhost:9001/location".into(),
            status: 500,
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "upstream_status");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn error_response_carries_kind_and_message() {
        let response = PortalError::InvalidPath("location".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_path");
        assert!(json["message"].as_str().unwrap().contains("location"));
    }
}
