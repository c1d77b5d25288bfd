use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("lease not found: {0}")]
    LeaseNotFound(i64),

    #[error("invalid service data: {0}")]
    InvalidServiceData(String),

    #[error("connection error: {0}")]
    ConnectionError(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
