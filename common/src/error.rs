use thiserror::Error;
use url::Url;

/// A draft was rejected locally, before anything reached the service.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Content is required")]
    EmptyContent,
    #[error("TTL must be an integer ≥ 1")]
    InvalidTtl,
    #[error("Max views must be an integer ≥ 1")]
    InvalidMaxViews,
}

#[derive(Debug, Error)]
#[error("`{0}` cannot be used as a base URL")]
pub struct BaseUrlError(pub Url);

/// Outcome of a single failed call against the paste service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Not found (404)")]
    NotFound { message: Option<String> },
    #[error("HTTP error {status}")]
    Status {
        status: u16,
        error: Option<String>,
        message: Option<String>,
        body: String,
    },
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("{0}")]
    Network(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Network(String),
    #[error("The service did not return a paste identifier")]
    MissingIdentifier,
}

impl From<ServiceError> for SubmitError {
    fn from(e: ServiceError) -> Self {
        const FALLBACK: &str = "Failed to create paste";

        match e {
            ServiceError::NotFound { message } => {
                Self::Service(message.unwrap_or_else(|| FALLBACK.to_owned()))
            }
            ServiceError::Status {
                error,
                message,
                body,
                ..
            } => Self::Service(
                error
                    .or(message)
                    .or_else(|| Some(body).filter(|body| !body.trim().is_empty()))
                    .unwrap_or_else(|| FALLBACK.to_owned()),
            ),
            ServiceError::Decode(message) => Self::Service(message),
            ServiceError::Network(message) => Self::Network(message),
        }
    }
}

/// Terminal failure of a confirmed view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("Paste id is required")]
    MissingIdentifier,
    #[error("{0}")]
    NotFoundOrExpired(String),
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Network(String),
}

impl From<ServiceError> for ViewError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound { message } => {
                Self::NotFoundOrExpired(message.unwrap_or_else(|| "not found or expired".to_owned()))
            }
            ServiceError::Status {
                status, message, ..
            } => Self::Service(message.unwrap_or_else(|| format!("Error: {}", status))),
            ServiceError::Decode(message) => Self::Service(message),
            ServiceError::Network(message) => Self::Network(message),
        }
    }
}
