//! Error types for the messenger core
//!
//! Every failure is raised where it is detected and surfaced to the caller
//! unchanged. Nothing here is retried.

use hyper::StatusCode;

use crate::pqc::PqcError;

/// Main error type for messenger operations
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Bad credentials or an unknown/expired session token.
    /// The message is the same for "unknown email" and "wrong password".
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// No configured candidate algorithm is supported by the runtime provider
    #[error("Algorithm unavailable: {0}")]
    AlgorithmUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MessengerError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::AlgorithmUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::AlgorithmUnavailable(_) => "ALGORITHM_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DB_ERROR",
            Self::Http(_) => "INVALID_REQUEST",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// The message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::AlgorithmUnavailable(m)
            | Self::Internal(m)
            | Self::Database(m)
            | Self::Http(m)
            | Self::Config(m) => m,
        }
    }

    /// Whether this error reflects a deployment defect rather than bad input
    pub fn is_server_fault(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<std::io::Error> for MessengerError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for MessengerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Http(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for MessengerError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for MessengerError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<base64::DecodeError> for MessengerError {
    fn from(err: base64::DecodeError) -> Self {
        Self::BadRequest(format!("Value must be valid base64: {}", err))
    }
}

impl From<PqcError> for MessengerError {
    fn from(err: PqcError) -> Self {
        match err {
            PqcError::Unsupported(alg) => {
                Self::Internal(format!("Signature algorithm {} is not supported", alg))
            }
            PqcError::NoCandidate(msg) => Self::AlgorithmUnavailable(msg),
            PqcError::InvalidKey(msg) => Self::BadRequest(format!("Invalid key material: {}", msg)),
            PqcError::InvalidCiphertext(msg) => {
                Self::BadRequest(format!("Invalid ciphertext: {}", msg))
            }
        }
    }
}

/// Result type alias for messenger operations
pub type Result<T> = std::result::Result<T, MessengerError>;
