//! Admin API errors and their plain-text responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::service::ServiceError;

/// Error returned by admin handlers. Rendered as a plain-text body with the
/// matching status code.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Bad payload, bad email or a value the service refused.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("unauthorized")]
    Unauthorized,

    /// The embedded service is not bootstrapped (starting or stopping).
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::Validation(_) => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Conflict(_) => StatusCode::CONFLICT,
            AdminError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a service error, prefixing `context` to the message.
    pub fn service(context: &str, e: ServiceError) -> Self {
        let message = format!("{}: {}", context, e);
        match e {
            ServiceError::NotFound(_) => AdminError::NotFound(message),
            ServiceError::Validation(_) => AdminError::Validation(message),
            ServiceError::Conflict(_) => AdminError::Conflict(message),
            ServiceError::NotBootstrapped => AdminError::Unavailable(message),
            ServiceError::Storage(_) | ServiceError::Hash(_) => AdminError::Internal(message),
        }
    }

    pub fn invalid_email() -> Self {
        AdminError::Validation("invalid or missing email address".into())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Admin request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Admin request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
