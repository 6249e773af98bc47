//! API error type rendered in the `ApiResponse` envelope.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::models::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input (400)
    #[error("{0}")]
    Validation(String),

    /// Duplicate key or row still in use (400)
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Logged, never shown to the client (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{resource} not found"))
    }

    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Internal(detail) = self {
            log::error!("Internal error: {detail}");
        }
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(self.public_message()))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::InvalidReference(message) => Self::Validation(message),
            StoreError::NotFound { resource, .. } => Self::not_found(resource),
            other => Self::Internal(format!("{other:?}")),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(format!("Validation failed: {}", err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::WrongRole => Self::Forbidden(err.to_string()),
            AuthError::Hash(_) | AuthError::Encode(_) => Self::Internal(format!("{err:?}")),
        }
    }
}
