//! Error types for the statistics service
//!
//! Maps domain errors onto HTTP statuses and stable error codes. Clients
//! only ever see a generic message; internal detail goes to the log.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::aggregation::ComputeError;
use crate::auth::AuthError;
use crate::cache::CacheError;
use crate::models::ErrorResponse;
use crate::tenant::AccessError;

// == Api Error Enum ==
/// Boundary error type returned by every handler.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Login failed; never says whether the email or the password was wrong
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Record store unreachable and nothing could be served instead
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code sent with every error body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    ///
    /// Only request validation errors echo their detail, since it comes from
    /// the request itself.
    fn public_message(&self) -> String {
        match self {
            ApiError::InvalidCredentials => "Invalid email or password".to_string(),
            ApiError::Unauthorized(_) => "Missing or invalid credential".to_string(),
            ApiError::Forbidden(_) => "Access to the requested tenant is not allowed".to_string(),
            ApiError::InvalidRequest(detail) => detail.clone(),
            ApiError::ServiceUnavailable(_) => "Statistics are temporarily unavailable".to_string(),
            ApiError::Timeout(_) => "Timed out computing statistics".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

// == Conversions ==
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthorized(reason) => ApiError::Unauthorized(reason),
            forbidden @ AccessError::Forbidden { .. } => ApiError::Forbidden(forbidden.to_string()),
        }
    }
}

impl From<ComputeError> for ApiError {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::UnknownMetric(_) | ComputeError::InvalidWindow(_) => {
                ApiError::InvalidRequest(err.to_string())
            }
            ComputeError::StoreUnavailable(reason) => ApiError::ServiceUnavailable(reason),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::StoreUnavailable(reason) => ApiError::ServiceUnavailable(reason),
            CacheError::Timeout(after) => ApiError::Timeout(format!("{:?}", after)),
            CacheError::Compute(inner) => inner.into(),
            CacheError::Internal(reason) => ApiError::Internal(reason),
        }
    }
}

// Malformed request bodies and query strings surface as 400 with the
// usual error body instead of axum's plain-text rejection.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        } else {
            warn!(code = self.code(), error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse::new(self.public_message(), self.code()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
